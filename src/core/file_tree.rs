use crate::core::compose::{ComposeManifest, MANIFEST_FILE};
use crate::core::state::{Deadline, Stage};
use crate::core::validator::GraphWarning;
use crate::core::wiring::WiredGraph;
use crate::templates::render::link_vars;
use crate::templates::RenderContext;
use crate::utils::error::{Result, ScaffoldError};
use serde::Serialize;
use std::collections::HashSet;

pub const README_FILE: &str = "README.md";
pub const METADATA_FILE: &str = "scaffold.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { executable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Forward-slash path; directories end with `/`.
    pub path: String,
    pub kind: EntryKind,
    pub contents: Vec<u8>,
}

/// Ordered in-memory file tree with unique paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileTree {
    entries: Vec<TreeEntry>,
    paths: HashSet<String>,
}

impl VirtualFileTree {
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contents_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|e| std::str::from_utf8(&e.contents).ok())
    }

    /// Sum of file sizes.
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.contents.len()).sum()
    }

    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        let path = format!("{}/", path.trim_end_matches('/'));
        self.push(TreeEntry {
            path,
            kind: EntryKind::Directory,
            contents: Vec::new(),
        })
    }

    pub fn add_file(&mut self, path: &str, contents: impl Into<Vec<u8>>, executable: bool) -> Result<()> {
        self.push(TreeEntry {
            path: path.to_string(),
            kind: EntryKind::File { executable },
            contents: contents.into(),
        })
    }

    fn push(&mut self, entry: TreeEntry) -> Result<()> {
        if !self.paths.insert(entry.path.clone()) {
            return Err(ScaffoldError::internal(format!(
                "duplicate path '{}' in generated tree",
                entry.path
            )));
        }
        self.entries.push(entry);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    service_type: &'a str,
    label: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_port: Option<u16>,
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionSummary<'a> {
    id: &'a str,
    source: &'a str,
    target: &'a str,
    #[serde(rename = "type")]
    connection_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScaffoldMetadata<'a> {
    generator: &'static str,
    version: &'static str,
    project: &'a str,
    slug: &'a str,
    description: &'a str,
    services: Vec<ServiceSummary<'a>>,
    connections: Vec<ConnectionSummary<'a>>,
    warnings: &'a [GraphWarning],
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Map<String, serde_json::Value>>,
}

pub struct FileTreeBuilder;

impl FileTreeBuilder {
    pub fn build(
        wired: &WiredGraph,
        manifest: &ComposeManifest,
        deadline: &Deadline,
    ) -> Result<VirtualFileTree> {
        let graph = wired.validated().graph();
        let mut tree = VirtualFileTree::default();

        for (validated, service) in wired.iter() {
            deadline.check(Stage::Rendering)?;

            let ctx = RenderContext {
                project_name: &graph.name,
                node_id: &validated.id,
                label: &validated.label,
                service_name: &service.service_name,
                port: service.port,
                environment: &service.environment,
                links: &service.links,
            };

            let dir = &service.service_name;
            tree.add_directory(dir)?;
            for file in validated.template.render_source_files(&ctx) {
                check_relative_path(validated.template.service_type(), &file.path)?;
                tree.add_file(&format!("{}/{}", dir, file.path), file.contents, file.executable)?;
            }
            tree.add_file(
                &format!("{}/Dockerfile", dir),
                validated.template.render_dockerfile(&ctx),
                false,
            )?;
        }

        tree.add_file(MANIFEST_FILE, manifest.to_yaml()?, false)?;
        tree.add_file(README_FILE, render_readme(wired, manifest), false)?;
        tree.add_file(METADATA_FILE, render_metadata(wired, manifest)?, false)?;

        tracing::debug!(
            "Built file tree with {} entries ({} bytes)",
            tree.len(),
            tree.total_bytes()
        );
        Ok(tree)
    }
}

fn check_relative_path(service_type: &str, path: &str) -> Result<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.ends_with('/')
        || path.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(ScaffoldError::internal(format!(
            "template '{}' produced an invalid path '{}'",
            service_type, path
        )));
    }
    Ok(())
}

fn render_metadata(wired: &WiredGraph, manifest: &ComposeManifest) -> Result<String> {
    let graph = wired.validated().graph();
    let services = wired
        .iter()
        .map(|(validated, service)| ServiceSummary {
            id: &validated.id,
            name: &service.service_name,
            service_type: &validated.service_type,
            label: &validated.label,
            port: service.port,
            host_port: service.host_port,
            depends_on: service.depends_on(),
            position: graph.service(&validated.id).and_then(|n| n.position.as_ref()),
        })
        .collect();
    let connections = graph
        .connections
        .iter()
        .map(|c| ConnectionSummary {
            id: &c.id,
            source: &c.source,
            target: &c.target,
            connection_type: &c.connection_type,
        })
        .collect();

    let metadata = ScaffoldMetadata {
        generator: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        project: &graph.name,
        slug: &manifest.name,
        description: &graph.description,
        services,
        connections,
        warnings: &manifest.warnings,
        metadata: graph.metadata.as_ref(),
    };
    let mut json = serde_json::to_string_pretty(&metadata)?;
    json.push('\n');
    Ok(json)
}

fn render_readme(wired: &WiredGraph, manifest: &ComposeManifest) -> String {
    let graph = wired.validated().graph();
    let title = if graph.name.trim().is_empty() {
        manifest.name.as_str()
    } else {
        graph.name.trim()
    };

    let mut out = format!("# {}\n\n", title);
    if !graph.description.trim().is_empty() {
        out.push_str(graph.description.trim());
        out.push_str("\n\n");
    }

    out.push_str("## Services\n\n| Service | Label | Type | Port | Depends on |\n|---|---|---|---|---|\n");
    for (validated, service) in wired.iter() {
        let port = match service.host_port {
            Some(host) => format!("{} (published)", host),
            None => service.port.to_string(),
        };
        let deps = service.depends_on();
        out.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            service.service_name,
            markdown_cell(&validated.label),
            validated.template.display_name(),
            port,
            if deps.is_empty() { "-".to_string() } else { deps.join(", ") }
        ));
    }

    if !graph.connections.is_empty() {
        out.push_str("\n## Connections\n\n");
        for connection in &graph.connections {
            let name_of = |id: &str| {
                wired
                    .by_id(id)
                    .map(|s| s.service_name.clone())
                    .unwrap_or_else(|| id.to_string())
            };
            out.push_str(&format!(
                "- `{}` -> `{}` ({})\n",
                name_of(&connection.source),
                name_of(&connection.target),
                markdown_cell(&connection.connection_type)
            ));
        }
    }

    let wired_vars: Vec<(&str, Vec<String>)> = wired
        .services()
        .iter()
        .filter(|s| !s.links.is_empty())
        .map(|s| (s.service_name.as_str(), link_vars(&s.links)))
        .collect();
    if !wired_vars.is_empty() {
        out.push_str("\n## Service wiring\n\nEach service receives the address of its dependencies:\n\n");
        for (name, vars) in wired_vars {
            out.push_str(&format!("- `{}`: {}\n", name, vars.join(", ")));
        }
    }

    if !manifest.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for warning in &manifest.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out.push_str(&format!(
        "\n## Running\n\n```sh\ndocker compose up --build\n```\n\nAll services share the `{}` network and reach each other by service name.\n",
        manifest.network_name().unwrap_or("default")
    ));
    out
}

/// Free text on one line, with pipes escaped so it cannot split a table cell.
fn markdown_cell(value: &str) -> String {
    let text = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return "-".to_string();
    }
    text.replace('\\', "\\\\").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_paths_rejected() {
        let mut tree = VirtualFileTree::default();
        tree.add_directory("api").unwrap();
        tree.add_file("api/Dockerfile", "FROM scratch\n", false).unwrap();
        assert!(tree.add_file("api/Dockerfile", "FROM alpine\n", false).is_err());
        assert!(tree.add_directory("api/").is_err());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.contents_str("api/Dockerfile"), Some("FROM scratch\n"));
    }

    #[test]
    fn test_markdown_cells_cannot_split_tables() {
        assert_eq!(markdown_cell("Orders | Billing"), "Orders \\| Billing");
        assert_eq!(markdown_cell("a\\|b"), "a\\\\\\|b");
        assert_eq!(markdown_cell("two\nlines"), "two lines");
        assert_eq!(markdown_cell("  "), "-");
    }

    #[test]
    fn test_template_paths_must_stay_inside_service() {
        assert!(check_relative_path("x", "src/index.js").is_ok());
        assert!(check_relative_path("x", ".env.example").is_ok());
        assert!(check_relative_path("x", "../escape.sh").is_err());
        assert!(check_relative_path("x", "/etc/passwd").is_err());
        assert!(check_relative_path("x", "a//b").is_err());
        assert!(check_relative_path("x", "").is_err());
    }
}
