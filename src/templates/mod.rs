//! Service templates and the registry that maps type tags to them.
//!
//! Everything type-specific (default ports, source stubs, Dockerfiles,
//! connection strings) lives behind [`ServiceTemplate`]. The pipeline stages
//! only ever talk to the trait, so adding a service type means registering a
//! new implementation here.

pub mod backend;
pub mod datastore;
pub mod frontend;
pub mod processing;

use crate::utils::error::{Result, ScaffoldError, UnsupportedType};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Frontend,
    Backend,
    Database,
    Cache,
    Processing,
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceCategory::Frontend => "Frontend",
            ServiceCategory::Backend => "Backend",
            ServiceCategory::Database => "Database",
            ServiceCategory::Cache => "Cache",
            ServiceCategory::Processing => "Processing",
        };
        f.write_str(name)
    }
}

/// A file produced by a template, relative to the service directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: String,
    pub contents: String,
    pub executable: bool,
}

impl RenderedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

/// A dependency of the service being rendered, as seen through its wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLink {
    pub service_name: String,
    /// Variable prefix, e.g. `USERS_DB` for `USERS_DB_HOST`.
    pub env_prefix: String,
    pub has_url: bool,
}

impl ServiceLink {
    pub fn host_var(&self) -> String {
        format!("{}_HOST", self.env_prefix)
    }

    pub fn port_var(&self) -> String {
        format!("{}_PORT", self.env_prefix)
    }

    pub fn url_var(&self) -> String {
        format!("{}_URL", self.env_prefix)
    }
}

/// Everything a template may look at while rendering one service.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub project_name: &'a str,
    pub node_id: &'a str,
    pub label: &'a str,
    pub service_name: &'a str,
    pub port: u16,
    pub environment: &'a BTreeMap<String, String>,
    pub links: &'a [ServiceLink],
}

impl RenderContext<'_> {
    /// Label for headings, falling back to the service name.
    pub fn title(&self) -> &str {
        if self.label.trim().is_empty() {
            self.service_name
        } else {
            self.label.trim()
        }
    }
}

pub trait ServiceTemplate: Send + Sync + fmt::Debug {
    fn service_type(&self) -> &str;

    fn display_name(&self) -> &str;

    fn category(&self) -> ServiceCategory;

    fn default_port(&self) -> u16;

    /// Environment the service needs to boot, before wiring and user values.
    fn default_environment(&self, _service_name: &str, _port: u16) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Connection string for clients of this service, when it has a
    /// well-known scheme. `environment` is the service's own effective
    /// environment, so user-chosen credentials end up in the URL.
    fn connection_url(
        &self,
        _host: &str,
        _port: u16,
        _environment: &BTreeMap<String, String>,
    ) -> Option<String> {
        None
    }

    /// Container path that should be backed by a named volume.
    fn data_mount(&self) -> Option<&str> {
        None
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile>;

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String;
}

/// Catalogue entry exposed to the editor palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    #[serde(rename = "type")]
    pub service_type: String,
    pub name: String,
    pub category: ServiceCategory,
    pub default_port: u16,
}

/// Immutable type-tag -> template map.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<dyn ServiceTemplate>>,
}

static BUILTIN: Lazy<Arc<TemplateRegistry>> = Lazy::new(|| Arc::new(TemplateRegistry::builtin_catalogue()));

impl TemplateRegistry {
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    /// Process-wide registry holding the built-in catalogue.
    pub fn builtin() -> Arc<TemplateRegistry> {
        Arc::clone(&BUILTIN)
    }

    fn builtin_catalogue() -> Self {
        let mut builder = Self::builder();
        for template in frontend::templates()
            .into_iter()
            .chain(backend::templates())
            .chain(datastore::templates())
            .chain(processing::templates())
        {
            builder = builder.register(template);
        }
        builder.build()
    }

    pub fn get(&self, service_type: &str) -> Option<Arc<dyn ServiceTemplate>> {
        self.templates.get(service_type).cloned()
    }

    pub fn resolve(&self, node_id: &str, service_type: &str) -> Result<Arc<dyn ServiceTemplate>> {
        self.get(service_type)
            .ok_or_else(|| ScaffoldError::UnsupportedServiceType {
                offenders: vec![UnsupportedType {
                    node_id: node_id.to_string(),
                    service_type: service_type.to_string(),
                }],
                supported: self.supported_types(),
            })
    }

    pub fn contains(&self, service_type: &str) -> bool {
        self.templates.contains_key(service_type)
    }

    pub fn supported_types(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Catalogue ordered by category, then type tag.
    pub fn catalogue(&self) -> Vec<TemplateInfo> {
        let mut entries: Vec<TemplateInfo> = self
            .templates
            .values()
            .map(|t| TemplateInfo {
                service_type: t.service_type().to_string(),
                name: t.display_name().to_string(),
                category: t.category(),
                default_port: t.default_port(),
            })
            .collect();
        entries.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.service_type.cmp(&b.service_type))
        });
        entries
    }
}

#[derive(Default)]
pub struct TemplateRegistryBuilder {
    templates: BTreeMap<String, Arc<dyn ServiceTemplate>>,
}

impl TemplateRegistryBuilder {
    /// Registers a template; a later registration for the same tag replaces
    /// the earlier one.
    pub fn register(mut self, template: Arc<dyn ServiceTemplate>) -> Self {
        let key = template.service_type().to_string();
        if self.templates.insert(key.clone(), template).is_some() {
            tracing::warn!("Template for '{}' registered twice, keeping the last one", key);
        }
        self
    }

    pub fn build(self) -> TemplateRegistry {
        TemplateRegistry {
            templates: self.templates,
        }
    }
}

/// Shared rendering helpers.
pub(crate) mod render {
    use super::{RenderContext, ServiceLink};

    /// Sorted `KEY=value` lines for `.env.example` files.
    pub fn env_example(ctx: &RenderContext<'_>) -> String {
        let mut out = format!("# Effective environment for {}\n", ctx.service_name);
        for (key, value) in ctx.environment {
            out.push_str(&format!("{}={}\n", key, value));
        }
        out
    }

    /// Environment variable names this service reads to reach its dependencies.
    pub fn link_vars(links: &[ServiceLink]) -> Vec<String> {
        let mut vars = Vec::new();
        for link in links {
            vars.push(link.host_var());
            vars.push(link.port_var());
            if link.has_url {
                vars.push(link.url_var());
            }
        }
        vars
    }

    /// JSON string literal, shared by the JS and Python stubs.
    pub fn quoted(value: &str) -> String {
        serde_json::Value::String(value.to_string()).to_string()
    }

    /// Text safe to place between HTML tags.
    pub fn html_escape(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}
