use crate::domain::model::{ProjectGraph, ServiceNode};
use crate::templates::{ServiceTemplate, TemplateRegistry};
use crate::utils::error::{IssueKind, Result, ScaffoldError, UnsupportedType, ValidationIssue};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Non-fatal findings carried through to the generated metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    SelfLoop {
        connection_id: String,
        node_id: String,
    },
    DependencyCycle {
        services: Vec<String>,
    },
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphWarning::SelfLoop {
                connection_id,
                node_id,
            } => write!(
                f,
                "connection '{}' connects service '{}' to itself and was ignored for wiring",
                connection_id, node_id
            ),
            GraphWarning::DependencyCycle { services } => write!(
                f,
                "dependency cycle {}; start order between these services is not guaranteed",
                services.join(" -> ")
            ),
        }
    }
}

/// Typed service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    pub port: Option<u16>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ValidatedService {
    pub id: String,
    pub label: String,
    pub service_type: String,
    pub template: Arc<dyn ServiceTemplate>,
    pub settings: ServiceSettings,
}

impl ValidatedService {
    /// Explicit port, else the template default.
    pub fn resolved_port(&self) -> u16 {
        self.settings
            .port
            .unwrap_or_else(|| self.template.default_port())
    }
}

/// A graph that passed every check, with services in confirmed (input) order.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: ProjectGraph,
    services: Vec<ValidatedService>,
    index: HashMap<String, usize>,
    warnings: Vec<GraphWarning>,
}

impl ValidatedGraph {
    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    pub fn services(&self) -> &[ValidatedService] {
        &self.services
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn service(&self, id: &str) -> Option<&ValidatedService> {
        self.position_of(id).map(|i| &self.services[i])
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }
}

pub struct GraphValidator {
    registry: Arc<TemplateRegistry>,
}

impl GraphValidator {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    /// Runs the checks category by category, stopping at the first category
    /// that has offenders and reporting all of them.
    pub fn validate(&self, graph: ProjectGraph) -> Result<ValidatedGraph> {
        if graph.services.is_empty() {
            return Err(ScaffoldError::validation(vec![ValidationIssue {
                kind: IssueKind::EmptyGraph,
                message: "project has no services; add at least one service to generate a scaffold"
                    .to_string(),
                node_ids: Vec::new(),
                connection_ids: Vec::new(),
            }]));
        }

        fail_on(check_duplicate_ids(&graph))?;
        fail_on(check_dangling_connections(&graph))?;
        let templates = self.resolve_templates(&graph)?;

        let (settings, malformed) = parse_settings(&graph.services);
        fail_on(check_port_collisions(&graph.services, &settings))?;
        fail_on(malformed)?;

        let warnings = graph
            .connections
            .iter()
            .filter(|c| c.source == c.target)
            .map(|c| GraphWarning::SelfLoop {
                connection_id: c.id.clone(),
                node_id: c.source.clone(),
            })
            .collect::<Vec<_>>();
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let services: Vec<ValidatedService> = graph
            .services
            .iter()
            .zip(templates)
            .zip(settings)
            .map(|((node, template), settings)| ValidatedService {
                id: node.id.clone(),
                label: node.label.clone(),
                service_type: node.service_type.clone(),
                template,
                settings: settings.unwrap_or_default(),
            })
            .collect();
        let index = services
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        tracing::debug!(
            "Validated graph '{}' with {} services and {} connections",
            graph.name,
            services.len(),
            graph.connections.len()
        );

        Ok(ValidatedGraph {
            graph,
            services,
            index,
            warnings,
        })
    }

    fn resolve_templates(&self, graph: &ProjectGraph) -> Result<Vec<Arc<dyn ServiceTemplate>>> {
        let mut templates = Vec::with_capacity(graph.services.len());
        let mut offenders = Vec::new();
        for node in &graph.services {
            match self.registry.get(&node.service_type) {
                Some(template) => templates.push(template),
                None => offenders.push(UnsupportedType {
                    node_id: node.id.clone(),
                    service_type: node.service_type.clone(),
                }),
            }
        }
        if offenders.is_empty() {
            Ok(templates)
        } else {
            Err(ScaffoldError::UnsupportedServiceType {
                offenders,
                supported: self.registry.supported_types(),
            })
        }
    }
}

fn fail_on(issues: Vec<ValidationIssue>) -> Result<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ScaffoldError::validation(issues))
    }
}

fn check_duplicate_ids(graph: &ProjectGraph) -> Vec<ValidationIssue> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut order = Vec::new();
    for node in &graph.services {
        let count = counts.entry(node.id.as_str()).or_insert(0);
        if *count == 1 {
            order.push(node.id.as_str());
        }
        *count += 1;
    }
    order
        .into_iter()
        .map(|id| ValidationIssue {
            kind: IssueKind::DuplicateId,
            message: format!("service id '{}' is used by {} services", id, counts[id]),
            node_ids: vec![id.to_string()],
            connection_ids: Vec::new(),
        })
        .collect()
}

fn check_dangling_connections(graph: &ProjectGraph) -> Vec<ValidationIssue> {
    let ids: HashSet<&str> = graph.services.iter().map(|s| s.id.as_str()).collect();
    let mut issues = Vec::new();
    for connection in &graph.connections {
        let missing: Vec<String> = [&connection.source, &connection.target]
            .into_iter()
            .filter(|endpoint| !ids.contains(endpoint.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            issues.push(ValidationIssue {
                kind: IssueKind::DanglingConnection,
                message: format!(
                    "connection '{}' references unknown service(s): {}",
                    connection.id,
                    missing.join(", ")
                ),
                node_ids: missing,
                connection_ids: vec![connection.id.clone()],
            });
        }
    }
    issues
}

/// Host ports only matter when set explicitly; malformed ports are skipped
/// here and reported by the malformed-config check.
fn check_port_collisions(
    services: &[ServiceNode],
    settings: &[Option<ServiceSettings>],
) -> Vec<ValidationIssue> {
    let mut by_port: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for (node, parsed) in services.iter().zip(settings) {
        if let Some(port) = parsed.as_ref().and_then(|s| s.port) {
            by_port.entry(port).or_default().push(node.id.clone());
        }
    }
    by_port
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(port, ids)| ValidationIssue {
            kind: IssueKind::PortCollision,
            message: format!(
                "host port {} is claimed by services {}",
                port,
                ids.join(", ")
            ),
            node_ids: ids,
            connection_ids: Vec::new(),
        })
        .collect()
}

fn parse_settings(
    services: &[ServiceNode],
) -> (Vec<Option<ServiceSettings>>, Vec<ValidationIssue>) {
    let mut parsed = Vec::with_capacity(services.len());
    let mut issues = Vec::new();

    for node in services {
        let mut problems = Vec::new();
        let mut settings = ServiceSettings::default();

        match node.config.port.as_ref().map(parse_port).transpose() {
            Ok(port) => settings.port = port.flatten(),
            Err(reason) => problems.push(reason),
        }

        for (key, value) in &node.config.environment {
            if let Err(reason) = check_env_key(key) {
                problems.push(reason);
                continue;
            }
            match env_value(value) {
                Some(value) if value.contains(|c| matches!(c, '\n' | '\r' | '\0')) => {
                    problems.push(format!(
                        "environment variable '{}' must be a single line without NUL bytes",
                        key
                    ))
                }
                Some(value) => {
                    settings.environment.insert(key.clone(), value);
                }
                None => problems.push(format!(
                    "environment variable '{}' must be a string, number or boolean",
                    key
                )),
            }
        }

        for (i, volume) in node.config.volumes.iter().enumerate() {
            match volume.as_str().map(str::trim) {
                Some(v) if !v.is_empty() => settings.volumes.push(v.to_string()),
                _ => problems.push(format!("volume #{} must be a non-empty string", i + 1)),
            }
        }

        if problems.is_empty() {
            parsed.push(Some(settings));
        } else {
            // Keep a valid port so collision checks still see it.
            let port = node
                .config
                .port
                .as_ref()
                .and_then(|p| parse_port(p).ok())
                .flatten();
            parsed.push(Some(ServiceSettings {
                port,
                ..ServiceSettings::default()
            }));
            issues.push(ValidationIssue {
                kind: IssueKind::MalformedConfig,
                message: format!("service '{}': {}", node.id, problems.join(", ")),
                node_ids: vec![node.id.clone()],
                connection_ids: Vec::new(),
            });
        }
    }

    (parsed, issues)
}

/// `0`, `null` and empty strings mean "no port" (the editor writes `0` when
/// the field is cleared).
fn parse_port(value: &Value) -> std::result::Result<Option<u16>, String> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None if n.as_u64().is_some() => i64::MAX,
            None => return Err(format!("port {} must be an integer", n)),
        },
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("port '{}' is not a number", s))?,
        other => return Err(format!("port {} must be an integer", other)),
    };

    match number {
        0 => Ok(None),
        1..=65535 => Ok(Some(number as u16)),
        _ => Err(format!("port {} is outside 1-65535", number)),
    }
}

fn check_env_key(key: &str) -> std::result::Result<(), String> {
    if key.is_empty() {
        return Err("environment variable name is empty".to_string());
    }
    if key.contains('=') || key.contains('\0') || key.chars().any(char::is_whitespace) {
        return Err(format!("environment variable name '{}' is invalid", key.escape_default()));
    }
    Ok(())
}

fn env_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Connection, ServiceConfig};
    use serde_json::json;

    fn node(id: &str, service_type: &str, port: Option<Value>) -> ServiceNode {
        ServiceNode {
            id: id.to_string(),
            service_type: service_type.to_string(),
            label: id.to_uppercase(),
            config: ServiceConfig {
                port,
                ..ServiceConfig::default()
            },
            position: None,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Connection {
        Connection {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            connection_type: "generic".to_string(),
        }
    }

    fn graph(services: Vec<ServiceNode>, connections: Vec<Connection>) -> ProjectGraph {
        ProjectGraph {
            name: "test".to_string(),
            services,
            connections,
            ..ProjectGraph::default()
        }
    }

    fn validator() -> GraphValidator {
        GraphValidator::new(TemplateRegistry::builtin())
    }

    fn issues(err: ScaffoldError) -> Vec<ValidationIssue> {
        match err {
            ScaffoldError::Validation { issues } => issues,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = validator().validate(graph(vec![], vec![])).unwrap_err();
        assert_eq!(issues(err)[0].kind, IssueKind::EmptyGraph);
    }

    #[test]
    fn test_duplicate_ids_reported_once_each() {
        let g = graph(
            vec![
                node("a", "node", None),
                node("a", "redis", None),
                node("a", "vue", None),
                node("b", "node", None),
            ],
            vec![],
        );
        let found = issues(validator().validate(g).unwrap_err());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_ids, vec!["a"]);
        assert!(found[0].message.contains("3 services"));
    }

    #[test]
    fn test_dangling_checked_before_types() {
        let g = graph(
            vec![node("a", "cobol", None)],
            vec![edge("e1", "a", "ghost"), edge("e2", "nobody", "a")],
        );
        let found = issues(validator().validate(g).unwrap_err());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, IssueKind::DanglingConnection);
        assert_eq!(found[0].connection_ids, vec!["e1"]);
        assert_eq!(found[1].node_ids, vec!["nobody"]);
    }

    #[test]
    fn test_unsupported_types_collected() {
        let g = graph(
            vec![node("a", "cobol", None), node("b", "node", None), node("c", "fortran", None)],
            vec![],
        );
        match validator().validate(g).unwrap_err() {
            ScaffoldError::UnsupportedServiceType { offenders, .. } => {
                let types: Vec<&str> = offenders.iter().map(|o| o.service_type.as_str()).collect();
                assert_eq!(types, vec!["cobol", "fortran"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_port_collision_names_both_services() {
        let g = graph(
            vec![
                node("db1", "postgresql", Some(json!(5432))),
                node("db2", "postgresql", Some(json!(5432))),
                node("api", "node", Some(json!(5000))),
            ],
            vec![],
        );
        let found = issues(validator().validate(g).unwrap_err());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, IssueKind::PortCollision);
        assert_eq!(found[0].node_ids, vec!["db1", "db2"]);
    }

    #[test]
    fn test_malformed_config_values() {
        let mut bad_env = node("b", "node", None);
        bad_env
            .config
            .environment
            .insert("BAD KEY".to_string(), json!("x"));
        bad_env.config.environment.insert("OBJ".to_string(), json!({"a": 1}));

        let g = graph(
            vec![
                node("a", "node", Some(json!(-1))),
                bad_env,
                node("c", "node", Some(json!(70000))),
                node("d", "node", Some(json!("80x"))),
            ],
            vec![],
        );
        let found = issues(validator().validate(g).unwrap_err());
        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|i| i.kind == IssueKind::MalformedConfig));
        assert!(found[0].message.contains("outside 1-65535"));
        assert!(found[1].message.contains("'BAD KEY'"));
        assert!(found[1].message.contains("'OBJ'"));
    }

    #[test]
    fn test_multiline_env_values_rejected() {
        let mut api = node("api", "node", None);
        api.config
            .environment
            .insert("GREETING".to_string(), json!("hi\nNODE_ENV=development"));
        api.config
            .environment
            .insert("TRAILER".to_string(), json!("a\rb"));

        let found = issues(validator().validate(graph(vec![api], vec![])).unwrap_err());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, IssueKind::MalformedConfig);
        assert!(found[0].message.contains("'GREETING' must be a single line"));
        assert!(found[0].message.contains("'TRAILER' must be a single line"));
    }

    #[test]
    fn test_lenient_port_and_env_forms() {
        let mut api = node("api", "node", Some(json!("8081")));
        api.config.environment.insert("DEBUG".to_string(), json!(true));
        api.config.environment.insert("WORKERS".to_string(), json!(4));
        let g = graph(vec![api, node("web", "react", Some(json!(0)))], vec![]);

        let validated = validator().validate(g).unwrap();
        let api = validated.service("api").unwrap();
        assert_eq!(api.settings.port, Some(8081));
        assert_eq!(api.settings.environment["DEBUG"], "true");
        assert_eq!(api.settings.environment["WORKERS"], "4");

        let web = validated.service("web").unwrap();
        assert_eq!(web.settings.port, None);
        assert_eq!(web.resolved_port(), 3000);
    }

    #[test]
    fn test_self_loop_is_a_warning() {
        let g = graph(vec![node("a", "node", None)], vec![edge("loop", "a", "a")]);
        let validated = validator().validate(g).unwrap();
        assert_eq!(
            validated.warnings(),
            &[GraphWarning::SelfLoop {
                connection_id: "loop".to_string(),
                node_id: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_confirmed_order_matches_input() {
        let g = graph(
            vec![node("z", "redis", None), node("a", "node", None), node("m", "vue", None)],
            vec![],
        );
        let validated = validator().validate(g).unwrap();
        let ids: Vec<&str> = validated.services().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(validated.position_of("m"), Some(2));
    }
}
