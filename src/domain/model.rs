use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_connection_type() -> String {
    "generic".to_string()
}

/// Raw service configuration as the editor sends it.
///
/// Values stay loosely typed here; the validator turns them into a
/// [`ServiceSettings`](crate::core::validator::ServiceSettings) or reports them
/// as malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<serde_json::Value>,
    #[serde(default)]
    pub environment: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub volumes: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub config: ServiceConfig,
    /// Canvas coordinates, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_connection_type")]
    pub connection_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectGraph {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<ServiceNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ProjectGraph {
    pub fn from_json_str(content: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceNode> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<ServiceNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl GenerateRequest {
    /// True when the request only points at a stored project.
    pub fn is_reload(&self) -> bool {
        self.project_id.is_some() && self.services.is_empty()
    }

    pub fn into_graph(self) -> ProjectGraph {
        ProjectGraph {
            name: self.project_name,
            description: self.description,
            services: self.services,
            connections: self.connections,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_editor_payload() {
        let json = r#"{
            "name": "shop",
            "services": [
                {"id": "a", "type": "react", "label": "Web", "icon": "x",
                 "position": {"x": 10, "y": 20},
                 "config": {"port": 3000, "environment": {"A": "1"}, "volumes": []}}
            ],
            "connections": [
                {"id": "edge-a-b", "source": "a", "target": "b", "animated": true}
            ]
        }"#;

        let graph = ProjectGraph::from_json_str(json).unwrap();
        assert_eq!(graph.name, "shop");
        assert_eq!(graph.services[0].service_type, "react");
        assert_eq!(graph.services[0].config.port, Some(serde_json::json!(3000)));
        assert!(graph.services[0].position.is_some());
        assert_eq!(graph.connections[0].connection_type, "generic");
        assert!(graph.metadata.is_none());
    }

    #[test]
    fn test_request_reload_detection() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"projectName": "p", "projectId": "42"}"#).unwrap();
        assert!(request.is_reload());

        let graph = request.into_graph();
        assert_eq!(graph.name, "p");
        assert!(graph.services.is_empty());
    }
}
