use kontrol_scaffold::core::state::{Deadline, PipelineState, PipelineTracker, Stage};
use kontrol_scaffold::utils::error::IssueKind;
use kontrol_scaffold::{ProjectGraph, ScaffoldEngine, ScaffoldError};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

fn graph(value: serde_json::Value) -> ProjectGraph {
    serde_json::from_value(value).unwrap()
}

fn shop_graph() -> ProjectGraph {
    graph(json!({
        "name": "Shop",
        "description": "Storefront with an API and two datastores",
        "services": [
            {"id": "web", "type": "react", "label": "Storefront", "position": {"x": 0, "y": 0}},
            {"id": "n1", "type": "node", "label": "API", "config": {"port": 5000}},
            {"id": "n2", "type": "mongodb", "label": "Users DB"},
            {"id": "cache", "type": "redis", "label": "Cache"}
        ],
        "connections": [
            {"id": "c1", "source": "web", "target": "n1", "type": "http"},
            {"id": "c2", "source": "n1", "target": "n2", "type": "database"},
            {"id": "c3", "source": "n1", "target": "cache"}
        ]
    }))
}

fn unzip(bytes: Vec<u8>) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        entries.insert(file.name().to_string(), contents);
    }
    entries
}

fn text(entries: &BTreeMap<String, Vec<u8>>, path: &str) -> String {
    String::from_utf8(entries[path].clone()).unwrap()
}

#[test]
fn test_valid_graph_produces_one_manifest_and_one_directory_per_service() {
    let engine = ScaffoldEngine::builtin();
    let entries = unzip(engine.generate(shop_graph()).unwrap());

    let manifests: Vec<_> = entries
        .keys()
        .filter(|p| p.ends_with("docker-compose.yml"))
        .collect();
    assert_eq!(manifests, vec!["docker-compose.yml"]);

    let directories: BTreeSet<&str> = entries
        .keys()
        .filter(|p| p.ends_with('/'))
        .map(String::as_str)
        .collect();
    assert_eq!(
        directories,
        BTreeSet::from(["api/", "cache/", "storefront/", "users-db/"])
    );
    for dir in &directories {
        assert!(entries.contains_key(&format!("{}Dockerfile", dir)));
    }
    assert!(entries.contains_key("README.md"));
    assert!(entries.contains_key("scaffold.json"));
}

#[test]
fn test_dangling_connection_fails_before_template_resolution() {
    let engine = ScaffoldEngine::builtin();
    let mut tracker = PipelineTracker::new();
    let input = graph(json!({
        "name": "broken",
        "services": [
            {"id": "a", "type": "node", "label": "A"},
            {"id": "b", "type": "cobol", "label": "B"}
        ],
        "connections": [{"id": "c1", "source": "a", "target": "ghost"}]
    }));

    let err = engine
        .render(input, &Deadline::unbounded(), &mut tracker)
        .unwrap_err();
    let ScaffoldError::Validation { issues } = err else {
        panic!("expected a validation error, got {:?}", err);
    };
    assert_eq!(issues[0].kind, IssueKind::DanglingConnection);
    assert_eq!(issues[0].connection_ids, vec!["c1"]);
    assert!(matches!(
        tracker.state(),
        PipelineState::Failed {
            stage: Stage::Validating,
            ..
        }
    ));
}

#[test]
fn test_unsupported_type_renders_nothing() {
    let engine = ScaffoldEngine::builtin();
    let mut tracker = PipelineTracker::new();
    let input = graph(json!({
        "name": "legacy",
        "services": [
            {"id": "a", "type": "node", "label": "A"},
            {"id": "b", "type": "cobol", "label": "Mainframe"}
        ]
    }));

    let err = engine
        .render(input, &Deadline::unbounded(), &mut tracker)
        .unwrap_err();
    match &err {
        ScaffoldError::UnsupportedServiceType {
            offenders,
            supported,
        } => {
            assert_eq!(offenders.len(), 1);
            assert_eq!(offenders[0].node_id, "b");
            assert_eq!(offenders[0].service_type, "cobol");
            assert!(supported.contains(&"node".to_string()));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.status_code(), 422);
    assert!(!tracker
        .history()
        .contains(&PipelineState::Active(Stage::Rendering)));
}

#[test]
fn test_port_collision_names_both_services() {
    let engine = ScaffoldEngine::builtin();
    let input = graph(json!({
        "name": "two-dbs",
        "services": [
            {"id": "db1", "type": "postgresql", "label": "Orders", "config": {"port": 5432}},
            {"id": "db2", "type": "postgresql", "label": "Billing", "config": {"port": 5432}}
        ]
    }));

    let err = engine.generate(input).unwrap_err();
    assert_eq!(err.status_code(), 400);
    let ScaffoldError::Validation { issues } = err else {
        panic!("expected a validation error");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::PortCollision);
    assert_eq!(issues[0].node_ids, vec!["db1", "db2"]);
    assert!(issues[0].message.contains("5432"));
}

#[test]
fn test_dependency_receives_target_address() {
    let engine = ScaffoldEngine::builtin();
    let input = graph(json!({
        "name": "users",
        "services": [
            {"id": "n1", "type": "node", "label": "API", "config": {"port": 5000}},
            {"id": "n2", "type": "mongodb", "label": "Users DB"}
        ],
        "connections": [{"id": "c1", "source": "n1", "target": "n2"}]
    }));

    let rendered = engine
        .render(input, &Deadline::unbounded(), &mut PipelineTracker::new())
        .unwrap();
    let api = rendered.manifest.services.get("api").unwrap();
    assert_eq!(api.environment["USERS_DB_HOST"], "users-db");
    assert_eq!(api.environment["USERS_DB_PORT"], "27017");
    assert_eq!(
        api.environment["USERS_DB_URL"],
        "mongodb://users-db:27017/users_db"
    );
    assert_eq!(api.depends_on, vec!["users-db"]);
    assert_eq!(api.ports, vec!["5000:5000"]);

    let db = rendered.manifest.services.get("users-db").unwrap();
    assert!(db.depends_on.is_empty());
    assert_eq!(db.expose, vec!["27017"]);
}

#[test]
fn test_user_environment_wins_over_derived_values() {
    let engine = ScaffoldEngine::builtin();
    let input = graph(json!({
        "name": "users",
        "services": [
            {"id": "n1", "type": "node", "label": "API",
             "config": {"environment": {"USERS_DB_HOST": "db.internal", "DEBUG": true}}},
            {"id": "n2", "type": "mongodb", "label": "Users DB"}
        ],
        "connections": [{"id": "c1", "source": "n1", "target": "n2"}]
    }));

    let rendered = engine
        .render(input, &Deadline::unbounded(), &mut PipelineTracker::new())
        .unwrap();
    let api = rendered.manifest.services.get("api").unwrap();
    assert_eq!(api.environment["USERS_DB_HOST"], "db.internal");
    assert_eq!(api.environment["USERS_DB_PORT"], "27017");
    assert_eq!(api.environment["DEBUG"], "true");
}

#[test]
fn test_identical_input_gives_identical_archive() {
    let engine = ScaffoldEngine::builtin();
    let first = engine.generate(shop_graph()).unwrap();
    let second = engine.generate(shop_graph()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reordering_services_only_reorders_directories() {
    let engine = ScaffoldEngine::builtin();
    let original = unzip(engine.generate(shop_graph()).unwrap());

    let mut reordered = shop_graph();
    reordered.services.reverse();
    let reordered = unzip(engine.generate(reordered).unwrap());

    let names = |entries: &BTreeMap<String, Vec<u8>>| entries.keys().cloned().collect::<BTreeSet<_>>();
    assert_eq!(names(&original), names(&reordered));
    for (path, contents) in &original {
        if path.contains('/') {
            assert_eq!(contents, &reordered[path], "{} differs", path);
        }
    }
}

#[test]
fn test_zero_services_is_a_validation_error() {
    let engine = ScaffoldEngine::builtin();
    let err = engine
        .generate(graph(json!({"name": "empty", "services": [], "connections": []})))
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    let ScaffoldError::Validation { issues } = &err else {
        panic!("expected a validation error");
    };
    assert_eq!(issues[0].kind, IssueKind::EmptyGraph);
    assert!(err.to_string().contains("no services"));
}

#[test]
fn test_warnings_are_recorded_in_metadata() {
    let engine = ScaffoldEngine::builtin();
    let input = graph(json!({
        "name": "loops",
        "services": [
            {"id": "a", "type": "node", "label": "A"},
            {"id": "b", "type": "python-flask", "label": "B"}
        ],
        "connections": [
            {"id": "self", "source": "a", "target": "a"},
            {"id": "ab", "source": "a", "target": "b"},
            {"id": "ba", "source": "b", "target": "a"}
        ]
    }));

    let entries = unzip(engine.generate(input).unwrap());
    let metadata: serde_json::Value = serde_json::from_slice(&entries["scaffold.json"]).unwrap();
    let kinds: Vec<&str> = metadata["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"self_loop"));
    assert!(kinds.contains(&"dependency_cycle"));

    let readme = text(&entries, "README.md");
    assert!(readme.contains("## Warnings"));

    let compose: serde_yaml::Value = serde_yaml::from_slice(&entries["docker-compose.yml"]).unwrap();
    let a_deps = &compose["services"]["a"]["depends_on"];
    assert_eq!(a_deps.as_sequence().unwrap().len(), 1);
}

#[test]
fn test_compose_manifest_is_wired_on_one_network() {
    let engine = ScaffoldEngine::builtin();
    let entries = unzip(engine.generate(shop_graph()).unwrap());
    let compose: serde_yaml::Value = serde_yaml::from_slice(&entries["docker-compose.yml"]).unwrap();

    assert!(compose["networks"]["shop-network"].is_mapping());
    let api = &compose["services"]["api"];
    assert_eq!(api["build"]["context"].as_str(), Some("./api"));
    assert_eq!(api["networks"][0].as_str(), Some("shop-network"));
    assert!(compose["volumes"]["users-db-data"].is_mapping());
    assert!(compose["volumes"]["cache-data"].is_mapping());
}

#[test]
fn test_readme_keeps_free_text_inside_its_cells() {
    let engine = ScaffoldEngine::builtin();
    let input = graph(json!({
        "name": "pipes",
        "services": [
            {"id": "a", "type": "node", "label": "Orders | Billing"},
            {"id": "b", "type": "redis", "label": "Cache"}
        ],
        "connections": [{"id": "c1", "source": "a", "target": "b", "type": "cache|\n## Injected"}]
    }));

    let readme = text(&unzip(engine.generate(input).unwrap()), "README.md");
    let row = readme
        .lines()
        .find(|line| line.starts_with("| `orders-billing`"))
        .unwrap();
    assert_eq!(row.matches(" | ").count(), 4);
    assert!(row.contains("Orders \\| Billing"));
    assert!(readme.contains("(cache\\| ## Injected)"));
    assert!(!readme.lines().any(|line| line.starts_with("## Injected")));
    assert!(readme.contains("- `orders-billing`: CACHE_HOST, CACHE_PORT, CACHE_URL\n"));
}
