use crate::core::archive::{ArchivePackager, PackedArchive};
use crate::core::compose::{ComposeAssembler, ComposeManifest};
use crate::core::file_tree::{FileTreeBuilder, VirtualFileTree};
use crate::core::state::{Deadline, PipelineTracker, Stage};
use crate::core::validator::{GraphValidator, GraphWarning};
use crate::core::wiring::WiringResolver;
use crate::domain::model::ProjectGraph;
use crate::domain::ports::{NoopObserver, PipelineObserver};
use crate::templates::TemplateRegistry;
use crate::utils::error::{Result, ScaffoldError};
use std::io::{Seek, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_SERVICES: usize = 200;
pub const DEFAULT_MAX_CONNECTIONS: usize = 2000;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_services: usize,
    pub max_connections: usize,
    /// `None` disables the deadline.
    pub deadline: Option<Duration>,
    /// Trees larger than this are packed into a temp file instead of memory.
    pub spool_threshold: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_services: DEFAULT_MAX_SERVICES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            deadline: Some(DEFAULT_DEADLINE),
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

/// Everything produced before packaging.
#[derive(Debug, Clone)]
pub struct RenderedProject {
    pub tree: VirtualFileTree,
    pub manifest: ComposeManifest,
    pub warnings: Vec<GraphWarning>,
}

/// Runs a project graph through validation, wiring, rendering and packaging.
///
/// The engine holds no per-request state; one instance is shared by all callers.
pub struct ScaffoldEngine {
    registry: Arc<TemplateRegistry>,
    validator: GraphValidator,
    settings: EngineSettings,
}

impl ScaffoldEngine {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self::with_settings(registry, EngineSettings::default())
    }

    pub fn with_settings(registry: Arc<TemplateRegistry>, settings: EngineSettings) -> Self {
        Self {
            validator: GraphValidator::new(registry.clone()),
            registry,
            settings,
        }
    }

    pub fn builtin() -> Self {
        Self::new(TemplateRegistry::builtin())
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn deadline(&self) -> Deadline {
        match self.settings.deadline {
            Some(budget) => Deadline::after(budget),
            None => Deadline::unbounded(),
        }
    }

    fn check_limits(&self, graph: &ProjectGraph) -> Result<()> {
        if graph.services.len() > self.settings.max_services {
            return Err(ScaffoldError::GraphTooLarge {
                what: "services",
                count: graph.services.len(),
                limit: self.settings.max_services,
            });
        }
        if graph.connections.len() > self.settings.max_connections {
            return Err(ScaffoldError::GraphTooLarge {
                what: "connections",
                count: graph.connections.len(),
                limit: self.settings.max_connections,
            });
        }
        Ok(())
    }

    /// Runs every stage up to and including rendering. On error the tracker
    /// is left in `Failed` at the stage that broke.
    pub fn render(
        &self,
        graph: ProjectGraph,
        deadline: &Deadline,
        tracker: &mut PipelineTracker<'_>,
    ) -> Result<RenderedProject> {
        let result = self.render_stages(graph, deadline, tracker);
        result.map_err(|err| tracker.fail(err))
    }

    fn render_stages(
        &self,
        graph: ProjectGraph,
        deadline: &Deadline,
        tracker: &mut PipelineTracker<'_>,
    ) -> Result<RenderedProject> {
        self.check_limits(&graph)?;

        tracker.advance(Stage::Validating)?;
        deadline.check(Stage::Validating)?;
        let validated = self.validator.validate(graph)?;

        tracker.advance(Stage::Resolving)?;
        deadline.check(Stage::Resolving)?;
        let wired = WiringResolver::resolve(validated)?;

        tracker.advance(Stage::Rendering)?;
        deadline.check(Stage::Rendering)?;
        let manifest = ComposeAssembler::assemble(&wired);
        let tree = FileTreeBuilder::build(&wired, &manifest, deadline)?;

        Ok(RenderedProject {
            warnings: manifest.warnings.clone(),
            tree,
            manifest,
        })
    }

    fn run<T>(
        &self,
        graph: ProjectGraph,
        observer: &dyn PipelineObserver,
        pack: impl FnOnce(&VirtualFileTree, &Deadline) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let deadline = self.deadline();
        let mut tracker = PipelineTracker::with_observer(observer);
        let project = graph.name.clone();

        tracing::info!(
            "Generating scaffold for '{}' ({} services, {} connections)",
            project,
            graph.services.len(),
            graph.connections.len()
        );

        let rendered = self.render(graph, &deadline, &mut tracker)?;

        let packed = tracker
            .advance(Stage::Packaging)
            .and_then(|_| deadline.check(Stage::Packaging))
            .and_then(|_| pack(&rendered.tree, &deadline))
            .map_err(|err| tracker.fail(err))?;
        tracker.complete()?;

        tracing::info!(
            "Generated scaffold for '{}': {} entries, {} warnings in {:?}",
            project,
            rendered.tree.len(),
            rendered.warnings.len(),
            started.elapsed()
        );
        Ok(packed)
    }

    pub fn generate(&self, graph: ProjectGraph) -> Result<Vec<u8>> {
        self.generate_with_observer(graph, &NoopObserver)
    }

    pub fn generate_with_observer(
        &self,
        graph: ProjectGraph,
        observer: &dyn PipelineObserver,
    ) -> Result<Vec<u8>> {
        self.run(graph, observer, ArchivePackager::pack)
    }

    /// Packs straight into `writer`. Nothing is written unless every earlier
    /// stage succeeded.
    pub fn generate_into<W: Write + Seek>(
        &self,
        graph: ProjectGraph,
        writer: W,
        observer: &dyn PipelineObserver,
    ) -> Result<W> {
        self.run(graph, observer, |tree, deadline| {
            ArchivePackager::pack_into(tree, writer, deadline)
        })
    }

    pub fn generate_spooled(
        &self,
        graph: ProjectGraph,
        observer: &dyn PipelineObserver,
    ) -> Result<PackedArchive> {
        let threshold = self.settings.spool_threshold;
        self.run(graph, observer, |tree, deadline| {
            ArchivePackager::pack_spooled(tree, deadline, threshold)
        })
    }

    /// Runs the pipeline on the blocking pool, bounded by the configured deadline.
    pub async fn generate_async(self: Arc<Self>, graph: ProjectGraph) -> Result<PackedArchive> {
        let budget = self.settings.deadline;
        let task = tokio::task::spawn_blocking(move || self.generate_spooled(graph, &NoopObserver));

        let joined = match budget {
            Some(budget) => tokio::time::timeout(budget, task).await.map_err(|_| {
                ScaffoldError::GenerationTimeout {
                    stage: "generation".to_string(),
                    deadline: budget,
                }
            })?,
            None => task.await,
        };
        joined.map_err(|err| ScaffoldError::internal(format!("generation task failed: {}", err)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::PipelineState;
    use crate::domain::model::{Connection, ServiceNode};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<PipelineState>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_transition(&self, state: &PipelineState) {
            self.seen.lock().unwrap().push(state.clone());
        }
    }

    fn node(id: &str, service_type: &str, label: &str) -> ServiceNode {
        ServiceNode {
            id: id.to_string(),
            service_type: service_type.to_string(),
            label: label.to_string(),
            config: Default::default(),
            position: None,
        }
    }

    fn sample_graph() -> ProjectGraph {
        ProjectGraph {
            name: "Shop".to_string(),
            services: vec![node("n1", "node", "API"), node("n2", "postgresql", "Orders DB")],
            connections: vec![Connection {
                id: "c1".to_string(),
                source: "n1".to_string(),
                target: "n2".to_string(),
                connection_type: "database".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_walks_every_stage() {
        let engine = ScaffoldEngine::builtin();
        let observer = RecordingObserver::default();

        let bytes = engine.generate_with_observer(sample_graph(), &observer).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&PipelineState::Complete));
    }

    #[test]
    fn test_validation_failure_stops_pipeline() {
        let engine = ScaffoldEngine::builtin();
        let observer = RecordingObserver::default();
        let mut graph = sample_graph();
        graph.connections[0].target = "missing".to_string();

        let err = engine.generate_with_observer(graph, &observer).unwrap_err();
        assert!(matches!(err, ScaffoldError::Validation { .. }));

        let seen = observer.seen.lock().unwrap();
        assert!(matches!(
            seen.last(),
            Some(PipelineState::Failed {
                stage: Stage::Validating,
                ..
            })
        ));
        assert!(!seen.contains(&PipelineState::Active(Stage::Rendering)));
    }

    #[test]
    fn test_size_limits_checked_before_validation() {
        let settings = EngineSettings {
            max_services: 1,
            ..Default::default()
        };
        let engine = ScaffoldEngine::with_settings(TemplateRegistry::builtin(), settings);
        let observer = RecordingObserver::default();

        let err = engine.generate_with_observer(sample_graph(), &observer).unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::GraphTooLarge {
                what: "services",
                count: 2,
                limit: 1
            }
        ));
        assert!(matches!(
            observer.seen.lock().unwrap().last(),
            Some(PipelineState::Failed {
                stage: Stage::Received,
                ..
            })
        ));
    }

    #[test]
    fn test_expired_deadline_yields_timeout() {
        let settings = EngineSettings {
            deadline: Some(Duration::ZERO),
            ..Default::default()
        };
        let engine = ScaffoldEngine::with_settings(TemplateRegistry::builtin(), settings);
        let err = engine.generate(sample_graph()).unwrap_err();
        assert!(matches!(err, ScaffoldError::GenerationTimeout { .. }));
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn test_render_exposes_tree_and_manifest() {
        let engine = ScaffoldEngine::builtin();
        let mut tracker = PipelineTracker::new();
        let rendered = engine
            .render(sample_graph(), &Deadline::unbounded(), &mut tracker)
            .unwrap();

        assert_eq!(tracker.current_stage(), Some(Stage::Rendering));
        assert!(rendered.tree.get("api/").is_some());
        assert!(rendered.tree.get("orders-db/Dockerfile").is_some());
        assert_eq!(rendered.manifest.services.len(), 2);
        assert!(rendered.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_generate_async_matches_sync() {
        let engine = Arc::new(ScaffoldEngine::builtin());
        let sync = engine.generate(sample_graph()).unwrap();
        let packed = engine.clone().generate_async(sample_graph()).await.unwrap();
        assert_eq!(packed.into_bytes().unwrap(), sync);
    }
}
