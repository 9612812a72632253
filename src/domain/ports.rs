use crate::core::state::PipelineState;
use crate::domain::model::ProjectGraph;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read-only access to previously saved projects.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load_project(&self, id: &str) -> Result<ProjectGraph>;
}

/// Receives every pipeline state transition.
pub trait PipelineObserver: Send + Sync {
    fn on_transition(&self, state: &PipelineState);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_transition(&self, _state: &PipelineState) {}
}
