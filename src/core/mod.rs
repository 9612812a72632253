pub mod archive;
pub mod compose;
pub mod engine;
pub mod file_tree;
pub mod naming;
pub mod state;
pub mod validator;
pub mod wiring;

pub use crate::core::archive::{ArchivePackager, PackedArchive};
pub use crate::core::compose::{ComposeAssembler, ComposeManifest};
pub use crate::core::engine::{EngineSettings, RenderedProject, ScaffoldEngine};
pub use crate::core::file_tree::{FileTreeBuilder, VirtualFileTree};
pub use crate::core::state::{Deadline, PipelineState, PipelineTracker, Stage};
pub use crate::core::validator::{GraphValidator, GraphWarning, ValidatedGraph};
pub use crate::core::wiring::{WiredGraph, WiringResolver};
pub use crate::domain::ports::{PipelineObserver, ProjectStore};
pub use crate::utils::error::Result;
