pub mod config;
pub mod core;
pub mod domain;
#[cfg(feature = "server")]
pub mod server;
pub mod templates;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ScaffoldConfig;

pub use crate::core::{EngineSettings, PackedArchive, ScaffoldEngine};
pub use domain::model::{Connection, GenerateRequest, ProjectGraph, ServiceConfig, ServiceNode};
pub use templates::{ServiceTemplate, TemplateRegistry};
pub use utils::error::{Result, ScaffoldError};
