#[cfg(feature = "cli")]
pub mod cli;
pub mod store;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use store::{build_store, HttpProjectStore, LocalProjectStore};
pub use toml_config::{ScaffoldConfig, StoreKind};
