use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "kontrol-scaffold")]
#[command(about = "Generate a runnable multi-service project scaffold from a service graph")]
pub struct CliConfig {
    #[arg(short, long, help = "Project graph JSON exported from the editor")]
    pub input: String,

    #[arg(short, long, default_value = "./output")]
    pub output: String,

    #[arg(short, long, help = "TOML file with [generation] limits")]
    pub config: Option<String>,

    #[arg(long, help = "Log process statistics at every pipeline stage")]
    pub monitor: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input", &self.input)?;
        validate_file_extension("input", &self.input, &["json"])?;
        validate_path("output", &self.output)?;
        if let Some(config) = &self.config {
            validate_file_extension("config", config, &["toml"])?;
        }
        Ok(())
    }
}
