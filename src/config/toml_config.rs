use crate::core::engine::{
    EngineSettings, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_SERVICES, DEFAULT_SPOOL_THRESHOLD,
};
use crate::utils::error::{Result, ScaffoldError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server and engine settings. Every section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldConfig {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// `"*"` allows any origin.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// 0 disables the deadline.
    pub deadline_ms: u64,
    pub max_services: usize,
    pub max_connections: usize,
    pub spool_threshold_bytes: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            max_services: DEFAULT_MAX_SERVICES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            spool_threshold_bytes: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    None,
    Local,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory of `<id>.json` files for the local store.
    pub path: Option<String>,
    /// Base URL of the project API for the HTTP store.
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::None,
            path: None,
            base_url: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ScaffoldConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScaffoldError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScaffoldError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScaffoldError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("server.bind", &self.server.bind)?;
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_non_empty_string("server.cors_origin", &self.server.cors_origin)?;
        if self.server.cors_origin != "*" {
            validate_url("server.cors_origin", &self.server.cors_origin)?;
        }

        validate_positive_number("generation.max_services", self.generation.max_services, 1)?;
        validate_positive_number(
            "generation.max_connections",
            self.generation.max_connections,
            1,
        )?;

        match self.store.kind {
            StoreKind::None => {}
            StoreKind::Local => {
                let path = validate_required_field("store.path", &self.store.path)?;
                validate_path("store.path", path)?;
            }
            StoreKind::Http => {
                let base_url = validate_required_field("store.base_url", &self.store.base_url)?;
                validate_url("store.base_url", base_url)?;
                validate_range("store.timeout_seconds", self.store.timeout_seconds, 1, 300)?;
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ScaffoldError::InvalidConfigValueError {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_services: self.generation.max_services,
            max_connections: self.generation.max_connections,
            deadline: match self.generation.deadline_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            spool_threshold: self.generation.spool_threshold_bytes,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

impl Validate for ScaffoldConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
