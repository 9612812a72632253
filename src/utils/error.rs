use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One offending element found by the graph validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connection_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyGraph,
    DuplicateId,
    DanglingConnection,
    PortCollision,
    MalformedConfig,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A service whose type tag is not in the template registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedType {
    pub node_id: String,
    pub service_type: String,
}

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("Invalid project graph: {}", join_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    #[error(
        "Unsupported service type(s): {}. Supported types: {}",
        describe_unsupported(.offenders),
        .supported.join(", ")
    )]
    UnsupportedServiceType {
        offenders: Vec<UnsupportedType>,
        supported: Vec<String>,
    },

    #[error("Conflicting wiring variables for service '{node_id}': {}", .keys.join(", "))]
    WiringConflict { node_id: String, keys: Vec<String> },

    #[error("Graph too large: {count} {what} exceeds the limit of {limit}")]
    GraphTooLarge {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("Project '{id}' not found")]
    ProjectNotFound { id: String },

    #[error("Generation exceeded its deadline of {}ms during {stage}", .deadline.as_millis())]
    GenerationTimeout { stage: String, deadline: Duration },

    #[error("Archive packaging failed: {message}")]
    Packaging { message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Manifest serialization error: {0}")]
    ManifestError(#[from] serde_yaml::Error),

    #[error("Project store request failed: {0}")]
    StoreError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Deterministic function of the caller's graph; safe to echo back.
    Input,
    Configuration,
    Upstream,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScaffoldError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        ScaffoldError::Validation { issues }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ScaffoldError::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScaffoldError::Validation { .. }
            | ScaffoldError::UnsupportedServiceType { .. }
            | ScaffoldError::WiringConflict { .. }
            | ScaffoldError::GraphTooLarge { .. }
            | ScaffoldError::ProjectNotFound { .. } => ErrorCategory::Input,
            ScaffoldError::ConfigError { .. }
            | ScaffoldError::ConfigValidationError { .. }
            | ScaffoldError::InvalidConfigValueError { .. }
            | ScaffoldError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ScaffoldError::StoreError(_) => ErrorCategory::Upstream,
            ScaffoldError::GenerationTimeout { .. } => ErrorCategory::Timeout,
            ScaffoldError::Packaging { .. }
            | ScaffoldError::ZipError(_)
            | ScaffoldError::IoError(_)
            | ScaffoldError::SerializationError(_)
            | ScaffoldError::ManifestError(_)
            | ScaffoldError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Upstream | ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// HTTP status code for the generate endpoint.
    pub fn status_code(&self) -> u16 {
        match self {
            ScaffoldError::Validation { .. } => 400,
            ScaffoldError::ProjectNotFound { .. } => 404,
            ScaffoldError::WiringConflict { .. } => 409,
            ScaffoldError::GraphTooLarge { .. } => 413,
            ScaffoldError::UnsupportedServiceType { .. } => 422,
            ScaffoldError::StoreError(_) => 502,
            ScaffoldError::GenerationTimeout { .. } => 504,
            _ => 500,
        }
    }

    /// Whether the message may be returned verbatim to the caller.
    pub fn is_client_safe(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Input | ErrorCategory::Timeout
        )
    }

    pub fn user_friendly_message(&self) -> String {
        if self.is_client_safe() {
            self.to_string()
        } else if self.category() == ErrorCategory::Configuration {
            format!("Configuration problem: {}", self)
        } else {
            "Internal server error".to_string()
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScaffoldError::Validation { .. } => {
                "Fix the listed services or connections in the editor and try again"
            }
            ScaffoldError::UnsupportedServiceType { .. } => {
                "Replace the service with one of the supported types"
            }
            ScaffoldError::WiringConflict { .. } => {
                "Give the connected services distinct labels or ids"
            }
            ScaffoldError::GraphTooLarge { .. } => {
                "Split the architecture into smaller projects or raise the configured limit"
            }
            ScaffoldError::ProjectNotFound { .. } => "Check the project id or save the project first",
            ScaffoldError::GenerationTimeout { .. } => {
                "Retry later or increase generation.deadline_ms"
            }
            ScaffoldError::ConfigError { .. }
            | ScaffoldError::ConfigValidationError { .. }
            | ScaffoldError::InvalidConfigValueError { .. }
            | ScaffoldError::MissingConfigError { .. } => "Check the configuration file and flags",
            ScaffoldError::StoreError(_) => "Check that the project store is reachable",
            _ => "Check the server logs for details",
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_unsupported(offenders: &[UnsupportedType]) -> String {
    offenders
        .iter()
        .map(|o| format!("'{}' (node {})", o.service_type, o.node_id))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ScaffoldError>;
