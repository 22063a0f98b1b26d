//! Error types for fitting, transforming, persisting and serving.
//!
//! Fit-time (`Schema`, `Fit`) and load-time (`ArtifactLoad`) errors are fatal
//! for the operation that raised them. Per-request errors (`Transform`,
//! `Validation`, `ModelUnavailable`) are recoverable and map onto an HTTP
//! status through [`ChurnError::status_code`].

use serde::Serialize;
use std::fmt;

/// Structured failure of a record-to-feature-vector transform.
///
/// Lists every offending column, not just the first one found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformError {
    /// Feature columns the pipeline was fitted on but the record lacks.
    pub missing_columns: Vec<String>,
    /// Numeric columns whose value could not be parsed as a number.
    pub invalid_columns: Vec<String>,
}

impl TransformError {
    pub fn is_empty(&self) -> bool {
        self.missing_columns.is_empty() && self.invalid_columns.is_empty()
    }

    /// All column names mentioned by this error, missing first.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.missing_columns
            .iter()
            .chain(self.invalid_columns.iter())
            .map(String::as_str)
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_columns.is_empty() {
            parts.push(format!(
                "missing feature columns: {}",
                self.missing_columns.join(", ")
            ));
        }
        if !self.invalid_columns.is_empty() {
            parts.push(format!(
                "non-numeric values in numeric columns: {}",
                self.invalid_columns.join(", ")
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Error type for every operation in this crate.
#[derive(Debug)]
pub enum ChurnError {
    /// The dataset yields no usable feature columns, or lacks the target.
    Schema(String),
    /// A column is degenerate and no statistic can be fitted on it.
    Fit { column: String, reason: String },
    /// A record cannot be turned into a feature vector.
    Transform(TransformError),
    /// The artifact is missing, corrupt or internally inconsistent.
    ArtifactLoad(String),
    /// No model was loaded at startup; the service runs degraded.
    ModelUnavailable,
    /// A request field failed type coercion.
    Validation { field: String, reason: String },
    /// Invalid hyperparameter or builder value.
    InvalidParameter(String),
    /// Configuration could not be read or parsed.
    Config(String),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Malformed CSV input.
    Csv(String),
    /// I/O error during file operations.
    Io(String),
}

impl ChurnError {
    /// HTTP status an API layer should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ChurnError::ModelUnavailable => 503,
            ChurnError::Transform(_) | ChurnError::Validation { .. } => 400,
            _ => 500,
        }
    }

    /// Whether the caller can recover by fixing its request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            status: self.status_code(),
        }
    }
}

impl fmt::Display for ChurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChurnError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ChurnError::Fit { column, reason } => {
                write!(f, "Fit error in column '{}': {}", column, reason)
            }
            ChurnError::Transform(err) => write!(f, "Transform error: {}", err),
            ChurnError::ArtifactLoad(msg) => write!(f, "Artifact load error: {}", msg),
            ChurnError::ModelUnavailable => write!(
                f,
                "Model is not available, please check server logs"
            ),
            ChurnError::Validation { field, reason } => {
                write!(f, "Validation error in field '{}': {}", field, reason)
            }
            ChurnError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ChurnError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChurnError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ChurnError::Csv(msg) => write!(f, "CSV error: {}", msg),
            ChurnError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ChurnError {}

impl From<TransformError> for ChurnError {
    fn from(err: TransformError) -> Self {
        ChurnError::Transform(err)
    }
}

impl From<std::io::Error> for ChurnError {
    fn from(err: std::io::Error) -> Self {
        ChurnError::Io(err.to_string())
    }
}

impl From<bincode::Error> for ChurnError {
    fn from(err: bincode::Error) -> Self {
        ChurnError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for ChurnError {
    fn from(err: csv::Error) -> Self {
        ChurnError::Csv(err.to_string())
    }
}

/// JSON body returned to API callers on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

pub type Result<T> = std::result::Result<T, ChurnError>;
