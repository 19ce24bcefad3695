//! Error types for askdb.

use thiserror::Error;

/// The main error type for askdb operations.
#[derive(Debug, Error)]
pub enum AskError {
    /// A query generator backend failed (network, auth, HTTP status, payload).
    #[error("{backend} request failed: {message}")]
    Llm {
        backend: &'static str,
        message: String,
    },

    /// The local model server does not have the requested model.
    ///
    /// `pulled` reports whether the follow-up pull was accepted. The question
    /// is not re-sent either way.
    #[error("Model '{model}' is not available locally ({})", pull_hint(.pulled))]
    ModelMissing { model: String, pulled: bool },

    /// No generator is registered under the given label.
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Schema retrieval error.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AskError {
    /// Create a generator failure for the given backend.
    pub fn llm(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Llm {
            backend,
            message: message.into(),
        }
    }

    /// Whether this error came from establishing the database connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<csv::Error> for AskError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

fn pull_hint(pulled: &bool) -> &'static str {
    if *pulled {
        "pull started, ask again once it completes"
    } else {
        "pull failed"
    }
}

/// Result type alias for askdb operations.
pub type AskResult<T> = Result<T, AskError>;
