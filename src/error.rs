use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building an engine or handing it unusable input.
///
/// Everything except `InvalidInput` is a construction-time failure: a bad
/// catalog is never partially loaded.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rule `{name}` has an invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
