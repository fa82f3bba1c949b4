use std::path::PathBuf;

/// Startup failures: bad environment values or an unusable rule file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read rule table {}: {source}", path.display())]
    RuleFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule table {}: {source}", path.display())]
    RuleFileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A line of the JSON feed that could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Malformed command: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] kennel_core::error::CoreError),
}
