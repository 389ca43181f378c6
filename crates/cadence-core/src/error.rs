//! Core error types.

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read config file `{path}`: {reason}")]
    Io { path: String, reason: String },

    /// A configuration file could not be parsed as TOML.
    #[error("failed to parse config file `{path}`: {reason}")]
    Parse { path: String, reason: String },

    /// A configuration value fails validation.
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

/// Errors surfaced by the persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The referenced record does not exist.
    #[error("record not found: {entity} `{id}`")]
    NotFound { entity: String, id: String },

    /// The backing store rejected the operation.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl RepoError {
    /// Whether this error is the "record does not exist" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the core crate.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
