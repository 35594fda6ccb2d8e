use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required connection variable is not set anywhere.
    #[error("missing required configuration variable: {0}")]
    MissingVar(String),

    /// A variable is present but cannot be parsed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
