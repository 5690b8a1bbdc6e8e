use thiserror::Error;

/// Peephole application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid default target {value:?}: {reason}")]
    InvalidDefaultTarget { value: String, reason: String },

    #[error("Invalid listen address {0}")]
    InvalidListenAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_default_target(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidDefaultTarget {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
