//! docnorm error types

use thiserror::Error;

/// docnorm error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("TOML error: {0}")]
    Toml(String),
}

/// docnorm result type
pub type Result<T> = std::result::Result<T, Error>;
