use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Catalog errors
    #[error("Unknown target family: {0}")]
    UnknownFamily(String),

    #[error("Invalid technology code: {0}")]
    InvalidTechnology(String),

    #[error("Invalid FeliCa polling payload: {0}")]
    InvalidPollPayload(String),

    // Scan state errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
