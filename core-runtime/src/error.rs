use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Timer precision must be greater than zero, got {0:?}")]
    InvalidPrecision(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
