use thiserror::Error;

/// Errors raised by host bridge implementations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The requested player or capability does not exist on this host.
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    /// The host accepted a call but could not complete it, e.g. a log sink
    /// that lost its connection.
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Notification stream unavailable: {0}")]
    SubscriptionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
