//! Delivery and page-context transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No listener for {0}")]
    NotFound(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel disconnected")]
    Disconnected,

    #[error("No reply within {0} ms")]
    Timeout(u64),

    #[error("Rejected by peer: {0}")]
    Rejected(String),
}
