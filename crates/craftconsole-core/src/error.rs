use crate::protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("link error: {0}")]
    Link(String),
    #[error("not connected to {0}")]
    NotConnected(String),
    #[error("invalid data: {0}")]
    Invalid(String),
}
