//! Client error type
//!
//! Every failure seen while talking to a server surfaces as a `ClientError`.

use crate::protocol::RespError;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by the wire-protocol client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] RespError),

    /// The server answered with an error reply
    #[error("server error: {0}")]
    Server(String),

    /// The reply does not have the shape the command expects
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    #[error("connection closed by peer")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Build an `UnexpectedReply` from the offending frame
    pub fn unexpected(command: &'static str, reply: &crate::protocol::RespValue) -> Self {
        ClientError::UnexpectedReply {
            command,
            reply: format!("{:?}", reply),
        }
    }
}
