//! Transaction commands (MULTI, EXEC, DISCARD, WATCH)
//!
//! Inside a MULTI block every command is answered with `+QUEUED` (or an error when the
//! server refuses it); the real replies come back as the EXEC array.

use super::{expect_ok, Command};
use crate::error::{ClientError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;

/// MULTI command - Open a transaction block
pub struct Multi;

impl Command for Multi {
    type Output = ();

    fn name(&self) -> &'static str {
        "MULTI"
    }

    fn args(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<()> {
        expect_ok("MULTI", reply)
    }
}

/// Outcome of EXEC
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// The block was applied; one reply per queued command
    Committed(Vec<RespValue>),
    /// Null reply: a watched key changed or the server rolled the block back
    Aborted,
    /// Error reply, e.g. EXECABORT after a rejected command
    Failed(String),
}

impl ExecOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ExecOutcome::Committed(_))
    }
}

/// EXEC command - Run the queued block
pub struct Exec;

impl Command for Exec {
    type Output = ExecOutcome;

    fn name(&self) -> &'static str {
        "EXEC"
    }

    fn args(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<ExecOutcome> {
        match reply {
            RespValue::Null => Ok(ExecOutcome::Aborted),
            RespValue::Error(message) => Ok(ExecOutcome::Failed(message)),
            RespValue::Array(replies) => Ok(ExecOutcome::Committed(replies)),
            other => Err(ClientError::unexpected("EXEC", &other)),
        }
    }

    fn decodes_errors(&self) -> bool {
        true
    }
}

/// DISCARD command - Drop the queued block
pub struct Discard;

impl Command for Discard {
    type Output = ();

    fn name(&self) -> &'static str {
        "DISCARD"
    }

    fn args(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<()> {
        expect_ok("DISCARD", reply)
    }
}

/// WATCH command - Arm the optimistic check on keys
///
/// Syntax: WATCH key [key ...]
pub struct Watch {
    pub keys: Vec<Bytes>,
}

impl Watch {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Watch { keys: vec![key.into()] }
    }
}

impl Command for Watch {
    type Output = ();

    fn name(&self) -> &'static str {
        "WATCH"
    }

    fn args(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<()> {
        expect_ok("WATCH", reply)
    }
}

/// Reply to a command sent inside a MULTI block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueReply {
    Queued,
    /// The server refused to queue the command
    Rejected(String),
}

/// Wraps any command to send it inside a MULTI block
pub struct Queued<C>(pub C);

impl<C: Command> Command for Queued<C> {
    type Output = QueueReply;

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn args(&self) -> Vec<Bytes> {
        self.0.args()
    }

    fn to_frame(&self) -> RespValue {
        self.0.to_frame()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<QueueReply> {
        match reply {
            RespValue::Error(message) => Ok(QueueReply::Rejected(message)),
            ref queued if queued.is_text("QUEUED") => Ok(QueueReply::Queued),
            other => Err(ClientError::unexpected(self.0.name(), &other)),
        }
    }

    fn decodes_errors(&self) -> bool {
        true
    }
}
