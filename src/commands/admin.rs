//! Admin commands (HELLO, PING, MERGE) and raw passthrough

use super::{expect_ok, Command};
use crate::error::{ClientError, Result};
use crate::protocol::{ProtocolVersion, RespValue};
use bytes::Bytes;

/// HELLO command - Negotiate the protocol version
///
/// Syntax: HELLO protover
pub struct Hello {
    pub version: ProtocolVersion,
}

impl Command for Hello {
    /// Server properties, as a map (RESP3) or flat array (RESP2)
    type Output = RespValue;

    fn name(&self) -> &'static str {
        "HELLO"
    }

    fn args(&self) -> Vec<Bytes> {
        vec![Bytes::from(self.version.number().to_string())]
    }

    fn parse_reply(&self, reply: RespValue) -> Result<RespValue> {
        match reply {
            RespValue::Map(_) | RespValue::Array(_) => Ok(reply),
            other => Err(ClientError::unexpected("HELLO", &other)),
        }
    }
}

/// PING command - Check the connection
pub struct Ping;

impl Command for Ping {
    type Output = ();

    fn name(&self) -> &'static str {
        "PING"
    }

    fn args(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<()> {
        if reply.is_text("PONG") {
            Ok(())
        } else {
            Err(ClientError::unexpected("PING", &reply))
        }
    }
}

/// MERGE command - Compact the server's append logs
pub struct Merge;

impl Command for Merge {
    type Output = ();

    fn name(&self) -> &'static str {
        "MERGE"
    }

    fn args(&self) -> Vec<Bytes> {
        Vec::new()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<()> {
        expect_ok("MERGE", reply)
    }
}

/// Arbitrary command sent verbatim, reply returned undecoded
///
/// Used for commands the client has no type for, including deliberately unknown ones.
pub struct Raw {
    pub parts: Vec<Bytes>,
}

impl Raw {
    pub fn new<I, B>(parts: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Raw {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }
}

impl Command for Raw {
    type Output = RespValue;

    fn name(&self) -> &'static str {
        "RAW"
    }

    fn args(&self) -> Vec<Bytes> {
        self.parts.iter().skip(1).cloned().collect()
    }

    fn to_frame(&self) -> RespValue {
        RespValue::command(self.parts.iter().cloned())
    }

    fn parse_reply(&self, reply: RespValue) -> Result<RespValue> {
        Ok(reply)
    }
}
