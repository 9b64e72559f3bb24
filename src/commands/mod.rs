//! Client command module
//!
//! Provides a unified interface for all commands through the Command trait.
//! A command knows its name, its arguments and how to decode the server reply.
//! Each command family is implemented in a separate file for high cohesion.

mod string;
mod key;
mod transaction;
mod pubsub;
mod admin;

pub use string::{Condition, Expiration, Get, Set, SetOptions, SetReply};
pub use key::{Del, Exists};
pub use transaction::{Discard, Exec, ExecOutcome, Multi, QueueReply, Queued, Watch};
pub use pubsub::{Message, Publish, Subscribe, SubscribeConfirmation, Unsubscribe};
pub use admin::{Hello, Merge, Ping, Raw};

use crate::error::{ClientError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;

/// Client command trait
///
/// Implementors describe one request and decode its reply into a typed output.
pub trait Command {
    /// Decoded reply
    type Output;

    /// Get the command name (sent on the wire and used for logging)
    fn name(&self) -> &'static str;

    /// Command arguments (excluding the command name itself)
    fn args(&self) -> Vec<Bytes>;

    /// Build the request frame
    fn to_frame(&self) -> RespValue {
        let args = self.args();
        let mut parts = Vec::with_capacity(1 + args.len());
        parts.push(Bytes::from_static(self.name().as_bytes()));
        parts.extend(args);
        RespValue::command(parts)
    }

    /// Decode the server reply
    fn parse_reply(&self, reply: RespValue) -> Result<Self::Output>;

    /// Whether an error reply is meaningful to `parse_reply`
    ///
    /// When false, the client turns error replies into `ClientError::Server`.
    fn decodes_errors(&self) -> bool {
        false
    }
}

/// Helper function to check for a `+OK` reply
pub(crate) fn expect_ok(command: &'static str, reply: RespValue) -> Result<()> {
    if reply.is_text("OK") {
        Ok(())
    } else {
        Err(ClientError::unexpected(command, &reply))
    }
}

/// Helper function to extract an integer (or RESP3 boolean) reply
pub(crate) fn expect_integer(command: &'static str, reply: RespValue) -> Result<i64> {
    reply
        .as_integer()
        .ok_or_else(|| ClientError::unexpected(command, &reply))
}

/// Helper function to extract an optional bulk string reply
pub(crate) fn expect_optional_bulk(command: &'static str, reply: RespValue) -> Result<Option<Bytes>> {
    match reply {
        RespValue::Null => Ok(None),
        RespValue::BulkString(bytes) => Ok(Some(bytes)),
        other => Err(ClientError::unexpected(command, &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counted {
        calls: Cell<usize>,
    }

    impl Command for Counted {
        type Output = ();

        fn name(&self) -> &'static str {
            "ECHO"
        }

        fn args(&self) -> Vec<Bytes> {
            self.calls.set(self.calls.get() + 1);
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
        }

        fn parse_reply(&self, _reply: RespValue) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_to_frame_builds_args_once() {
        let cmd = Counted { calls: Cell::new(0) };
        assert_eq!(cmd.to_frame(), RespValue::command(["ECHO", "a", "b"]));
        assert_eq!(cmd.calls.get(), 1);
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok("MERGE", RespValue::simple_string("OK")).is_ok());
        assert!(matches!(
            expect_ok("MERGE", RespValue::Integer(1)),
            Err(ClientError::UnexpectedReply { command: "MERGE", .. })
        ));
    }

    #[test]
    fn test_expect_integer_accepts_boolean() {
        assert_eq!(expect_integer("EXISTS", RespValue::Boolean(true)).unwrap(), 1);
        assert!(expect_integer("EXISTS", RespValue::Null).is_err());
    }

    #[test]
    fn test_expect_optional_bulk() {
        assert_eq!(expect_optional_bulk("GET", RespValue::Null).unwrap(), None);
        assert_eq!(
            expect_optional_bulk("GET", RespValue::bulk_string("v")).unwrap(),
            Some(Bytes::from("v"))
        );
        assert!(expect_optional_bulk("GET", RespValue::Integer(0)).is_err());
    }
}
