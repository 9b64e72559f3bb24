//! Pub/sub commands (PUBLISH, SUBSCRIBE, UNSUBSCRIBE)
//!
//! Subscribed connections receive out-of-band frames: RESP3 pushes, or plain arrays
//! under RESP2. Both shapes decode to the same types.

use super::{expect_integer, Command};
use crate::error::{ClientError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;

/// PUBLISH command - Post a message to a channel
///
/// Syntax: PUBLISH channel message
pub struct Publish {
    pub channel: Bytes,
    pub message: Bytes,
}

impl Publish {
    pub fn new(channel: impl Into<Bytes>, message: impl Into<Bytes>) -> Self {
        Publish {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

impl Command for Publish {
    /// Number of subscribers that received the message
    type Output = i64;

    fn name(&self) -> &'static str {
        "PUBLISH"
    }

    fn args(&self) -> Vec<Bytes> {
        vec![self.channel.clone(), self.message.clone()]
    }

    fn parse_reply(&self, reply: RespValue) -> Result<i64> {
        expect_integer("PUBLISH", reply)
    }
}

/// Confirmation frame sent once per subscribed or unsubscribed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeConfirmation {
    pub channel: Bytes,
    /// Channels this connection is now subscribed to
    pub count: i64,
}

impl SubscribeConfirmation {
    /// Decode `subscribe <channel> <count>`; None for any other frame
    pub fn from_frame(frame: &RespValue) -> Option<Self> {
        Self::decode("subscribe", frame)
    }

    /// Decode `unsubscribe <channel> <count>`; None for any other frame
    pub fn from_unsubscribe_frame(frame: &RespValue) -> Option<Self> {
        Self::decode("unsubscribe", frame)
    }

    fn decode(kind: &str, frame: &RespValue) -> Option<Self> {
        match frame.as_array()?.as_slice() {
            [k, channel, count] if k.is_text(kind) => Some(SubscribeConfirmation {
                channel: Bytes::copy_from_slice(channel.as_text()?),
                count: count.as_integer()?,
            }),
            _ => None,
        }
    }
}

/// SUBSCRIBE command - Listen on one or more channels
///
/// Syntax: SUBSCRIBE channel [channel ...]
pub struct Subscribe {
    pub channels: Vec<Bytes>,
}

impl Subscribe {
    pub fn new(channel: impl Into<Bytes>) -> Self {
        Subscribe {
            channels: vec![channel.into()],
        }
    }
}

impl Command for Subscribe {
    type Output = SubscribeConfirmation;

    fn name(&self) -> &'static str {
        "SUBSCRIBE"
    }

    fn args(&self) -> Vec<Bytes> {
        self.channels.clone()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<SubscribeConfirmation> {
        SubscribeConfirmation::from_frame(&reply)
            .ok_or_else(|| ClientError::unexpected("SUBSCRIBE", &reply))
    }
}

/// UNSUBSCRIBE command - Stop listening on one or more channels
///
/// Syntax: UNSUBSCRIBE channel [channel ...]
pub struct Unsubscribe {
    pub channels: Vec<Bytes>,
}

impl Unsubscribe {
    pub fn new(channel: impl Into<Bytes>) -> Self {
        Unsubscribe {
            channels: vec![channel.into()],
        }
    }
}

impl Command for Unsubscribe {
    type Output = SubscribeConfirmation;

    fn name(&self) -> &'static str {
        "UNSUBSCRIBE"
    }

    fn args(&self) -> Vec<Bytes> {
        self.channels.clone()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<SubscribeConfirmation> {
        SubscribeConfirmation::from_unsubscribe_frame(&reply)
            .ok_or_else(|| ClientError::unexpected("UNSUBSCRIBE", &reply))
    }
}

/// A message delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: Bytes,
    pub payload: Bytes,
}

impl Message {
    /// Decode a `message` or `pmessage` frame; None for any other frame
    pub fn from_frame(frame: &RespValue) -> Option<Self> {
        match frame.as_array()?.as_slice() {
            [kind, channel, payload] if kind.is_text("message") => Some(Message {
                channel: Bytes::copy_from_slice(channel.as_text()?),
                payload: Bytes::copy_from_slice(payload.as_text()?),
            }),
            [kind, _pattern, channel, payload] if kind.is_text("pmessage") => Some(Message {
                channel: Bytes::copy_from_slice(channel.as_text()?),
                payload: Bytes::copy_from_slice(payload.as_text()?),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish() {
        let cmd = Publish::new("test_channel", "hello");
        assert_eq!(
            cmd.to_frame(),
            RespValue::command(["PUBLISH", "test_channel", "hello"])
        );
        assert_eq!(cmd.parse_reply(RespValue::Integer(2)).unwrap(), 2);
    }

    #[test]
    fn test_message_from_push_and_array() {
        let parts = vec![
            RespValue::bulk_string("message"),
            RespValue::bulk_string("ch"),
            RespValue::bulk_string("hi"),
        ];
        let expected = Message {
            channel: Bytes::from("ch"),
            payload: Bytes::from("hi"),
        };
        assert_eq!(Message::from_frame(&RespValue::Push(parts.clone())), Some(expected.clone()));
        assert_eq!(Message::from_frame(&RespValue::Array(parts)), Some(expected));
    }

    #[test]
    fn test_pmessage() {
        let frame = RespValue::Push(vec![
            RespValue::bulk_string("pmessage"),
            RespValue::bulk_string("c*"),
            RespValue::bulk_string("ch"),
            RespValue::bulk_string("hi"),
        ]);
        assert_eq!(Message::from_frame(&frame).unwrap().channel, Bytes::from("ch"));
    }

    #[test]
    fn test_confirmation_is_not_a_message() {
        let frame = RespValue::Push(vec![
            RespValue::bulk_string("subscribe"),
            RespValue::bulk_string("ch"),
            RespValue::Integer(1),
        ]);
        assert_eq!(Message::from_frame(&frame), None);
        assert_eq!(
            Subscribe::new("ch").parse_reply(frame).unwrap(),
            SubscribeConfirmation {
                channel: Bytes::from("ch"),
                count: 1
            }
        );
    }

    #[test]
    fn test_unsubscribe_confirmation() {
        let cmd = Unsubscribe::new("ch");
        assert_eq!(cmd.to_frame(), RespValue::command(["UNSUBSCRIBE", "ch"]));

        let frame = RespValue::Array(vec![
            RespValue::bulk_string("unsubscribe"),
            RespValue::bulk_string("ch"),
            RespValue::Integer(0),
        ]);
        assert_eq!(SubscribeConfirmation::from_frame(&frame), None);
        assert_eq!(
            cmd.parse_reply(frame).unwrap(),
            SubscribeConfirmation {
                channel: Bytes::from("ch"),
                count: 0
            }
        );
        assert!(cmd.parse_reply(RespValue::simple_string("OK")).is_err());
    }
}
