//! String commands (SET, GET)

use super::{expect_optional_bulk, Command};
use crate::error::{ClientError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;

/// Expiration attached to a SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// EX seconds
    Ex(u64),
    /// PX milliseconds
    Px(u64),
    /// KEEPTTL
    KeepTtl,
}

/// Write condition of a SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Only set when the key is absent
    Nx,
    /// Only set when the key exists
    Xx,
}

/// Optional SET arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiration: Option<Expiration>,
    pub condition: Option<Condition>,
    /// Return the previous value (SET ... GET)
    pub get: bool,
}

impl SetOptions {
    pub fn ex(mut self, seconds: u64) -> Self {
        self.expiration = Some(Expiration::Ex(seconds));
        self
    }

    pub fn px(mut self, millis: u64) -> Self {
        self.expiration = Some(Expiration::Px(millis));
        self
    }

    pub fn keep_ttl(mut self) -> Self {
        self.expiration = Some(Expiration::KeepTtl);
        self
    }

    pub fn nx(mut self) -> Self {
        self.condition = Some(Condition::Nx);
        self
    }

    pub fn xx(mut self) -> Self {
        self.condition = Some(Condition::Xx);
        self
    }

    pub fn get(mut self) -> Self {
        self.get = true;
        self
    }

    fn to_args(self) -> Vec<Bytes> {
        let mut args = Vec::new();
        match self.expiration {
            Some(Expiration::Ex(seconds)) => {
                args.push(Bytes::from_static(b"EX"));
                args.push(Bytes::from(seconds.to_string()));
            }
            Some(Expiration::Px(millis)) => {
                args.push(Bytes::from_static(b"PX"));
                args.push(Bytes::from(millis.to_string()));
            }
            Some(Expiration::KeepTtl) => args.push(Bytes::from_static(b"KEEPTTL")),
            None => {}
        }
        match self.condition {
            Some(Condition::Nx) => args.push(Bytes::from_static(b"NX")),
            Some(Condition::Xx) => args.push(Bytes::from_static(b"XX")),
            None => {}
        }
        if self.get {
            args.push(Bytes::from_static(b"GET"));
        }
        args
    }
}

/// Decoded SET reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetReply {
    /// `+OK`
    Stored,
    /// Null reply: the NX/XX condition did not hold
    NotStored,
    /// Reply to SET ... GET: the value held before the write
    Previous(Option<Bytes>),
}

impl SetReply {
    /// Whether the write was applied (always assumed for SET ... GET)
    pub fn is_stored(&self) -> bool {
        !matches!(self, SetReply::NotStored)
    }
}

/// SET command - Set a key to a value
///
/// Syntax: SET key value [EX seconds | PX milliseconds | KEEPTTL] [NX | XX] [GET]
#[derive(Debug, Clone)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub options: SetOptions,
}

impl Set {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Set {
            key: key.into(),
            value: value.into(),
            options: SetOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SetOptions) -> Self {
        self.options = options;
        self
    }
}

impl Command for Set {
    type Output = SetReply;

    fn name(&self) -> &'static str {
        "SET"
    }

    fn args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone(), self.value.clone()];
        args.extend(self.options.to_args());
        args
    }

    fn parse_reply(&self, reply: RespValue) -> Result<SetReply> {
        if self.options.get {
            return expect_optional_bulk("SET", reply).map(SetReply::Previous);
        }
        match reply {
            RespValue::Null => Ok(SetReply::NotStored),
            ref ok if ok.is_text("OK") => Ok(SetReply::Stored),
            other => Err(ClientError::unexpected("SET", &other)),
        }
    }
}

/// GET command - Get the value of a key
///
/// Syntax: GET key
#[derive(Debug, Clone)]
pub struct Get {
    pub key: Bytes,
}

impl Get {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Get { key: key.into() }
    }
}

impl Command for Get {
    type Output = Option<Bytes>;

    fn name(&self) -> &'static str {
        "GET"
    }

    fn args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn parse_reply(&self, reply: RespValue) -> Result<Option<Bytes>> {
        expect_optional_bulk("GET", reply)
    }
}
