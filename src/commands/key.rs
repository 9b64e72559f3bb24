//! Key commands (DEL, EXISTS)

use super::{expect_integer, Command};
use crate::error::Result;
use crate::protocol::RespValue;
use bytes::Bytes;

/// DEL command - Delete one or more keys
///
/// Syntax: DEL key [key ...]
#[derive(Debug, Clone)]
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl Del {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Del { keys: vec![key.into()] }
    }
}

impl Command for Del {
    /// Number of keys removed
    type Output = i64;

    fn name(&self) -> &'static str {
        "DEL"
    }

    fn args(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<i64> {
        expect_integer("DEL", reply)
    }
}

/// EXISTS command - Check if one or more keys exist
///
/// Syntax: EXISTS key [key ...]
#[derive(Debug, Clone)]
pub struct Exists {
    pub keys: Vec<Bytes>,
}

impl Exists {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Exists { keys: vec![key.into()] }
    }
}

impl Command for Exists {
    /// Number of listed keys that exist
    type Output = i64;

    fn name(&self) -> &'static str {
        "EXISTS"
    }

    fn args(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn parse_reply(&self, reply: RespValue) -> Result<i64> {
        expect_integer("EXISTS", reply)
    }
}
