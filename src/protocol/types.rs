//! RESP value types
//!
//! Defines the frames exchanged with the server under test, RESP2 and RESP3 alike

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol version negotiated with a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// RESP2, the default for every Redis-compatible server
    #[default]
    Resp2,
    /// RESP3, negotiated with `HELLO 3`
    Resp3,
}

impl ProtocolVersion {
    /// Numeric version as sent in `HELLO`
    pub fn number(self) -> u8 {
        match self {
            ProtocolVersion::Resp2 => 2,
            ProtocolVersion::Resp3 => 3,
        }
    }
}

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple strings: +OK\r\n
    SimpleString(String),

    /// Errors: -Error message\r\n (and RESP3 bulk errors)
    Error(String),

    /// Integers: :1000\r\n
    Integer(i64),

    /// Bulk strings: $6\r\nfoobar\r\n
    BulkString(Bytes),

    /// Null bulk string, null array, or RESP3 null: $-1\r\n, *-1\r\n, _\r\n
    Null,

    /// Arrays: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),

    /// RESP3 booleans: #t\r\n
    Boolean(bool),

    /// RESP3 doubles: ,3.14\r\n
    Double(f64),

    /// RESP3 maps: %1\r\n+key\r\n+value\r\n
    Map(Vec<(RespValue, RespValue)>),

    /// RESP3 sets: ~2\r\n...
    Set(Vec<RespValue>),

    /// RESP3 out-of-band pushes: >3\r\n...
    Push(Vec<RespValue>),
}

impl RespValue {
    /// Create a simple string
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create an integer
    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    /// Create a bulk string from bytes
    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Build a command frame: an array of bulk strings
    pub fn command<I, B>(parts: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(part.into()))
                .collect(),
        )
    }

    /// Check if this is a null of any flavour
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    /// Try to extract the elements of an array, set or push
    pub fn as_array(&self) -> Option<&Vec<RespValue>> {
        match self {
            RespValue::Array(arr) | RespValue::Set(arr) | RespValue::Push(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consume into the elements of an array, set or push
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) | RespValue::Set(arr) | RespValue::Push(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to extract bulk string bytes
    pub fn as_bulk_string(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Raw bytes of a simple or bulk string
    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    /// Whether this is a simple or bulk string equal to `expected`, ignoring ASCII case
    pub fn is_text(&self, expected: &str) -> bool {
        self.as_text()
            .map(|text| text.eq_ignore_ascii_case(expected.as_bytes()))
            .unwrap_or(false)
    }

    /// Try to extract integer value
    ///
    /// RESP3 servers may answer predicates with booleans, which map to 0/1.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            RespValue::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "SimpleString({})", s),
            RespValue::Error(e) => write!(f, "Error({})", e),
            RespValue::Integer(i) => write!(f, "Integer({})", i),
            RespValue::BulkString(b) => write!(f, "BulkString({} bytes)", b.len()),
            RespValue::Null => write!(f, "Null"),
            RespValue::Array(arr) => write!(f, "Array({} elements)", arr.len()),
            RespValue::Boolean(b) => write!(f, "Boolean({})", b),
            RespValue::Double(d) => write!(f, "Double({})", d),
            RespValue::Map(entries) => write!(f, "Map({} entries)", entries.len()),
            RespValue::Set(items) => write!(f, "Set({} elements)", items.len()),
            RespValue::Push(items) => write!(f, "Push({} elements)", items.len()),
        }
    }
}

/// RESP parsing and encoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum RespError {
    /// Invalid protocol format
    InvalidProtocol(String),

    /// Invalid UTF-8 in string
    InvalidUtf8,

    /// Integer overflow
    IntegerOverflow,
}

impl fmt::Display for RespError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespError::InvalidProtocol(msg) => write!(f, "Invalid protocol: {}", msg),
            RespError::InvalidUtf8 => write!(f, "Invalid UTF-8"),
            RespError::IntegerOverflow => write!(f, "Integer overflow"),
        }
    }
}

impl std::error::Error for RespError {}
