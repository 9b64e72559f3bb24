//! RESP protocol implementation
//!
//! This module handles parsing and encoding of the Redis Serialization Protocol,
//! versions 2 and 3. It is completely independent from other modules (loose coupling).

mod types;
mod resp;

pub use types::{ProtocolVersion, RespValue, RespError};
pub use resp::{RespParser, RespEncoder};
