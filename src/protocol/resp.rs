//! RESP parser and encoder
//!
//! Implements parsing from bytes to RespValue and encoding from RespValue to bytes.
//! The parser understands RESP2 and RESP3 replies; the encoder renders a value for
//! the protocol version the peer negotiated.

use super::types::{ProtocolVersion, RespError, RespValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Upper bound on pre-allocated aggregate capacity, whatever the announced count
const MAX_PREALLOC: usize = 1024;

/// RESP Parser
pub struct RespParser;

impl RespParser {
    /// Parse a RESP value from a buffer
    ///
    /// Returns Ok(Some(value)) if a complete value was parsed and consumed,
    /// Ok(None) if more data is needed (nothing is consumed),
    /// Err(e) if parsing failed
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::parse_frame(&buf[..], 0)? {
            Some((value, end)) => {
                buf.advance(end);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse one frame starting at `pos`, returning the value and the offset just past it
    fn parse_frame(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, RespError> {
        if pos >= buf.len() {
            return Ok(None);
        }

        let (line, next) = match Self::read_line(buf, pos + 1) {
            Some(found) => found,
            None => return Ok(None),
        };

        match buf[pos] {
            b'+' => Ok(Some((RespValue::SimpleString(Self::utf8(line)?), next))),
            b'-' => Ok(Some((RespValue::Error(Self::utf8(line)?), next))),
            b':' => Ok(Some((RespValue::Integer(Self::integer(line)?), next))),
            b'_' => {
                if !line.is_empty() {
                    return Err(RespError::InvalidProtocol("Null carries no payload".to_string()));
                }
                Ok(Some((RespValue::Null, next)))
            }
            b'#' => match line {
                b"t" => Ok(Some((RespValue::Boolean(true), next))),
                b"f" => Ok(Some((RespValue::Boolean(false), next))),
                _ => Err(RespError::InvalidProtocol(format!(
                    "Invalid boolean: {}",
                    String::from_utf8_lossy(line)
                ))),
            },
            b',' => {
                let text = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?;
                let d = text
                    .parse::<f64>()
                    .map_err(|_| RespError::InvalidProtocol(format!("Invalid double: {}", text)))?;
                Ok(Some((RespValue::Double(d), next)))
            }
            b'$' | b'!' | b'=' => Self::parse_blob(buf, buf[pos], line, next),
            b'*' | b'~' | b'>' => Self::parse_aggregate(buf, buf[pos], line, next),
            b'%' => Self::parse_map(buf, line, next),
            other => Err(RespError::InvalidProtocol(format!(
                "Unknown type prefix: {}",
                other as char
            ))),
        }
    }

    /// Parse length-prefixed payloads: bulk strings, bulk errors, verbatim strings
    fn parse_blob(
        buf: &[u8],
        prefix: u8,
        line: &[u8],
        start: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let len = Self::integer(line)?;

        if len == -1 && prefix == b'$' {
            return Ok(Some((RespValue::Null, start)));
        }

        if len < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid bulk string length: {}",
                len
            )));
        }

        let len = len as usize;
        let end = start + len;
        if buf.len() < end + 2 {
            return Ok(None);
        }

        if &buf[end..end + 2] != CRLF {
            return Err(RespError::InvalidProtocol(
                "Missing CRLF after bulk string data".to_string(),
            ));
        }

        let data = &buf[start..end];
        let value = match prefix {
            b'!' => RespValue::Error(Self::utf8(data)?),
            // Verbatim strings carry a three-letter format and a colon, e.g. "txt:"
            b'=' if data.len() >= 4 && data[3] == b':' => {
                RespValue::BulkString(Bytes::copy_from_slice(&data[4..]))
            }
            _ => RespValue::BulkString(Bytes::copy_from_slice(data)),
        };

        Ok(Some((value, end + 2)))
    }

    /// Parse arrays, sets and pushes
    fn parse_aggregate(
        buf: &[u8],
        prefix: u8,
        line: &[u8],
        start: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let count = Self::integer(line)?;

        if count == -1 && prefix == b'*' {
            return Ok(Some((RespValue::Null, start)));
        }

        if count < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid array count: {}",
                count
            )));
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count.min(MAX_PREALLOC));
        let mut pos = start;
        for _ in 0..count {
            match Self::parse_frame(buf, pos)? {
                Some((value, next)) => {
                    elements.push(value);
                    pos = next;
                }
                None => return Ok(None),
            }
        }

        let value = match prefix {
            b'~' => RespValue::Set(elements),
            b'>' => RespValue::Push(elements),
            _ => RespValue::Array(elements),
        };
        Ok(Some((value, pos)))
    }

    /// Parse a RESP3 map: a count of key/value pairs
    fn parse_map(
        buf: &[u8],
        line: &[u8],
        start: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let count = Self::integer(line)?;
        if count < 0 {
            return Err(RespError::InvalidProtocol(format!("Invalid map count: {}", count)));
        }

        let count = count as usize;
        let mut entries = Vec::with_capacity(count.min(MAX_PREALLOC));
        let mut pos = start;
        for _ in 0..count {
            let (key, after_key) = match Self::parse_frame(buf, pos)? {
                Some(found) => found,
                None => return Ok(None),
            };
            let (value, after_value) = match Self::parse_frame(buf, after_key)? {
                Some(found) => found,
                None => return Ok(None),
            };
            entries.push((key, value));
            pos = after_value;
        }

        Ok(Some((RespValue::Map(entries), pos)))
    }

    /// Find the line starting at `start`; returns it without CRLF and the offset after CRLF
    fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
        buf[start..]
            .windows(2)
            .position(|window| window == CRLF)
            .map(|i| (&buf[start..start + i], start + i + 2))
    }

    fn utf8(bytes: &[u8]) -> Result<String, RespError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| RespError::InvalidUtf8)
    }

    fn integer(bytes: &[u8]) -> Result<i64, RespError> {
        let s = std::str::from_utf8(bytes).map_err(|_| RespError::InvalidUtf8)?;
        s.parse::<i64>().map_err(|_| RespError::IntegerOverflow)
    }
}

/// RESP Encoder
///
/// RESP3-only types are downgraded when encoding for a RESP2 peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RespEncoder {
    version: ProtocolVersion,
}

impl RespEncoder {
    /// Create an encoder for the given protocol version
    pub fn new(version: ProtocolVersion) -> Self {
        RespEncoder { version }
    }

    /// Encode a RESP value to bytes
    pub fn encode(&self, value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Encode a RESP value into an existing buffer
    pub fn encode_to(&self, buf: &mut BytesMut, value: &RespValue) {
        let resp3 = self.version == ProtocolVersion::Resp3;
        match value {
            RespValue::SimpleString(s) => Self::put_line(buf, b'+', s.as_bytes()),
            RespValue::Error(e) => Self::put_line(buf, b'-', e.as_bytes()),
            RespValue::Integer(i) => Self::put_line(buf, b':', i.to_string().as_bytes()),
            RespValue::BulkString(bytes) => Self::put_bulk(buf, bytes),
            RespValue::Null if resp3 => buf.put_slice(b"_\r\n"),
            RespValue::Null => buf.put_slice(b"$-1\r\n"),
            RespValue::Array(arr) => self.put_aggregate(buf, b'*', arr),
            RespValue::Boolean(b) if resp3 => Self::put_line(buf, b'#', if *b { b"t" } else { b"f" }),
            RespValue::Boolean(b) => Self::put_line(buf, b':', if *b { b"1" } else { b"0" }),
            RespValue::Double(d) if resp3 => Self::put_line(buf, b',', d.to_string().as_bytes()),
            RespValue::Double(d) => Self::put_bulk(buf, d.to_string().as_bytes()),
            RespValue::Map(entries) => {
                if resp3 {
                    Self::put_line(buf, b'%', entries.len().to_string().as_bytes());
                } else {
                    Self::put_line(buf, b'*', (entries.len() * 2).to_string().as_bytes());
                }
                for (key, value) in entries {
                    self.encode_to(buf, key);
                    self.encode_to(buf, value);
                }
            }
            RespValue::Set(items) => self.put_aggregate(buf, if resp3 { b'~' } else { b'*' }, items),
            RespValue::Push(items) => self.put_aggregate(buf, if resp3 { b'>' } else { b'*' }, items),
        }
    }

    fn put_aggregate(&self, buf: &mut BytesMut, prefix: u8, items: &[RespValue]) {
        Self::put_line(buf, prefix, items.len().to_string().as_bytes());
        for item in items {
            self.encode_to(buf, item);
        }
    }

    fn put_line(buf: &mut BytesMut, prefix: u8, payload: &[u8]) {
        buf.put_u8(prefix);
        buf.put_slice(payload);
        buf.put_slice(CRLF);
    }

    fn put_bulk(buf: &mut BytesMut, bytes: &[u8]) {
        buf.put_u8(b'$');
        buf.put_slice(bytes.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(bytes);
        buf.put_slice(CRLF);
    }
}
