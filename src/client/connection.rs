//! Connection handling
//!
//! Owns one transport to a server, encodes request frames and parses replies
//! out of a read buffer.

use crate::error::{ClientError, Result};
use crate::protocol::{ProtocolVersion, RespEncoder, RespParser, RespValue};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Connection handler
pub struct Connection<T = TcpStream> {
    /// Transport (TCP in production)
    stream: T,

    /// Read buffer
    read_buffer: BytesMut,

    /// Write buffer
    write_buffer: BytesMut,

    encoder: RespEncoder,
}

impl Connection<TcpStream> {
    /// Dial a server, giving up after `timeout`
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", addr);
        Ok(Connection::new(stream))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Create a new connection handler
    pub fn new(stream: T) -> Self {
        Connection {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            encoder: RespEncoder::default(),
        }
    }

    /// Switch the request encoding after a successful HELLO
    pub fn set_protocol(&mut self, version: ProtocolVersion) {
        self.encoder = RespEncoder::new(version);
    }

    /// Send a request frame
    pub async fn send(&mut self, frame: &RespValue) -> Result<()> {
        self.write_buffer.clear();
        self.encoder.encode_to(&mut self.write_buffer, frame);

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Read the next frame, whatever it is
    ///
    /// Cancel safe: a partially received frame stays in the read buffer.
    pub async fn read_frame(&mut self) -> Result<RespValue> {
        loop {
            if let Some(frame) = RespParser::parse(&mut self.read_buffer)? {
                return Ok(frame);
            }

            let n = self.stream.read_buf(&mut self.read_buffer).await?;

            // Connection closed
            if n == 0 {
                if !self.read_buffer.is_empty() {
                    debug!(
                        "Peer closed with {} bytes of an unfinished frame",
                        self.read_buffer.len()
                    );
                }
                return Err(ClientError::Closed);
            }
        }
    }

    /// Send a request and read its reply
    ///
    /// Out-of-band RESP3 pushes received while waiting are skipped.
    pub async fn request(&mut self, frame: &RespValue) -> Result<RespValue> {
        self.send(frame).await?;
        loop {
            let reply = self.read_frame().await?;
            if let RespValue::Push(_) = reply {
                debug!("Skipping push frame while awaiting reply: {}", reply);
                continue;
            }
            return Ok(reply);
        }
    }
}
