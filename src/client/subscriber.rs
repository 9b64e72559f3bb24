//! Pub/sub subscriber
//!
//! A subscribed session only receives confirmations and messages. `listen` hands the
//! session to a background task that forwards messages over a channel.

use super::Connection;
use crate::commands::{Command, Message, Subscribe, SubscribeConfirmation, Unsubscribe};
use crate::error::{ClientError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Subscriber over one connection
pub struct Subscriber<T = TcpStream> {
    connection: Connection<T>,

    /// Messages that arrived while waiting for a confirmation
    pending: VecDeque<Message>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Subscriber<T> {
    pub fn new(connection: Connection<T>) -> Self {
        Subscriber {
            connection,
            pending: VecDeque::new(),
        }
    }

    /// SUBSCRIBE to a channel and wait for the confirmation
    pub async fn subscribe(&mut self, channel: impl Into<Bytes>) -> Result<SubscribeConfirmation> {
        let cmd = Subscribe::new(channel);
        self.connection.send(&cmd.to_frame()).await?;

        let confirmation = self
            .confirmation(&cmd.channels, SubscribeConfirmation::from_frame)
            .await?;
        info!(
            "Subscribed to {} ({} channels)",
            String::from_utf8_lossy(&confirmation.channel),
            confirmation.count
        );
        Ok(confirmation)
    }

    /// UNSUBSCRIBE from a channel and wait for the confirmation
    ///
    /// Messages still in flight for the channel stay queued for `next_message`.
    pub async fn unsubscribe(&mut self, channel: impl Into<Bytes>) -> Result<SubscribeConfirmation> {
        let cmd = Unsubscribe::new(channel);
        self.connection.send(&cmd.to_frame()).await?;

        let confirmation = self
            .confirmation(&cmd.channels, SubscribeConfirmation::from_unsubscribe_frame)
            .await?;
        info!(
            "Unsubscribed from {} ({} channels left)",
            String::from_utf8_lossy(&confirmation.channel),
            confirmation.count
        );
        Ok(confirmation)
    }

    /// Read until `decode` accepts a frame for one of `channels`, queueing messages
    async fn confirmation(
        &mut self,
        channels: &[Bytes],
        decode: fn(&RespValue) -> Option<SubscribeConfirmation>,
    ) -> Result<SubscribeConfirmation> {
        loop {
            let frame = self.connection.read_frame().await?;
            if let Some(confirmation) = decode(&frame) {
                if channels.contains(&confirmation.channel) {
                    return Ok(confirmation);
                }
            }
            if let RespValue::Error(message) = &frame {
                return Err(ClientError::Server(message.clone()));
            }
            match Message::from_frame(&frame) {
                Some(message) => self.pending.push_back(message),
                None => debug!("Ignoring frame while waiting for confirmation: {}", frame),
            }
        }
    }

    /// Wait for the next message, skipping any other frame
    ///
    /// Cancel safe.
    pub async fn next_message(&mut self) -> Result<Message> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }

        loop {
            let frame = self.connection.read_frame().await?;
            match Message::from_frame(&frame) {
                Some(message) => return Ok(message),
                None => debug!("Ignoring non-message frame: {}", frame),
            }
        }
    }
}

impl<T> Subscriber<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Forward messages to a channel from a background task
    ///
    /// The task ends when `token` is cancelled, the receiver is dropped or the
    /// connection closes, and hands the subscriber back. Any other read error is
    /// returned through the handle.
    pub fn listen(
        mut self,
        token: CancellationToken,
    ) -> (mpsc::UnboundedReceiver<Message>, JoinHandle<Result<Self>>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Listener cancelled");
                        return Ok(self);
                    }
                    next = self.next_message() => match next {
                        Ok(message) => {
                            if tx.send(message).is_err() {
                                return Ok(self);
                            }
                        }
                        Err(ClientError::Closed) => {
                            debug!("Listener connection closed");
                            return Ok(self);
                        }
                        Err(e) => {
                            warn!("Listener stopped: {}", e);
                            return Err(e);
                        }
                    },
                }
            }
        });

        (rx, handle)
    }
}
