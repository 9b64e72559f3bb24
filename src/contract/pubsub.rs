//! Pub/sub case: every published message reaches the subscriber exactly once

use super::{ensure, preview, CaseFailure, CaseResult, ContractSuite};
use crate::client::{Client, Subscriber};
use crate::commands::Message;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(super) async fn pub_sub(suite: &ContractSuite) -> CaseResult {
    let config = suite.config();
    let channel = config.pubsub_channel.clone();
    let messages: HashSet<String> = suite
        .dataset(config.pubsub_message_count)
        .keys()
        .map(str::to_owned)
        .collect();

    let mut subscriber = suite.connect().await?.into_subscriber();
    subscriber.subscribe(channel.clone()).await?;

    let token = CancellationToken::new();
    let (mut rx, listener) = subscriber.listen(token.clone());

    let mut publisher = suite.connect().await?;
    let published = publish_all(&mut publisher, &channel, &messages).await;

    let received = match published {
        Ok(()) => {
            let timeout = config.pubsub_timeout();
            match tokio::time::timeout(timeout, receive_all(&mut rx, &channel, &messages)).await {
                Ok(result) => result,
                Err(_) => Err(CaseFailure::new(format!(
                    "messages not delivered within {:?}",
                    timeout
                ))),
            }
        }
        Err(failure) => Err(failure),
    };

    token.cancel();
    let subscriber = match listener.await {
        Ok(Ok(subscriber)) => subscriber,
        Ok(Err(e)) => {
            warn!("Listener ended with error: {}", e);
            return received;
        }
        Err(e) => {
            warn!("Listener task failed: {}", e);
            return received;
        }
    };

    let unsubscribed = unsubscribe(subscriber, &channel, config.pubsub_timeout()).await;
    received.and(unsubscribed)
}

/// Leave the channel and check the session holds no other subscription
async fn unsubscribe(mut subscriber: Subscriber, channel: &str, timeout: Duration) -> CaseResult {
    let confirmation = tokio::time::timeout(timeout, subscriber.unsubscribe(channel.to_owned()))
        .await
        .map_err(|_| CaseFailure::new(format!("UNSUBSCRIBE not confirmed within {:?}", timeout)))??;
    ensure(confirmation.count == 0, || {
        format!(
            "UNSUBSCRIBE {}: expected 0 remaining channels, got {}",
            channel, confirmation.count
        )
    })
}

async fn publish_all(
    publisher: &mut Client,
    channel: &str,
    messages: &HashSet<String>,
) -> CaseResult {
    for message in messages {
        let receivers = publisher.publish(channel.to_owned(), message.clone()).await?;
        ensure(receivers >= 1, || {
            format!(
                "PUBLISH {}: expected at least one receiver, got {}",
                preview(message.as_bytes()),
                receivers
            )
        })?;
    }
    Ok(())
}

/// Drain the listener until every expected message has arrived once
async fn receive_all(
    rx: &mut UnboundedReceiver<Message>,
    channel: &str,
    expected: &HashSet<String>,
) -> CaseResult {
    let mut delivered: HashSet<String> = HashSet::with_capacity(expected.len());

    while delivered.len() < expected.len() {
        let message = rx
            .recv()
            .await
            .ok_or_else(|| CaseFailure::new(format!(
                "listener stopped after {} of {} messages",
                delivered.len(),
                expected.len()
            )))?;
        accept(&message, channel, expected, &mut delivered)?;
    }

    // Anything already queued behind the last expected message is a duplicate or stray
    while let Ok(message) = rx.try_recv() {
        accept(&message, channel, expected, &mut delivered)?;
    }

    debug!("Received all {} messages", delivered.len());
    Ok(())
}

fn accept(
    message: &Message,
    channel: &str,
    expected: &HashSet<String>,
    delivered: &mut HashSet<String>,
) -> CaseResult {
    ensure(&message.channel[..] == channel.as_bytes(), || {
        format!("message on unexpected channel {}", preview(&message.channel))
    })?;

    let payload = String::from_utf8_lossy(&message.payload).into_owned();
    ensure(expected.contains(&payload), || {
        format!("unknown message {}", preview(&message.payload))
    })?;
    ensure(delivered.insert(payload), || {
        format!("message {} delivered twice", preview(&message.payload))
    })
}
