//! Load generation
//!
//! Virtual users hammer the target with GET and SET until the configured duration
//! elapses. Each user is one tokio task owning one connection; every request becomes
//! a `RequestEvent` sent to a collector task.

mod events;

pub use events::{EventSink, LoadSummary, RequestCounts, RequestEvent, RequestKind};

use crate::client::Client;
use crate::config::{Config, Endpoint, LoadConfig, LoadTask};
use crate::error::ClientError;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounds of the `bids` field written by SET
const BIDS_MIN: u32 = 47238;
const BIDS_MAX: u32 = 57238;

/// Load runner
pub struct LoadRunner {
    target: Endpoint,
    config: Arc<LoadConfig>,
}

impl LoadRunner {
    pub fn new(target: Endpoint, config: LoadConfig) -> Self {
        LoadRunner {
            target,
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        LoadRunner::new(config.target.clone(), config.load.clone())
    }

    /// Run for the configured duration
    pub async fn run(&self) -> anyhow::Result<LoadSummary> {
        self.run_with_token(CancellationToken::new()).await
    }

    /// Run until the duration elapses or `token` is cancelled
    pub async fn run_with_token(&self, token: CancellationToken) -> anyhow::Result<LoadSummary> {
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(LoadSummary::collect(rx));

        let duration = self.config.duration();
        let timer = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                token.cancel();
            })
        };

        info!(
            "Starting {} users at {}/s against {} for {:?}",
            self.config.users,
            self.config.spawn_rate,
            self.target.addr(),
            duration
        );

        let interval = self.config.spawn_interval();
        let mut users = Vec::with_capacity(self.config.users);
        for id in 0..self.config.users {
            if token.is_cancelled() {
                break;
            }

            users.push(tokio::spawn(virtual_user(
                id,
                self.target.clone(),
                self.config.clone(),
                tx.clone(),
                token.clone(),
            )));

            if id + 1 < self.config.users {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
        info!("{} users started", users.len());
        drop(tx);

        token.cancelled().await;
        timer.abort();
        info!("Stopping users");

        for user in users {
            user.await.context("virtual user panicked")?;
        }
        let summary = collector.await.context("event collector panicked")?;
        info!(
            "Load finished: {} ok, {} failed",
            summary.total_successes(),
            summary.total_failures()
        );

        Ok(summary)
    }
}

/// One virtual user: connect, then loop over random tasks until cancelled
async fn virtual_user(
    id: usize,
    target: Endpoint,
    config: Arc<LoadConfig>,
    events: EventSink,
    token: CancellationToken,
) {
    let started = Instant::now();
    let connected = tokio::select! {
        _ = token.cancelled() => return,
        result = Client::connect(&target) => result,
    };

    let mut client = match connected {
        Ok(client) => client,
        Err(e) => {
            warn!("User {} failed to connect to {}: {}", id, target.addr(), e);
            let _ = events.send(RequestEvent::failure(
                RequestKind::Connect,
                target.addr(),
                started.elapsed(),
                e,
            ));
            return;
        }
    };
    debug!("User {} connected", id);

    let mut rng = StdRng::from_entropy();
    loop {
        let task = config.tasks[rng.gen_range(0..config.tasks.len())];
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = perform(&mut client, task, &config, &mut rng) => outcome,
        };

        let (event, connection_lost) = outcome;
        if events.send(event).is_err() {
            break;
        }
        if connection_lost {
            warn!("User {} lost its connection, stopping", id);
            break;
        }
    }

    debug!("User {} stopped", id);
}

/// Run one task and time it
///
/// Returns the event and whether the connection is unusable afterwards.
async fn perform<T: AsyncRead + AsyncWrite + Unpin>(
    client: &mut Client<T>,
    task: LoadTask,
    config: &LoadConfig,
    rng: &mut StdRng,
) -> (RequestEvent, bool) {
    let started = Instant::now();
    let (kind, key, result) = match task {
        LoadTask::Set => {
            let body = bids_body(rng);
            let length = body.len();
            let result = client
                .set(config.set_key.clone(), body)
                .await
                .map(|_| length);
            (RequestKind::Set, &config.set_key, result)
        }
        LoadTask::Get => {
            let result = client
                .get(config.get_key.clone())
                .await
                .map(|value| value.map(|v| v.len()).unwrap_or(0));
            (RequestKind::Get, &config.get_key, result)
        }
    };
    let elapsed = started.elapsed();

    match result {
        Ok(length) => (RequestEvent::success(kind, key.as_str(), elapsed, length), false),
        Err(e) => {
            let lost = matches!(
                e,
                ClientError::Io(_) | ClientError::Closed | ClientError::Protocol(_) | ClientError::Timeout(_)
            );
            (RequestEvent::failure(kind, key.as_str(), elapsed, &e), lost)
        }
    }
}

/// JSON body written by SET
fn bids_body(rng: &mut impl Rng) -> String {
    serde_json::json!({ "bids": rng.gen_range(BIDS_MIN..=BIDS_MAX) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connection;
    use tokio_test::io::Builder;

    #[test]
    fn test_bids_body() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let body: serde_json::Value = serde_json::from_str(&bids_body(&mut rng)).unwrap();
            let bids = body["bids"].as_u64().unwrap();
            assert!((u64::from(BIDS_MIN)..=u64::from(BIDS_MAX)).contains(&bids));
        }
    }

    #[tokio::test]
    async fn test_absent_get_is_empty_success() {
        let mock = Builder::new()
            .write(b"*2\r\n$3\r\nGET\r\n$20\r\nstring_get_operation\r\n")
            .read(b"$-1\r\n")
            .build();
        let mut client = Client::new(Connection::new(mock));
        let mut rng = StdRng::seed_from_u64(1);

        let (event, lost) = perform(&mut client, LoadTask::Get, &LoadConfig::default(), &mut rng).await;
        assert!(!lost);
        assert_eq!(event.kind, RequestKind::Get);
        assert_eq!(event.name, "string_get_operation");
        assert_eq!(event.response_length, 0);
        assert!(!event.is_failure());
    }

    #[tokio::test]
    async fn test_server_error_keeps_connection() {
        let mock = Builder::new()
            .write(b"*2\r\n$3\r\nGET\r\n$20\r\nstring_get_operation\r\n")
            .read(b"-WRONGTYPE nope\r\n")
            .build();
        let mut client = Client::new(Connection::new(mock));
        let mut rng = StdRng::seed_from_u64(1);

        let (event, lost) = perform(&mut client, LoadTask::Get, &LoadConfig::default(), &mut rng).await;
        assert!(!lost);
        assert!(event.error.unwrap().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_closed_connection_is_lost() {
        let mock = Builder::new()
            .write(b"*2\r\n$3\r\nGET\r\n$20\r\nstring_get_operation\r\n")
            .build();
        let mut client = Client::new(Connection::new(mock));
        let mut rng = StdRng::seed_from_u64(1);

        let (event, lost) = perform(&mut client, LoadTask::Get, &LoadConfig::default(), &mut rng).await;
        assert!(lost);
        assert!(event.is_failure());
    }

    #[tokio::test]
    async fn test_unreachable_target_records_connect_failures() {
        let target = Endpoint {
            port: 1,
            connect_timeout_ms: 200,
            ..Endpoint::default()
        };
        let config = LoadConfig {
            users: 3,
            spawn_rate: 100.0,
            duration_secs: 1,
            ..LoadConfig::default()
        };

        let summary = LoadRunner::new(target, config).run().await.unwrap();
        assert_eq!(summary.counts(RequestKind::Connect).failures, 3);
        assert_eq!(summary.total_successes(), 0);
    }
}
