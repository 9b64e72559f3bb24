mod support;

use kvcontract::config::{LoadConfig, LoadTask};
use kvcontract::load::{LoadRunner, RequestKind};
use kvcontract::protocol::ProtocolVersion;
use std::time::Duration;
use support::StubServer;
use tokio_util::sync::CancellationToken;

fn short_load() -> LoadConfig {
    LoadConfig {
        users: 4,
        spawn_rate: 50.0,
        duration_secs: 1,
        ..LoadConfig::default()
    }
}

#[tokio::test]
async fn test_load_against_stub() {
    let server = StubServer::start().await;
    let runner = LoadRunner::new(server.endpoint(ProtocolVersion::Resp3), short_load());

    let summary = runner.run().await.unwrap();

    assert!(summary.counts(RequestKind::Set).successes > 0);
    assert!(summary.counts(RequestKind::Get).successes > 0);
    assert_eq!(summary.total_failures(), 0);
    assert_eq!(server.key_count(), 1);
}

#[tokio::test]
async fn test_get_only_load() {
    let server = StubServer::start().await;
    let config = LoadConfig {
        tasks: vec![LoadTask::Get],
        ..short_load()
    };

    let summary = LoadRunner::new(server.endpoint(ProtocolVersion::Resp2), config)
        .run()
        .await
        .unwrap();

    assert!(summary.counts(RequestKind::Get).successes > 0);
    assert_eq!(summary.counts(RequestKind::Set).successes, 0);
    assert_eq!(server.key_count(), 0);
}

#[tokio::test]
async fn test_down_target_records_failures() {
    let server = StubServer::start().await;
    let mut endpoint = server.endpoint(ProtocolVersion::Resp3);
    endpoint.port = 1;

    let summary = LoadRunner::new(endpoint, short_load()).run().await.unwrap();

    assert_eq!(summary.counts(RequestKind::Connect).failures, 4);
    assert_eq!(summary.total_successes(), 0);
}

#[tokio::test]
async fn test_external_cancellation_stops_early() {
    let server = StubServer::start().await;
    let config = LoadConfig {
        duration_secs: 60,
        ..short_load()
    };
    let runner = LoadRunner::new(server.endpoint(ProtocolVersion::Resp3), config);

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), runner.run_with_token(token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.total_failures(), 0);
}
