//! Transaction cases: MULTI/EXEC atomicity, DISCARD, rollback and WATCH

use super::{ensure, expect_absent, expect_stored, expect_value, preview, CaseResult, ContractSuite};
use crate::commands::{Del, ExecOutcome, QueueReply, Raw, Set};
use crate::dataset::random_string;
use tracing::{debug, info};

/// Name of a command no server implements
const UNKNOWN_COMMAND: &str = "NOSUCHCOMMAND";

/// A block whose second half deletes missing keys must leave nothing behind
pub(super) async fn tx_atomic(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.tx_dataset_size);
    let half = data.len() / 2;

    client.multi().await?;
    for (i, (k, v)) in data.iter().enumerate() {
        let reply = if i < half {
            client.queue(Set::new(k.to_owned(), v.to_owned())).await?
        } else {
            client.queue(Del::new(k.to_owned())).await?
        };
        debug!("Queued command {}: {:?}", i, reply);
    }
    let outcome = client.exec().await?;
    info!("EXEC after failing DEL: {}", describe(&outcome));

    for k in data.keys() {
        expect_absent(&mut client, k, "after rolled back block").await?;
    }

    Ok(())
}

pub(super) async fn tx_commit(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.tx_dataset_size);

    client.multi().await?;
    for (k, v) in data.iter() {
        let reply = client.queue(Set::new(k.to_owned(), v.to_owned())).await?;
        ensure(reply == QueueReply::Queued, || {
            format!("SET {} in MULTI: expected QUEUED, got {:?}", preview(k.as_bytes()), reply)
        })?;
    }

    match client.exec().await? {
        ExecOutcome::Committed(replies) => ensure(replies.len() == data.len(), || {
            format!("EXEC returned {} replies for {} commands", replies.len(), data.len())
        })?,
        other => {
            return Err(super::CaseFailure::new(format!(
                "EXEC of valid SETs was not committed: {}",
                describe(&other)
            )))
        }
    }

    for (k, v) in data.iter() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(v), value.as_ref())?;
    }

    Ok(())
}

pub(super) async fn tx_discard(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.tx_dataset_size);

    for (i, k) in data.keys().enumerate() {
        expect_stored(k, client.set(k.to_owned(), i.to_string()).await?)?;
    }

    client.multi().await?;
    for (k, v) in data.iter() {
        let reply = client.queue(Set::new(k.to_owned(), format!("modify_{}", v))).await?;
        ensure(reply == QueueReply::Queued, || {
            format!("SET {} in MULTI: expected QUEUED, got {:?}", preview(k.as_bytes()), reply)
        })?;
    }
    client.discard().await?;

    for (i, k) in data.keys().enumerate() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(i.to_string().as_str()), value.as_ref())?;
    }

    Ok(())
}

/// An unknown command in the middle of a block must void the whole block
pub(super) async fn tx_invalid_command(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.tx_dataset_size);
    let middle = data.len() / 2;

    for (k, v) in data.iter() {
        expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
    }

    client.multi().await?;
    for (i, (k, v)) in data.iter().enumerate() {
        if i == middle {
            let reply = client
                .queue(Raw::new([UNKNOWN_COMMAND.to_string(), k.to_owned()]))
                .await?;
            debug!("Queued {}: {:?}", UNKNOWN_COMMAND, reply);
        }
        client.queue(Set::new(k.to_owned(), format!("{}#{}", v, i))).await?;
    }
    let outcome = client.exec().await?;
    info!("EXEC after unknown command: {}", describe(&outcome));

    for (k, v) in data.iter() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(v), value.as_ref())?;
    }

    Ok(())
}

/// A watched key changed by another session must abort the block
pub(super) async fn tx_watch(suite: &ContractSuite) -> CaseResult {
    let mut watcher = suite.connect().await?;
    let mut other = suite.connect().await?;
    let data = suite.dataset(suite.config.tx_dataset_size);
    let watched = random_string(suite.config.str_len);
    let overwritten = format!("other_{}", random_string(8));

    for (k, v) in data.iter() {
        expect_stored(k, watcher.set(k.to_owned(), v.to_owned()).await?)?;
    }
    expect_stored(&watched, watcher.set(watched.clone(), "original").await?)?;

    watcher.watch(watched.clone()).await?;
    watcher.multi().await?;
    expect_stored(&watched, other.set(watched.clone(), overwritten.clone()).await?)?;

    for (k, v) in data.iter() {
        watcher.queue(Set::new(k.to_owned(), format!("modify_{}", v))).await?;
    }
    watcher.queue(Set::new(watched.clone(), "from_watcher")).await?;

    let outcome = watcher.exec().await?;
    ensure(!outcome.is_committed(), || {
        format!("EXEC committed although the watched key changed: {}", describe(&outcome))
    })?;

    let value = watcher.get(watched.clone()).await?;
    expect_value(&watched, Some(overwritten.as_str()), value.as_ref())?;
    for (k, v) in data.iter() {
        let value = watcher.get(k.to_owned()).await?;
        expect_value(k, Some(v), value.as_ref())?;
    }

    Ok(())
}

fn describe(outcome: &ExecOutcome) -> String {
    match outcome {
        ExecOutcome::Committed(replies) => format!("committed {} replies", replies.len()),
        ExecOutcome::Aborted => "aborted (null)".to_string(),
        ExecOutcome::Failed(message) => format!("failed: {}", message),
    }
}
