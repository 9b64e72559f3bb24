//! Key/value cases: SET and its options, GET, DEL, EXISTS

use super::{ensure, expect_absent, expect_stored, expect_value, preview, CaseResult, ContractSuite};
use crate::commands::{SetOptions, SetReply};
use crate::dataset::random_string;
use std::time::Duration;
use tracing::debug;

pub(super) async fn set_get(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (k, v) in data.iter() {
        expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
    }

    for (k, v) in data.iter() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(v), value.as_ref())?;
    }

    Ok(())
}

pub(super) async fn set_ex(suite: &ContractSuite) -> CaseResult {
    let seconds = suite.config.expire_seconds;
    expiring_set(suite, SetOptions::default().ex(seconds), Duration::from_secs(seconds)).await
}

pub(super) async fn set_px(suite: &ContractSuite) -> CaseResult {
    let millis = suite.config.expire_millis;
    expiring_set(suite, SetOptions::default().px(millis), Duration::from_millis(millis)).await
}

/// SET every pair with an expiration, wait it out, check every key is gone
async fn expiring_set(suite: &ContractSuite, options: SetOptions, ttl: Duration) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (k, v) in data.iter() {
        let reply = client.set_with(k.to_owned(), v.to_owned(), options).await?;
        ensure(reply == SetReply::Stored, || {
            format!("SET {} {:?}: expected OK, got {:?}", preview(k.as_bytes()), options.expiration, reply)
        })?;
    }

    debug!("Waiting {:?} for {} keys to expire", ttl, data.len());
    tokio::time::sleep(ttl).await;

    for k in data.keys() {
        expect_absent(&mut client, k, "after expiry").await?;
    }

    Ok(())
}

pub(super) async fn set_nx(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (i, (k, v)) in data.iter().enumerate() {
        if data.in_first_half(i) {
            expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
        }
    }

    for (i, (k, v)) in data.iter().enumerate() {
        if data.in_first_half(i) {
            let fresh = random_string(suite.config.str_len);
            let reply = client.set_with(k.to_owned(), fresh, SetOptions::default().nx()).await?;
            ensure(reply == SetReply::NotStored, || {
                format!("SET NX on existing key {} was applied: {:?}", preview(k.as_bytes()), reply)
            })?;
        } else {
            let reply = client
                .set_with(k.to_owned(), v.to_owned(), SetOptions::default().nx())
                .await?;
            ensure(reply == SetReply::Stored, || {
                format!("SET NX on new key {} was refused: {:?}", preview(k.as_bytes()), reply)
            })?;
        }
    }

    for (k, v) in data.iter() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(v), value.as_ref())?;
    }

    Ok(())
}

pub(super) async fn set_xx(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (i, (k, v)) in data.iter().enumerate() {
        if data.in_first_half(i) {
            expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
        }
    }

    for (i, (k, v)) in data.iter().enumerate() {
        let modified = format!("modify_{}", v);
        let reply = client.set_with(k.to_owned(), modified, SetOptions::default().xx()).await?;
        if data.in_first_half(i) {
            ensure(reply == SetReply::Stored, || {
                format!("SET XX on existing key {} was refused: {:?}", preview(k.as_bytes()), reply)
            })?;
        } else {
            ensure(reply == SetReply::NotStored, || {
                format!("SET XX on new key {} was applied: {:?}", preview(k.as_bytes()), reply)
            })?;
        }
    }

    for (i, (k, v)) in data.iter().enumerate() {
        if data.in_first_half(i) {
            let value = client.get(k.to_owned()).await?;
            expect_value(k, Some(format!("modify_{}", v).as_str()), value.as_ref())?;
        } else {
            expect_absent(&mut client, k, "after SET XX").await?;
        }
    }

    Ok(())
}

pub(super) async fn set_get_option(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (i, (k, v)) in data.iter().enumerate() {
        if data.in_first_half(i) {
            expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
        }
    }

    for (i, (k, v)) in data.iter().enumerate() {
        let modified = format!("modify_{}", v);
        let reply = client.set_with(k.to_owned(), modified, SetOptions::default().get()).await?;
        let previous = match reply {
            SetReply::Previous(previous) => previous,
            other => {
                return Err(super::CaseFailure::new(format!(
                    "SET GET {}: expected the previous value, got {:?}",
                    preview(k.as_bytes()),
                    other
                )))
            }
        };
        let expected = if data.in_first_half(i) { Some(v) } else { None };
        expect_value(k, expected, previous.as_ref())?;
    }

    for (k, v) in data.iter() {
        let value = client.get(k.to_owned()).await?;
        expect_value(k, Some(format!("modify_{}", v).as_str()), value.as_ref())?;
    }

    Ok(())
}

pub(super) async fn del(suite: &ContractSuite) -> CaseResult {
    let mut client = suite.connect().await?;
    let data = suite.dataset(suite.config.kv_dataset_size);

    for (k, v) in data.iter() {
        expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
    }

    for k in data.keys() {
        let removed = client.del(k.to_owned()).await?;
        ensure(removed == 1, || {
            format!("DEL {}: expected 1, got {}", preview(k.as_bytes()), removed)
        })?;
    }

    for k in data.keys() {
        let removed = client.del(k.to_owned()).await?;
        ensure(removed == 0, || {
            format!("second DEL {}: expected 0, got {}", preview(k.as_bytes()), removed)
        })?;
        expect_absent(&mut client, k, "after DEL").await?;
    }

    Ok(())
}
