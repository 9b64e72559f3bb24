//! Merge case: log compaction keeps the latest value of every surviving key

use super::{ensure, expect_absent, expect_stored, expect_value, preview, CaseResult, ContractSuite};
use tracing::debug;

pub(super) async fn merge(suite: &ContractSuite) -> CaseResult {
    let config = suite.config();
    let mut client = suite.connect().await?;
    let data = suite.dataset(config.merge_dataset_size);

    for (k, v) in data.iter() {
        expect_stored(k, client.set(k.to_owned(), v.to_owned()).await?)?;
    }

    for version in 1..=config.merge_versions {
        for (idx, (k, v)) in data.iter().enumerate() {
            expect_stored(k, client.set(k.to_owned(), versioned(version, idx, v)).await?)?;
        }
    }

    for (idx, k) in data.keys().enumerate() {
        if idx % config.merge_delete_every == 0 {
            let removed = client.del(k.to_owned()).await?;
            ensure(removed == 1, || {
                format!("DEL {}: expected 1, got {}", preview(k.as_bytes()), removed)
            })?;
        }
    }

    debug!("Requesting MERGE after {} versions", config.merge_versions);
    client.merge().await?;

    for (idx, (k, v)) in data.iter().enumerate() {
        if idx % config.merge_delete_every == 0 {
            expect_absent(&mut client, k, "after MERGE").await?;
        } else {
            let value = client.get(k.to_owned()).await?;
            let latest = versioned(config.merge_versions, idx, v);
            expect_value(k, Some(latest.as_str()), value.as_ref())?;
        }
    }

    Ok(())
}

fn versioned(version: usize, idx: usize, value: &str) -> String {
    format!("{}_{}_{}", version, idx, value)
}
