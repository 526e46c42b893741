//! `censuskv build-table` / `censuskv purge`: table provisioning.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{info, warn};

use censuskv_core::record::load_records;
use censuskv_core::store::KvStore;
use censuskv_core::table::{TableDescription, TableSpec};

use crate::exit::CliError;

/// Create `table` with the key schema implied by the first record in `file`.
pub async fn build(store: &dyn KvStore, table: &str, file: &Path) -> Result<TableDescription> {
    let records = load_records(file)?;
    let Some(sample) = records.first() else {
        bail!("{} contains no records to derive a key schema from", file.display());
    };

    let spec = TableSpec::from_sample(table, sample);
    info!(table, backend = store.name(), billing = %spec.billing_mode, "creating table");
    store
        .create_table(&spec)
        .await
        .map_err(|source| CliError::Provisioning {
            table: table.to_string(),
            source,
        })
        .map_err(Into::into)
}

/// Whether a purge was carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum PurgeOutcome {
    Refused,
    Purged(TableDescription),
}

/// Delete `table`, but only when both confirmation flags are set.
pub async fn purge(
    store: &dyn KvStore,
    table: &str,
    purge: bool,
    confirm: bool,
) -> Result<PurgeOutcome> {
    if !(purge && confirm) {
        warn!(
            table,
            purge,
            confirm,
            "purge refused: both --purge and --confirm-purge are required"
        );
        return Ok(PurgeOutcome::Refused);
    }

    warn!(table, backend = store.name(), "purging table");
    let desc = store
        .delete_table(table)
        .await
        .map_err(|source| CliError::Provisioning {
            table: table.to_string(),
            source,
        })?;
    Ok(PurgeOutcome::Purged(desc))
}

pub fn print_description(desc: &TableDescription) {
    println!("Table:   {}", desc.spec.name);
    println!("Status:  {}", desc.status);
    println!("Billing: {}", desc.spec.billing_mode);
    for element in &desc.spec.key_schema {
        println!("Key:     {} ({:?})", element.name, element.key_type);
    }
    println!("Items:   {}", desc.item_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::{code_for, PROVISIONING_FAILED};
    use censuskv_core::table::TableStatus;
    use censuskv_storage::InMemoryStore;
    use std::fs;

    const RECORDS: &str = r#"[{"RegionID":"1","PartitionID":"G02","GeoLevel":"STE","KVPairs":{"Tot_P":5.0}}]"#;

    #[tokio::test]
    async fn build_derives_key_from_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("recs.json");
        fs::write(&file, RECORDS).unwrap();

        let store = InMemoryStore::new();
        let desc = build(&store, "census", &file).await.unwrap();
        assert_eq!(desc.status, TableStatus::Active);
        assert_eq!(desc.spec.key().unwrap().sort_key, "PartitionID");

        let err = build(&store, "census", &file).await.unwrap_err();
        assert_eq!(code_for(&err), PROVISIONING_FAILED);
    }

    #[tokio::test]
    async fn build_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, "[]").unwrap();

        let store = InMemoryStore::new();
        assert!(build(&store, "census", &file).await.is_err());
        assert!(!store.has_table("census"));
    }

    #[tokio::test]
    async fn purge_requires_both_flags() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("recs.json");
        fs::write(&file, RECORDS).unwrap();
        let store = InMemoryStore::new();
        build(&store, "census", &file).await.unwrap();

        assert_eq!(purge(&store, "census", true, false).await.unwrap(), PurgeOutcome::Refused);
        assert_eq!(purge(&store, "census", false, true).await.unwrap(), PurgeOutcome::Refused);
        assert!(store.has_table("census"));

        let outcome = purge(&store, "census", true, true).await.unwrap();
        assert!(matches!(outcome, PurgeOutcome::Purged(_)));
        assert!(!store.has_table("census"));
    }

    #[tokio::test]
    async fn purging_missing_table_is_provisioning_failure() {
        let store = InMemoryStore::new();
        let err = purge(&store, "nope", true, true).await.unwrap_err();
        assert_eq!(code_for(&err), PROVISIONING_FAILED);
    }
}
