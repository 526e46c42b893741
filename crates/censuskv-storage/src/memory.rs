//! In-memory store backend.
//!
//! Holds tables and items in RAM. Enforces the same batch-write rules as a
//! managed store (25-item limit, key presence, no duplicate keys per batch,
//! missing table → `ResourceNotFound`) and offers hooks to simulate store
//! faults and partial batches in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use censuskv_core::error::StoreError;
use censuskv_core::item::Item;
use censuskv_core::partition::{WriteGroup, WriteRequest};
use censuskv_core::store::{BatchWriteOutput, KvStore};
use censuskv_core::table::{KeySchema, TableDescription, TableSpec, TableStatus};

use crate::validate::{validate_group, PrimaryKey};

struct MemTable {
    spec: TableSpec,
    key: KeySchema,
    items: BTreeMap<PrimaryKey, Item>,
}

impl MemTable {
    fn describe(&self, status: TableStatus) -> TableDescription {
        TableDescription {
            spec: self.spec.clone(),
            status,
            item_count: self.items.len() as u64,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory key-value store.
///
/// All data is lost when the value is dropped.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, MemTable>>,
    faults: Mutex<VecDeque<StoreError>>,
    write_capacity: Option<usize>,
    batch_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit at most `n` requests per batch call; the rest of each batch is
    /// returned as unprocessed.
    pub fn with_write_capacity(mut self, n: usize) -> Self {
        self.write_capacity = Some(n);
        self
    }

    /// Make the next batch-write call fail with `error`.
    ///
    /// Faults queue up and are consumed one per call.
    pub fn inject_fault(&self, error: StoreError) {
        lock(&self.faults).push_back(error);
    }

    /// Number of batch-write calls received, including failed ones.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    pub fn has_table(&self, name: &str) -> bool {
        lock(&self.tables).contains_key(name)
    }

    /// Number of items in `table`, or `None` if it does not exist.
    pub fn item_count(&self, table: &str) -> Option<usize> {
        lock(&self.tables).get(table).map(|t| t.items.len())
    }

    /// Fetch an item by its primary key values.
    pub fn get_item(&self, table: &str, partition_key: &str, sort_key: &str) -> Option<Item> {
        lock(&self.tables).get(table).and_then(|t| {
            t.items
                .get(&(partition_key.to_string(), sort_key.to_string()))
                .cloned()
        })
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn batch_write(&self, group: &WriteGroup) -> Result<BatchWriteOutput, StoreError> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(fault) = lock(&self.faults).pop_front() {
            debug!(batch = group.index, code = fault.code(), "injected fault");
            return Err(fault);
        }

        let mut tables = lock(&self.tables);
        let table = tables.get_mut(&group.table).ok_or_else(|| {
            StoreError::ResourceNotFound(format!(
                "Requested resource not found: Table: {} not found",
                group.table
            ))
        })?;

        let keys = validate_group(group, &table.key)?;
        let accept = self.write_capacity.unwrap_or(usize::MAX).min(group.len());

        for (request, pk) in group.requests.iter().zip(keys).take(accept) {
            match request {
                WriteRequest::Put { item } => {
                    table.items.insert(pk, item.clone());
                }
                WriteRequest::Delete { .. } => {
                    table.items.remove(&pk);
                }
            }
        }

        let unprocessed = group.requests[accept..].to_vec();
        debug!(
            table = %group.table,
            batch = group.index,
            committed = accept,
            unprocessed = unprocessed.len(),
            "batch applied"
        );
        Ok(BatchWriteOutput { unprocessed })
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableDescription, StoreError> {
        let key = spec.key().ok_or_else(|| {
            StoreError::Validation("Key schema must contain a HASH and a RANGE key".into())
        })?;

        let mut tables = lock(&self.tables);
        if tables.contains_key(&spec.name) {
            return Err(StoreError::ResourceInUse(format!(
                "Table already exists: {}",
                spec.name
            )));
        }

        let table = MemTable {
            spec: spec.clone(),
            key,
            items: BTreeMap::new(),
        };
        let desc = table.describe(TableStatus::Active);
        tables.insert(spec.name.clone(), table);
        debug!(table = %spec.name, "table created");
        Ok(desc)
    }

    async fn delete_table(&self, name: &str) -> Result<TableDescription, StoreError> {
        let table = lock(&self.tables).remove(name).ok_or_else(|| {
            StoreError::ResourceNotFound(format!(
                "Requested resource not found: Table: {name} not found"
            ))
        })?;
        debug!(table = name, items = table.items.len(), "table deleted");
        Ok(table.describe(TableStatus::Deleting))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use censuskv_core::item::AttributeValue;
    use censuskv_core::record::RecordVariant;

    fn spec() -> TableSpec {
        TableSpec::new("census", &KeySchema::for_variant(RecordVariant::GeoStratified))
    }

    fn key(region: &str) -> Item {
        let mut item = Item::new();
        item.insert("RegionID".into(), AttributeValue::S(region.into()));
        item.insert("PartitionID".into(), AttributeValue::S("G02".into()));
        item
    }

    fn group(requests: Vec<WriteRequest>) -> WriteGroup {
        WriteGroup {
            table: "census".into(),
            index: 0,
            offset: 0,
            requests,
        }
    }

    fn puts(n: usize) -> WriteGroup {
        group(
            (0..n)
                .map(|i| WriteRequest::Put {
                    item: key(&format!("R{i}")),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn put_then_delete() {
        let store = InMemoryStore::new();
        store.create_table(&spec()).await.unwrap();

        let out = store.batch_write(&puts(3)).await.unwrap();
        assert!(out.is_complete());
        assert_eq!(store.item_count("census"), Some(3));
        assert!(store.get_item("census", "R1", "G02").is_some());

        store
            .batch_write(&group(vec![WriteRequest::Delete { key: key("R1") }]))
            .await
            .unwrap();
        assert_eq!(store.item_count("census"), Some(2));
        assert!(store.get_item("census", "R1", "G02").is_none());
        assert_eq!(store.batch_calls(), 2);
    }

    #[tokio::test]
    async fn missing_table_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.batch_write(&puts(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_twice_is_in_use() {
        let store = InMemoryStore::new();
        let desc = store.create_table(&spec()).await.unwrap();
        assert_eq!(desc.status, TableStatus::Active);
        let err = store.create_table(&spec()).await.unwrap_err();
        assert!(matches!(err, StoreError::ResourceInUse(_)));
    }

    #[tokio::test]
    async fn write_capacity_leaves_tail_unprocessed() {
        let store = InMemoryStore::new().with_write_capacity(20);
        store.create_table(&spec()).await.unwrap();

        let g = puts(25);
        let out = store.batch_write(&g).await.unwrap();
        assert_eq!(out.unprocessed.len(), 5);
        assert_eq!(out.unprocessed[0], g.requests[20]);
        assert_eq!(store.item_count("census"), Some(20));
    }

    #[tokio::test]
    async fn injected_faults_are_consumed_in_order() {
        let store = InMemoryStore::new();
        store.create_table(&spec()).await.unwrap();
        store.inject_fault(StoreError::InternalServerError("boom".into()));

        let err = store.batch_write(&puts(2)).await.unwrap_err();
        assert_eq!(err.code(), "InternalServerError");
        assert_eq!(store.item_count("census"), Some(0));

        assert!(store.batch_write(&puts(2)).await.is_ok());
        assert_eq!(store.item_count("census"), Some(2));
    }

    #[tokio::test]
    async fn oversized_batch_is_validation_error() {
        let store = InMemoryStore::new();
        store.create_table(&spec()).await.unwrap();
        let err = store.batch_write(&puts(26)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.item_count("census"), Some(0));
    }

    #[tokio::test]
    async fn delete_table_reports_items() {
        let store = InMemoryStore::new();
        store.create_table(&spec()).await.unwrap();
        store.batch_write(&puts(4)).await.unwrap();

        let desc = store.delete_table("census").await.unwrap();
        assert_eq!(desc.item_count, 4);
        assert_eq!(desc.status, TableStatus::Deleting);
        assert!(!store.has_table("census"));
        assert!(store.delete_table("census").await.unwrap_err().is_not_found());
    }
}
