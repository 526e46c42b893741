//! The `KvStore` trait, the boundary to the key-value store.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::partition::{WriteGroup, WriteRequest};
use crate::table::{TableDescription, TableSpec};

/// Result of one accepted batch-write call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    /// Requests the store accepted but did not commit.
    pub unprocessed: Vec<WriteRequest>,
}

impl BatchWriteOutput {
    pub fn all_processed() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// A key-value store that accepts batched writes.
///
/// # Object Safety
/// The trait is object-safe and can be used as `&dyn KvStore`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Submit one group of at most 25 put/delete requests.
    ///
    /// A returned error means nothing in the group is known to be committed.
    /// Partial acceptance is reported through
    /// [`BatchWriteOutput::unprocessed`].
    async fn batch_write(&self, group: &WriteGroup) -> Result<BatchWriteOutput, StoreError>;

    /// Create a table. Fails with `ResourceInUse` if it already exists.
    async fn create_table(&self, spec: &TableSpec) -> Result<TableDescription, StoreError>;

    /// Drop a table and everything in it. There is no undo.
    async fn delete_table(&self, name: &str) -> Result<TableDescription, StoreError>;

    /// Backend identifier, for logs.
    fn name(&self) -> &str;
}
