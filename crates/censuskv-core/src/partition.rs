//! Batch partitioner: splits records into store-sized write groups.
//!
//! A store batch-write call accepts at most [`MAX_BATCH_SIZE`] requests.
//! `partition` produces `ceil(count / batch_size)` groups, every one of them
//! non-empty; construction stops when the input runs out, so an exact
//! multiple of the batch size never yields a trailing empty group.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BatchError, InputError};
use crate::item::Item;
use crate::record::{DeleteRecord, Record};
use crate::table::KeySchema;

/// Hard per-call item limit of the store's batch-write API.
pub const MAX_BATCH_SIZE: usize = 25;

/// One write operation inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    /// Insert or replace a full item.
    Put { item: Item },
    /// Delete the item with this primary key.
    Delete { key: Item },
}

impl WriteRequest {
    /// The attributes identifying the target item (full item for puts).
    pub fn attributes(&self) -> &Item {
        match self {
            Self::Put { item } => item,
            Self::Delete { key } => key,
        }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, Self::Put { .. })
    }
}

/// An ordered batch of at most [`MAX_BATCH_SIZE`] write requests for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteGroup {
    /// Target table.
    pub table: String,
    /// Position of this group in the run (0-based).
    pub index: usize,
    /// Input position of the group's first request.
    pub offset: usize,
    pub requests: Vec<WriteRequest>,
}

impl WriteGroup {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

fn check_batch_size(batch_size: usize) -> Result<(), BatchError> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(BatchError::InvalidBatchSize {
            size: batch_size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Partition `items` into groups of at most `batch_size`, mapping each one to
/// a write request with `map`.
///
/// Fails on the first item `map` rejects; the error carries its input index.
pub fn partition<T, F>(
    items: &[T],
    batch_size: usize,
    table: &str,
    mut map: F,
) -> Result<Vec<WriteGroup>, BatchError>
where
    F: FnMut(&T) -> Result<WriteRequest, InputError>,
{
    check_batch_size(batch_size)?;

    let mut groups = Vec::with_capacity(items.len().div_ceil(batch_size));
    for (index, chunk) in items.chunks(batch_size).enumerate() {
        let offset = index * batch_size;
        let requests = chunk
            .iter()
            .enumerate()
            .map(|(i, item)| {
                map(item).map_err(|source| BatchError::ItemFailed {
                    index: offset + i,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        groups.push(WriteGroup {
            table: table.to_string(),
            index,
            offset,
            requests,
        });
    }

    debug!(
        table,
        records = items.len(),
        groups = groups.len(),
        batch_size,
        "partitioned records"
    );
    Ok(groups)
}

/// Partition records into put groups.
pub fn partition_puts(
    records: &[Record],
    schema: &KeySchema,
    table: &str,
    batch_size: usize,
) -> Result<Vec<WriteGroup>, BatchError> {
    partition(records, batch_size, table, |r| {
        Ok(WriteRequest::Put {
            item: r.to_item(schema)?,
        })
    })
}

/// Partition delete projections into delete-by-key groups.
pub fn partition_deletes(
    records: &[DeleteRecord],
    schema: &KeySchema,
    table: &str,
    batch_size: usize,
) -> Result<Vec<WriteGroup>, BatchError> {
    partition(records, batch_size, table, |r| {
        Ok(WriteRequest::Delete {
            key: r.to_key(schema)?,
        })
    })
}
