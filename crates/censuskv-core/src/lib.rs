//! censuskv-core: records, CSV transformation and batch-write orchestration.
//!
//! # Architecture
//!
//! ```text
//! CSV file ──► CsvTransformer ──► JSON array of Records
//!                   └── parse_file_name (PartitionID / GeoLevel)
//!
//! Records ──► partition (≤ 25 per WriteGroup) ──► execute ──► RunReport
//!                                                   └── KvStore (memory / SQLite)
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod item;
pub mod metadata;
pub mod partition;
pub mod record;
pub mod store;
pub mod table;
pub mod transform;

pub use config::{PipelineConfig, TransformConfig};
pub use error::{BatchError, ConfigError, InputError, StoreError};
pub use executor::{execute, ExecutionMode, GroupOutcome, GroupStatus, RunReport};
pub use item::{AttributeValue, Item};
pub use metadata::{parse_file_name, FileMetadata};
pub use partition::{
    partition, partition_deletes, partition_puts, WriteGroup, WriteRequest, MAX_BATCH_SIZE,
};
pub use record::{
    build_record, load_records, to_delete_projection, DeleteRecord, KvPairs, Record,
    RecordVariant,
};
pub use store::{BatchWriteOutput, KvStore};
pub use table::{KeySchema, TableDescription, TableSpec, TableStatus};
pub use transform::{CsvTransformer, JsonArrayWriter, TransformSummary};
