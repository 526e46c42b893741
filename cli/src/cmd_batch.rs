//! `censuskv load` / `censuskv delete`: batch writes from a records file.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use censuskv_core::executor::{execute, ExecutionMode, RunReport};
use censuskv_core::partition::{partition_deletes, partition_puts};
use censuskv_core::record::{load_records, to_delete_projection};
use censuskv_core::store::KvStore;
use censuskv_core::table::KeySchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Load,
    Delete,
}

/// Put (or delete) every record in `file` against `table`.
///
/// Returns `None` when the file holds no records.
pub async fn run(
    store: &dyn KvStore,
    table: &str,
    file: &Path,
    op: BatchOp,
    mode: ExecutionMode,
    batch_size: usize,
) -> Result<Option<RunReport>> {
    let records = load_records(file)?;
    let Some(sample) = records.first() else {
        info!(file = %file.display(), "no records to process");
        return Ok(None);
    };
    let key = KeySchema::from_sample(sample);

    let groups = match op {
        BatchOp::Load => partition_puts(&records, &key, table, batch_size)?,
        BatchOp::Delete => {
            let keys = to_delete_projection(&records);
            partition_deletes(&keys, &key, table, batch_size)?
        }
    };
    info!(
        op = ?op,
        file = %file.display(),
        records = records.len(),
        groups = groups.len(),
        "records partitioned"
    );

    Ok(Some(execute(&groups, store, mode).await))
}

pub fn print_report(report: &RunReport) {
    print!("{report}");
    if report.mode.is_dry_run() {
        for outcome in &report.outcomes {
            println!("  {outcome}");
        }
    }
}
