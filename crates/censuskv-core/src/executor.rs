//! Batch executor: submits write groups to a store and reports outcomes.
//!
//! Groups are submitted one at a time, in partition order. A store error on
//! one group is recorded and the run moves on to the next group; unprocessed
//! items are recorded and never resubmitted. Dry-run mode performs no store
//! calls at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::partition::{WriteGroup, WriteRequest};
use crate::store::KvStore;

/// Whether the executor may mutate the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Report what would be written; never call the store.
    #[default]
    DryRun,
    /// Submit every group to the store.
    Live,
}

impl ExecutionMode {
    /// `Live` only when the operator explicitly confirmed.
    pub fn confirmed(confirmed: bool) -> Self {
        if confirmed {
            Self::Live
        } else {
            Self::DryRun
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// A request the store accepted but did not commit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnprocessedItem {
    /// Input position of the request.
    pub index: usize,
    pub request: WriteRequest,
}

/// How one group fared.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupStatus {
    /// Dry run: reported only.
    DryRun,
    /// Every request committed.
    Committed,
    /// Accepted, but some requests were left unprocessed.
    Partial { unprocessed: Vec<UnprocessedItem> },
    /// The store rejected the call.
    Failed { error: StoreError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome {
    /// Group position in the run.
    pub index: usize,
    /// Input position of the group's first request.
    pub offset: usize,
    /// Requests in the group.
    pub items: usize,
    pub status: GroupStatus,
}

impl GroupOutcome {
    /// Needs operator follow-up (failed or left items unprocessed).
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.status,
            GroupStatus::Partial { .. } | GroupStatus::Failed { .. }
        )
    }

    /// Requests known to be committed.
    pub fn committed(&self) -> usize {
        match &self.status {
            GroupStatus::Committed => self.items,
            GroupStatus::Partial { unprocessed } => self.items.saturating_sub(unprocessed.len()),
            GroupStatus::DryRun | GroupStatus::Failed { .. } => 0,
        }
    }
}

impl fmt::Display for GroupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} (items {}..{}): ",
            self.index,
            self.offset,
            self.offset + self.items
        )?;
        match &self.status {
            GroupStatus::DryRun => write!(f, "dry-run, {} request(s) not submitted", self.items),
            GroupStatus::Committed => write!(f, "committed {} request(s)", self.items),
            GroupStatus::Partial { unprocessed } => {
                write!(f, "{} unprocessed item(s)", unprocessed.len())?;
                let indices: Vec<String> = unprocessed
                    .iter()
                    .map(|u| format!("#{}", u.index))
                    .collect();
                if !indices.is_empty() {
                    write!(f, ": {}", indices.join(", "))?;
                }
                Ok(())
            }
            GroupStatus::Failed { error } => {
                write!(f, "failed {}: {}", error.code(), error.message())
            }
        }
    }
}

/// Aggregated result of one executor run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub table: String,
    pub mode: ExecutionMode,
    pub outcomes: Vec<GroupOutcome>,
}

impl RunReport {
    pub fn total_items(&self) -> usize {
        self.outcomes.iter().map(|o| o.items).sum()
    }

    pub fn committed_items(&self) -> usize {
        self.outcomes.iter().map(GroupOutcome::committed).sum()
    }

    pub fn unprocessed_items(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                GroupStatus::Partial { unprocessed } => unprocessed.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn failed_groups(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, GroupStatus::Failed { .. }))
            .count()
    }

    /// Groups that failed or left unprocessed items.
    pub fn attention(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes.iter().filter(|o| o.needs_attention())
    }

    /// `true` when nothing needs operator follow-up.
    pub fn is_clean(&self) -> bool {
        self.attention().next().is_none()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "table={} mode={} groups={} items={} committed={} unprocessed={} failed_groups={}",
            self.table,
            self.mode,
            self.outcomes.len(),
            self.total_items(),
            self.committed_items(),
            self.unprocessed_items(),
            self.failed_groups()
        )?;
        for outcome in self.attention() {
            writeln!(f, "  {outcome}")?;
        }
        Ok(())
    }
}

/// Submit `groups` to `store` sequentially (or only report them in dry-run).
pub async fn execute(groups: &[WriteGroup], store: &dyn KvStore, mode: ExecutionMode) -> RunReport {
    let table = groups.first().map(|g| g.table.clone()).unwrap_or_default();
    info!(
        store = store.name(),
        table = %table,
        groups = groups.len(),
        mode = %mode,
        "executing batch run"
    );

    let mut outcomes = Vec::with_capacity(groups.len());
    for group in groups {
        let status = match mode {
            ExecutionMode::DryRun => {
                info!(
                    batch = group.index,
                    items = group.len(),
                    table = %group.table,
                    "dry run: batch not submitted"
                );
                GroupStatus::DryRun
            }
            ExecutionMode::Live => submit(group, store).await,
        };
        outcomes.push(GroupOutcome {
            index: group.index,
            offset: group.offset,
            items: group.len(),
            status,
        });
    }

    let report = RunReport {
        table,
        mode,
        outcomes,
    };
    info!(
        committed = report.committed_items(),
        unprocessed = report.unprocessed_items(),
        failed_groups = report.failed_groups(),
        "batch run complete"
    );
    report
}

async fn submit(group: &WriteGroup, store: &dyn KvStore) -> GroupStatus {
    match store.batch_write(group).await {
        Ok(output) if output.is_complete() => {
            debug!(batch = group.index, items = group.len(), "batch committed");
            GroupStatus::Committed
        }
        Ok(output) => {
            warn!(
                batch = group.index,
                unprocessed = output.unprocessed.len(),
                "batch left unprocessed items"
            );
            GroupStatus::Partial {
                unprocessed: match_unprocessed(group, output.unprocessed),
            }
        }
        Err(error) => {
            warn!(
                batch = group.index,
                offset = group.offset,
                code = error.code(),
                retryable = error.is_retryable(),
                "batch failed: {}",
                error.message()
            );
            GroupStatus::Failed { error }
        }
    }
}

/// Map each unprocessed request back to a distinct request of the group.
///
/// A group request is claimed at most once, so the result never outnumbers
/// the group. Requests that match nothing left in the group are dropped.
fn match_unprocessed(group: &WriteGroup, returned: Vec<WriteRequest>) -> Vec<UnprocessedItem> {
    let mut claimed = vec![false; group.requests.len()];
    let mut matched = Vec::with_capacity(returned.len().min(group.len()));
    for request in returned {
        let slot = group
            .requests
            .iter()
            .enumerate()
            .position(|(p, r)| !claimed[p] && *r == request);
        match slot {
            Some(p) => {
                claimed[p] = true;
                matched.push(UnprocessedItem {
                    index: group.offset + p,
                    request,
                });
            }
            None => warn!(
                batch = group.index,
                "store reported an unprocessed request that is not pending in the batch"
            ),
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{AttributeValue, Item};
    use crate::table::{TableDescription, TableSpec};
    use crate::store::BatchWriteOutput;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every call; replies from a script (default: all processed).
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(usize, usize)>>,
        replies: Mutex<VecDeque<Result<BatchWriteOutput, StoreError>>>,
    }

    impl RecordingStore {
        fn scripted(replies: Vec<Result<BatchWriteOutput, StoreError>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        fn calls(&self) -> Vec<(usize, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KvStore for RecordingStore {
        async fn batch_write(&self, group: &WriteGroup) -> Result<BatchWriteOutput, StoreError> {
            self.calls.lock().unwrap().push((group.index, group.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(BatchWriteOutput::all_processed()))
        }

        async fn create_table(&self, _spec: &TableSpec) -> Result<TableDescription, StoreError> {
            Err(StoreError::Other("unsupported".into()))
        }

        async fn delete_table(&self, _name: &str) -> Result<TableDescription, StoreError> {
            Err(StoreError::Other("unsupported".into()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn put(i: usize) -> WriteRequest {
        let mut item = Item::new();
        item.insert("RegionID".into(), AttributeValue::S(format!("R{i}")));
        item.insert("PartitionID".into(), AttributeValue::S("G02".into()));
        WriteRequest::Put { item }
    }

    fn groups(sizes: &[usize]) -> Vec<WriteGroup> {
        let mut offset = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(index, &n)| {
                let g = WriteGroup {
                    table: "census".into(),
                    index,
                    offset,
                    requests: (offset..offset + n).map(put).collect(),
                };
                offset += n;
                g
            })
            .collect()
    }

    #[tokio::test]
    async fn dry_run_never_calls_store() {
        let store = RecordingStore::default();
        let report = execute(&groups(&[25, 25, 3]), &store, ExecutionMode::DryRun).await;

        assert!(store.calls().is_empty());
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes.iter().all(|o| o.status == GroupStatus::DryRun));
        assert_eq!(report.committed_items(), 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn live_calls_once_per_group_in_order() {
        let store = RecordingStore::default();
        let report = execute(&groups(&[25, 1]), &store, ExecutionMode::Live).await;

        assert_eq!(store.calls(), vec![(0, 25), (1, 1)]);
        assert_eq!(report.committed_items(), 26);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn store_error_is_recorded_and_run_continues() {
        let store = RecordingStore::scripted(vec![
            Err(StoreError::ProvisionedThroughputExceeded("throttled".into())),
            Ok(BatchWriteOutput::all_processed()),
        ]);
        let report = execute(&groups(&[25, 25]), &store, ExecutionMode::Live).await;

        assert_eq!(store.calls().len(), 2);
        assert_eq!(report.failed_groups(), 1);
        assert_eq!(report.committed_items(), 25);
        match &report.outcomes[0].status {
            GroupStatus::Failed { error } => {
                assert_eq!(error.code(), "ProvisionedThroughputExceededException")
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(report.to_string().contains("ProvisionedThroughputExceededException"));
    }

    #[tokio::test]
    async fn unprocessed_items_are_reported_not_resubmitted() {
        let gs = groups(&[25, 5]);
        let leftover = vec![gs[1].requests[3].clone(), gs[1].requests[4].clone()];
        let store = RecordingStore::scripted(vec![
            Ok(BatchWriteOutput::all_processed()),
            Ok(BatchWriteOutput {
                unprocessed: leftover,
            }),
        ]);
        let report = execute(&gs, &store, ExecutionMode::Live).await;

        assert_eq!(store.calls().len(), 2);
        assert_eq!(report.unprocessed_items(), 2);
        assert_eq!(report.committed_items(), 28);

        let attention: Vec<&GroupOutcome> = report.attention().collect();
        assert_eq!(attention.len(), 1);
        match &attention[0].status {
            GroupStatus::Partial { unprocessed } => {
                let idx: Vec<usize> = unprocessed.iter().map(|u| u.index).collect();
                assert_eq!(idx, vec![28, 29]);
            }
            other => panic!("expected partial, got {other:?}"),
        }
        assert!(attention[0].to_string().contains("#28, #29"));
    }

    #[tokio::test]
    async fn over_reported_unprocessed_items_are_clamped_to_the_group() {
        let gs = groups(&[1, 2]);
        let mut stray = gs[0].requests[0].clone();
        if let WriteRequest::Put { item } = &mut stray {
            item.insert("RegionID".into(), AttributeValue::S("elsewhere".into()));
        }
        let store = RecordingStore::scripted(vec![
            Ok(BatchWriteOutput {
                unprocessed: vec![gs[0].requests[0].clone(), gs[0].requests[0].clone()],
            }),
            Ok(BatchWriteOutput {
                unprocessed: vec![stray, gs[1].requests[1].clone()],
            }),
        ]);
        let report = execute(&gs, &store, ExecutionMode::Live).await;

        assert_eq!(report.outcomes[0].committed(), 0);
        assert_eq!(report.outcomes[1].committed(), 1);
        assert_eq!(report.unprocessed_items(), 2);
        assert_eq!(report.committed_items(), 1);
        match &report.outcomes[0].status {
            GroupStatus::Partial { unprocessed } => {
                let idx: Vec<usize> = unprocessed.iter().map(|u| u.index).collect();
                assert_eq!(idx, vec![0]);
            }
            other => panic!("expected partial, got {other:?}"),
        }
        let text = report.to_string();
        assert!(text.contains("#0"));
        assert!(text.contains("#2"));
    }

    #[test]
    fn committed_never_underflows() {
        let outcome = GroupOutcome {
            index: 0,
            offset: 0,
            items: 1,
            status: GroupStatus::Partial {
                unprocessed: vec![
                    UnprocessedItem { index: 0, request: put(0) },
                    UnprocessedItem { index: 0, request: put(0) },
                ],
            },
        };
        assert_eq!(outcome.committed(), 0);
    }

    #[tokio::test]
    async fn empty_run() {
        let store = RecordingStore::default();
        let report = execute(&[], &store, ExecutionMode::Live).await;
        assert!(store.calls().is_empty());
        assert_eq!(report.total_items(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn mode_defaults_to_dry_run() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::DryRun);
        assert_eq!(ExecutionMode::confirmed(false), ExecutionMode::DryRun);
        assert_eq!(ExecutionMode::confirmed(true), ExecutionMode::Live);
    }
}
