use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IoOpType {
    Read,
    Write,
    Unlock,
}

impl IoOpType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Unlock => "unlock",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DiskOp {
    pub col: usize,
    pub op: IoOpType,
    pub bytes: u64,
    pub latency_seconds: f64,
    pub error: bool,
}

/// How a DAG execution ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DagOutcome {
    Completed,
    RolledBack,
    RetriesExhausted,
    Rejected,
}

#[derive(Clone, Debug)]
pub struct DagRecord {
    pub creator: &'static str,
    pub outcome: DagOutcome,
    pub nodes_fired: usize,
    pub retries: usize,
    pub latency_seconds: f64,
}

/// MetricsSink receives execution telemetry. A sink is handed to each
/// `Engine` that should report to it.
pub trait MetricsSink: Send + Sync + 'static {
    fn record_disk_op(&self, op: DiskOp);
    fn record_dag(&self, record: DagRecord);
}

/// Per-column operation totals.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OpTotals {
    pub ops: u64,
    pub bytes: u64,
    pub errors: u64,
}

/// OpCounter aggregates disk operations per (column, op) and counts DAG outcomes.
#[derive(Debug, Default)]
pub struct OpCounter {
    disk: Mutex<BTreeMap<(usize, IoOpType), OpTotals>>,
    dags: Mutex<Vec<(&'static str, DagOutcome)>>,
}

impl OpCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn disk_totals(&self) -> BTreeMap<(usize, IoOpType), OpTotals> {
        self.disk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn dag_outcomes(&self) -> Vec<(&'static str, DagOutcome)> {
        self.dags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MetricsSink for OpCounter {
    fn record_disk_op(&self, op: DiskOp) {
        let mut disk = self
            .disk
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = disk.entry((op.col, op.op)).or_default();
        entry.ops += 1;
        entry.bytes += op.bytes;
        entry.errors += u64::from(op.error);
    }

    fn record_dag(&self, record: DagRecord) {
        self.dags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.creator, record.outcome));
    }
}
