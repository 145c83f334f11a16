//! Error types for DAG construction and execution.

use thiserror::Error;

use crate::dag::NodeId;
use crate::layout::PhysDiskAddr;

/// Result type alias for build-time operations.
pub type Result<T> = std::result::Result<T, DagError>;

/// Errors raised while mapping an access or building its graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    /// The per-DAG arena could not satisfy an allocation.
    #[error("arena exhausted: requested {requested} bytes with {allocated} already allocated")]
    OutOfMemory { requested: usize, allocated: usize },

    /// A node was linked a different number of times than it declared.
    #[error("node {name} ({node}) declared {declared} {direction} edges but {linked} were linked")]
    EdgeCount {
        node: NodeId,
        name: &'static str,
        direction: &'static str,
        declared: usize,
        linked: usize,
    },

    /// The graph violates a structural rule (commit placement, cycles, edge symmetry).
    #[error("invalid DAG: {0}")]
    Invalid(String),

    /// The stripe geometry cannot describe a supported array.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// The stripe map does not fit the requested builder.
    #[error("invalid access: {0}")]
    InvalidAccess(String),

    /// More units failed than the redundancy degree tolerates.
    #[error("access touches {failed} failed units but only {tolerated} can be tolerated")]
    TooManyFailures { failed: usize, tolerated: usize },

    /// The access needs a graph shape this crate does not build.
    #[error("unsupported write: {0}")]
    Unsupported(&'static str),
}

/// Errors reported by a disk I/O primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("disk {col} has failed")]
    DiskFailed { col: usize },

    #[error("disk {col}: sectors {start}..{end} are out of range")]
    OutOfRange { col: usize, start: u64, end: u64 },

    #[error("disk {col}: injected {op} failure")]
    Injected { col: usize, op: &'static str },

    #[error("disk {col}: unlock without a held lock")]
    NotLocked { col: usize },
}

/// Terminal failures of a DAG execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// A node failed before the commit point; completed work was undone.
    #[error("{name} ({node}) failed before commit, write rolled back: {source}")]
    RolledBack {
        node: NodeId,
        name: &'static str,
        #[source]
        source: IoError,
    },

    /// A node failed after the commit point and kept failing.
    ///
    /// `held_locks` lists the extents whose queue lock was taken by a locking
    /// read and never released. The caller owns those holds and releases them
    /// through `DiskIo::unlock`.
    #[error("{name} ({node}) failed {attempts} times after commit: {source}")]
    RetriesExhausted {
        node: NodeId,
        name: &'static str,
        attempts: u32,
        held_locks: Vec<PhysDiskAddr>,
        #[source]
        source: IoError,
    },

    /// The DAG has already been handed to an engine.
    #[error("DAG {0} has already been executed")]
    AlreadyExecuted(&'static str),

    /// Some nodes never became ready.
    #[error("execution stalled after {fired} of {total} nodes")]
    Stalled { fired: usize, total: usize },
}
