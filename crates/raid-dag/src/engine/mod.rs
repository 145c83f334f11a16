//! Reference execution engine for write graphs.
//!
//! The engine fires nodes from a ready queue in dependency order. Every edge
//! type, `antiData` included, holds the downstream node back until the
//! upstream node is `Done`. A failure before the commit point undoes all
//! completed work; a failure after it (or anywhere in a forward-only graph) is
//! retried in place.


use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{trace, warn};

use crate::config::RetryPolicy;
use crate::dag::{Action, Arena, BufferId, Dag, IoParam, NodeId, NodeStatus, Source, Undo};
use crate::error::{ExecError, IoError};
use crate::kernels::XorKernel;
use crate::layout::{PhysDiskAddr, UnitGeometry};
use crate::metrics::{DagOutcome, DagRecord, DiskOp, IoOpType, MetricsSink};

/// DiskIo is the disk primitive set a graph executes against.
pub trait DiskIo {
    /// Fills `buf` from the extent. A `param.lock` read also takes the
    /// column's queue lock.
    ///
    /// # Errors
    /// Returns an `IoError` if the disk is unavailable or the extent is out of range.
    fn read(
        &mut self,
        pda: &PhysDiskAddr,
        buf: &mut [u8],
        stripe: u64,
        param: IoParam,
    ) -> Result<(), IoError>;

    /// Persists `buf` to the extent.
    ///
    /// # Errors
    /// Returns an `IoError` if the disk is unavailable or the extent is out of range.
    fn write(
        &mut self,
        pda: &PhysDiskAddr,
        buf: &[u8],
        stripe: u64,
        param: IoParam,
    ) -> Result<(), IoError>;

    /// Releases the queue lock of the extent's column.
    ///
    /// # Errors
    /// Returns `IoError::NotLocked` if no lock is held.
    fn unlock(&mut self, pda: &PhysDiskAddr, param: IoParam) -> Result<(), IoError>;
}

/// Outcome summarizes a successful execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Nodes that reached `Done`.
    pub fired: usize,
    /// Extra attempts spent on nodes that failed and were re-fired.
    pub retries: usize,
    /// Whether the graph passed a commit point.
    pub committed: bool,
}

pub struct Engine<'io, D: DiskIo + ?Sized> {
    io: &'io mut D,
    retry: RetryPolicy,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl<'io, D: DiskIo + ?Sized> Engine<'io, D> {
    #[must_use]
    pub fn new(io: &'io mut D, retry: RetryPolicy) -> Self {
        Self {
            io,
            retry,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// `execute` runs a freshly built graph to completion.
    ///
    /// # Errors
    /// - `ExecError::RolledBack` when a node failed before the commit point;
    ///   every completed node has been undone.
    /// - `ExecError::RetriesExhausted` when a node kept failing after the
    ///   commit point, or anywhere in a forward-only graph. Nothing is undone,
    ///   and queue locks whose Unlock node never ran are handed back to the
    ///   caller in `held_locks`.
    /// - `ExecError::AlreadyExecuted` if any node has left `NotFired`.
    /// - `ExecError::Stalled` if some node never became ready.
    pub fn execute(&mut self, dag: &mut Dag) -> Result<Outcome, ExecError> {
        let start = Instant::now();
        let mut progress = Progress::default();
        let result = self.run(dag, &mut progress);

        if let Some(sink) = &self.metrics {
            let outcome = match &result {
                Ok(_) => DagOutcome::Completed,
                Err(ExecError::RolledBack { .. }) => DagOutcome::RolledBack,
                Err(ExecError::RetriesExhausted { .. }) => DagOutcome::RetriesExhausted,
                Err(ExecError::AlreadyExecuted(_) | ExecError::Stalled { .. }) => {
                    DagOutcome::Rejected
                }
            };
            sink.record_dag(DagRecord {
                creator: dag.creator(),
                outcome,
                nodes_fired: progress.completed.len(),
                retries: progress.retries,
                latency_seconds: start.elapsed().as_secs_f64(),
            });
        }
        result
    }

    fn run(&mut self, dag: &mut Dag, progress: &mut Progress) -> Result<Outcome, ExecError> {
        if dag.nodes().any(|(_, n)| n.status != NodeStatus::NotFired) {
            return Err(ExecError::AlreadyExecuted(dag.creator()));
        }

        let mut pending: Vec<usize> = dag.nodes().map(|(_, n)| n.antecedents().len()).collect();
        let mut ready: VecDeque<NodeId> = dag.roots().iter().copied().collect();

        while let Some(id) = ready.pop_front() {
            dag.set_status(id, NodeStatus::Fired);
            if dag.trace_enabled() {
                let node = dag.node(id);
                trace!(node = %id, name = node.name, action = node.action.tag(), "firing");
            }

            let mut attempts = 1;
            while let Err(source) = self.fire(dag, id) {
                let name = dag.node(id).name;
                if dag.num_commits() < dag.num_commit_nodes() {
                    dag.set_status(id, NodeStatus::Failed);
                    warn!(
                        creator = dag.creator(),
                        node = %id,
                        name,
                        error = %source,
                        undo = progress.completed.len(),
                        "failure before commit, rolling back"
                    );
                    self.roll_back(dag, &progress.completed);
                    return Err(ExecError::RolledBack {
                        node: id,
                        name,
                        source,
                    });
                }
                if attempts >= self.retry.max_attempts {
                    dag.set_status(id, NodeStatus::Failed);
                    return Err(ExecError::RetriesExhausted {
                        node: id,
                        name,
                        attempts,
                        held_locks: held_locks(dag),
                        source,
                    });
                }
                warn!(
                    creator = dag.creator(),
                    node = %id,
                    name,
                    attempt = attempts,
                    error = %source,
                    "node failed, retrying"
                );
                attempts += 1;
                progress.retries += 1;
            }

            dag.set_status(id, NodeStatus::Done);
            if dag.node(id).commit {
                dag.record_commit();
            }
            progress.completed.push(id);

            for &succ in dag.node(id).succedents() {
                pending[succ.0] -= 1;
                if pending[succ.0] == 0 {
                    ready.push_back(succ);
                }
            }
        }

        if progress.completed.len() != dag.len() {
            return Err(ExecError::Stalled {
                fired: progress.completed.len(),
                total: dag.len(),
            });
        }
        Ok(Outcome {
            fired: progress.completed.len(),
            retries: progress.retries,
            committed: dag.num_commits() > 0,
        })
    }

    /// Runs the forward action of one node.
    fn fire(&mut self, dag: &mut Dag, id: NodeId) -> Result<(), IoError> {
        let (nodes, arena) = dag.split_mut();
        match &nodes[id.0].action {
            Action::Read {
                pda,
                buf,
                stripe,
                param,
            } => {
                let started = Instant::now();
                let buf = arena.get_mut(*buf);
                let res = self.io.read(pda, buf, *stripe, *param);
                self.record(pda, IoOpType::Read, buf.len(), started, res.is_err());
                res
            }
            Action::Write {
                pda,
                buf,
                stripe,
                param,
            } => {
                let started = Instant::now();
                let buf = arena.get(*buf);
                let res = self.io.write(pda, buf, *stripe, *param);
                self.record(pda, IoOpType::Write, buf.len(), started, res.is_err());
                res
            }
            Action::Unlock { pda, param } => self.unlock(pda, *param),
            Action::Xor {
                kernel,
                geometry,
                sources,
                dest,
                result,
                q_result,
            } => {
                // P may overwrite a source buffer in place, so Q goes first.
                if let Some(q) = q_result {
                    fold(arena, *kernel, *geometry, sources, dest, *q, Fold::Q);
                }
                fold(arena, *kernel, *geometry, sources, dest, *result, Fold::P);
                Ok(())
            }
            Action::QCompute {
                kernel,
                geometry,
                sources,
                dest,
                result,
            } => {
                fold(arena, *kernel, *geometry, sources, dest, *result, Fold::Q);
                Ok(())
            }
            Action::Sync | Action::Terminate => Ok(()),
        }
    }

    fn unlock(&mut self, pda: &PhysDiskAddr, param: IoParam) -> Result<(), IoError> {
        let started = Instant::now();
        let res = self.io.unlock(pda, param);
        self.record(pda, IoOpType::Unlock, 0, started, res.is_err());
        res
    }

    /// Undoes completed nodes, most recent first.
    fn roll_back(&mut self, dag: &mut Dag, completed: &[NodeId]) {
        for &id in completed.iter().rev() {
            if let Undo::Unlock { pda, param } = dag.node(id).undo.clone() {
                if let Err(err) = self.unlock(&pda, param) {
                    warn!(node = %id, error = %err, "undo failed");
                }
            }
            dag.set_status(id, NodeStatus::Undone);
        }
    }

    fn record(&self, pda: &PhysDiskAddr, op: IoOpType, bytes: usize, started: Instant, error: bool) {
        if let Some(sink) = &self.metrics {
            sink.record_disk_op(DiskOp {
                col: pda.col,
                op,
                bytes: bytes as u64,
                latency_seconds: started.elapsed().as_secs_f64(),
                error,
            });
        }
    }
}

/// Extents whose queue lock a completed read took and no completed Unlock or
/// unlocking write has released yet.
fn held_locks(dag: &Dag) -> Vec<PhysDiskAddr> {
    let mut released: BTreeMap<usize, usize> = BTreeMap::new();
    let mut taken = Vec::new();
    for (_, node) in dag.nodes().filter(|(_, n)| n.status == NodeStatus::Done) {
        match &node.action {
            Action::Read { pda, param, .. } if param.lock => taken.push(pda),
            Action::Write { pda, param, .. } if param.unlock => {
                *released.entry(pda.col).or_default() += 1;
            }
            Action::Unlock { pda, .. } => *released.entry(pda.col).or_default() += 1,
            _ => {}
        }
    }
    taken
        .into_iter()
        .filter(|pda| match released.get_mut(&pda.col) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

#[derive(Default)]
struct Progress {
    completed: Vec<NodeId>,
    retries: usize,
}

#[derive(Copy, Clone)]
enum Fold {
    P,
    Q,
}

/// Folds every source into `result`. When `result` is itself one of the
/// sources its current contents are the starting value; otherwise the fold
/// starts from zero.
fn fold(
    arena: &mut Arena,
    kernel: XorKernel,
    geom: UnitGeometry,
    sources: &[Source],
    dest: &PhysDiskAddr,
    result: BufferId,
    how: Fold,
) {
    let mut target = arena.take(result);
    if !sources.iter().any(|s| s.buf == result) {
        target.fill(0);
    }
    for src in sources.iter().filter(|s| s.buf != result) {
        let data = arena.get(src.buf);
        match how {
            Fold::P => kernel.xor_into(geom, &src.pda, data, dest, &mut target),
            Fold::Q => kernel.q_into(geom, &src.pda, data, dest, &mut target),
        }
    }
    arena.restore(result, target);
}
