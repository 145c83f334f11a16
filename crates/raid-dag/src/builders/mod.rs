//! Write graph builders: large (full / partial stripe), small (read-modify-write)
//! and mirror writes, each with a rollback-capable and a forward-only variant.

mod large;
#[cfg(test)]
mod large_tests;
mod mirror;
mod small;

pub use large::create_large_write_dag;
pub use mirror::create_mirror_write_dag;
pub use small::create_small_write_dag;

use tracing::debug;

use crate::config::DagConfig;
use crate::dag::{BufferId, Dag, DagBuilder, IoParam, NORMAL_PRIORITY};
use crate::error::{DagError, Result};
use crate::layout::{AccessStripeMap, RaidLayout, RaidLevel};

/// Recovery selects whether a graph carries a commit point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Pre-commit failures are undone, post-commit failures are retried.
    Rollback,
    /// No commit point; hazards between reads and in-place writes are
    /// expressed as `antiData` edges and every failure is retried.
    ForwardOnly,
}

impl Recovery {
    #[must_use]
    pub const fn has_commit(self) -> bool {
        matches!(self, Self::Rollback)
    }

    /// Name of the node separating redundancy computation from the writes.
    const fn gate_name(self) -> &'static str {
        match self {
            Self::Rollback => "Commit",
            Self::ForwardOnly => "Sync",
        }
    }
}

/// FaultTolerance is the redundancy degree of a parity graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaultTolerance {
    /// Parity only.
    Single,
    /// Parity and Q.
    Double,
}

impl FaultTolerance {
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }

    /// `from_count` converts a fault count into a tolerance.
    ///
    /// # Errors
    /// Returns `DagError::InvalidAccess` for counts other than 1 or 2.
    pub fn from_count(nfaults: usize) -> Result<Self> {
        match nfaults {
            1 => Ok(Self::Single),
            2 => Ok(Self::Double),
            n => Err(DagError::InvalidAccess(format!(
                "fault tolerance must be 1 or 2, got {n}"
            ))),
        }
    }
}

/// WriteRequest bundles the stripe map, geometry and new data of one write.
#[derive(Copy, Clone, Debug)]
pub struct WriteRequest<'a> {
    pub asmap: &'a AccessStripeMap,
    pub layout: &'a RaidLayout,
    payload: Option<&'a [u8]>,
}

impl<'a> WriteRequest<'a> {
    #[must_use]
    pub const fn new(asmap: &'a AccessStripeMap, layout: &'a RaidLayout) -> Self {
        Self {
            asmap,
            layout,
            payload: None,
        }
    }

    #[must_use]
    /// `with_payload` attaches the new data, laid out in logical order. Without
    /// a payload the write buffers are zero-filled.
    pub const fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Copies the payload into one arena buffer per data extent.
    fn data_buffers(&self, b: &mut DagBuilder) -> Result<Vec<BufferId>> {
        let geom = self.layout.unit_geometry();
        let Some(payload) = self.payload else {
            return self
                .asmap
                .data
                .iter()
                .map(|pda| b.arena().alloc_zeroed(pda.byte_len(geom)))
                .collect();
        };

        let expected = self.layout.bytes(self.asmap.total_sectors_accessed);
        if payload.len() != expected {
            return Err(DagError::InvalidAccess(format!(
                "payload is {} bytes, access covers {expected}",
                payload.len()
            )));
        }
        let mut off = 0;
        let mut bufs = Vec::with_capacity(self.asmap.data.len());
        for pda in &self.asmap.data {
            let len = pda.byte_len(geom);
            let chunk = payload.get(off..off + len).ok_or_else(|| {
                DagError::InvalidAccess("data extents exceed the payload".to_string())
            })?;
            bufs.push(b.arena().alloc_from(chunk)?);
            off += len;
        }
        Ok(bufs)
    }
}

pub(crate) const fn io_param(lock: bool, unlock: bool, which_ru: usize) -> IoParam {
    IoParam::new(NORMAL_PRIORITY, lock, unlock, which_ru as u16)
}

/// `select_write_dag` picks and runs the builder suited to a stripe map.
///
/// RAID1 stripes get a mirror write. Parity stripes get a large write when the
/// access covers more than half of the data units and the parity region is a
/// single extent, otherwise a small write.
///
/// # Errors
/// Returns `DagError::TooManyFailures` when the access touches more failed units
/// than the level tolerates, `DagError::Unsupported` for degraded parity writes,
/// and any error of the chosen builder.
pub fn select_write_dag(
    req: &WriteRequest<'_>,
    cfg: &DagConfig,
    recovery: Recovery,
) -> Result<Dag> {
    let asmap = req.asmap;
    let layout = req.layout;
    let tolerated = layout.level().nfaults();
    if asmap.num_failed() > tolerated {
        return Err(DagError::TooManyFailures {
            failed: asmap.num_failed(),
            tolerated,
        });
    }

    if layout.level() == RaidLevel::Raid1 {
        return create_mirror_write_dag(req, cfg, recovery);
    }
    if asmap.num_failed() > 0 {
        return Err(DagError::Unsupported(
            "parity writes touching a failed unit need a degraded-mode graph",
        ));
    }

    let nfaults = FaultTolerance::from_count(tolerated)?;
    let units = asmap.num_stripe_units_accessed;
    let data_cols = layout.num_data_col();
    let large = !asmap.parity_spans_two_extents() && (units == data_cols || units * 2 > data_cols);
    if cfg.trace_enabled {
        debug!(
            stripe = asmap.stripe_id,
            units,
            data_cols,
            large,
            ?recovery,
            "selecting write graph"
        );
    }
    if large {
        create_large_write_dag(req, cfg, nfaults, recovery)
    } else {
        create_small_write_dag(req, cfg, nfaults, recovery)
    }
}

/// Checks the parity and Q extents of a stripe map against a fault count.
fn redundancy_extents(asmap: &AccessStripeMap, nfaults: FaultTolerance) -> Result<usize> {
    let n = asmap.parity.len();
    if n == 0 || n > 2 {
        return Err(DagError::InvalidAccess(format!(
            "parity region must have 1 or 2 extents, got {n}"
        )));
    }
    if nfaults == FaultTolerance::Double && asmap.q.len() != n {
        return Err(DagError::InvalidAccess(format!(
            "Q region has {} extents, parity has {n}",
            asmap.q.len()
        )));
    }
    if asmap.data.is_empty() {
        return Err(DagError::InvalidAccess("no data extents".to_string()));
    }
    Ok(n)
}
