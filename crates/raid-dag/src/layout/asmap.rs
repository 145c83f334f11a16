use crate::layout::PhysDiskAddr;

/// AccessStripeMap is the physical footprint of one logical write on one stripe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessStripeMap {
    pub stripe_id: u64,
    /// First logical sector of the access.
    pub raid_address: u64,
    pub total_sectors_accessed: u64,
    pub num_stripe_units_accessed: usize,
    /// One extent per touched data unit, in logical order.
    pub data: Vec<PhysDiskAddr>,
    /// Parity extents (mirror copies for RAID1); two entries when the range wraps.
    pub parity: Vec<PhysDiskAddr>,
    /// Q extents, parallel to `parity`. Empty unless the level keeps Q.
    pub q: Vec<PhysDiskAddr>,
    pub num_data_failed: usize,
    pub num_parity_failed: usize,
    pub num_q_failed: usize,
    /// Failed columns among the touched extents.
    pub failed_cols: Vec<usize>,
}

impl AccessStripeMap {
    #[must_use]
    pub fn num_failed(&self) -> usize {
        self.num_data_failed + self.num_parity_failed + self.num_q_failed
    }

    #[must_use]
    pub fn is_failed(&self, col: usize) -> bool {
        self.failed_cols.contains(&col)
    }

    #[must_use]
    /// `parity_spans_two_extents` reports whether the parity region is split.
    pub fn parity_spans_two_extents(&self) -> bool {
        self.parity.len() > 1
    }
}
