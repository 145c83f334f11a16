use std::fmt;

use crate::layout::UnitGeometry;

/// PhysDiskAddr names a contiguous sector extent on one disk.
///
/// Multi-extent regions (a parity range that wraps around its stripe unit) are
/// carried as a list of extents on the stripe map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhysDiskAddr {
    /// Disk (column) index.
    pub col: usize,
    /// Data unit index within the stripe; 0 for parity and Q extents.
    pub unit: usize,
    /// First disk sector.
    pub start_sector: u64,
    /// Extent length in sectors.
    pub num_sector: u64,
}

impl PhysDiskAddr {
    #[must_use]
    pub const fn new(col: usize, unit: usize, start_sector: u64, num_sector: u64) -> Self {
        Self {
            col,
            unit,
            start_sector,
            num_sector,
        }
    }

    #[must_use]
    pub const fn end_sector(&self) -> u64 {
        self.start_sector + self.num_sector
    }

    #[must_use]
    /// `su_range` returns the extent as a half-open sector range relative to its stripe unit.
    pub const fn su_range(&self, geom: UnitGeometry) -> (u64, u64) {
        let start = self.start_sector % geom.sectors_per_su;
        (start, start + self.num_sector)
    }

    #[must_use]
    pub const fn byte_len(&self, geom: UnitGeometry) -> usize {
        self.num_sector as usize * geom.bytes_per_sector
    }

    #[must_use]
    pub const fn is_full_unit(&self, geom: UnitGeometry) -> bool {
        self.num_sector == geom.sectors_per_su
    }
}

impl fmt::Display for PhysDiskAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "c{}[{}..{})",
            self.col,
            self.start_sector,
            self.end_sector()
        )
    }
}
