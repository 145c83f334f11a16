//! Stripe geometry, physical extents and access stripe maps.

mod asmap;
mod mapper;
mod pda;

pub use asmap::AccessStripeMap;
pub use mapper::{map_access, unaccessed_portion};
pub use pda::PhysDiskAddr;

use crate::error::{DagError, Result};

/// RaidLevel selects the redundancy scheme of an array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RaidLevel {
    /// Two-way mirror.
    Raid1,
    /// Rotating single parity.
    Raid5,
    /// Rotating P + Q.
    Raid6,
}

impl RaidLevel {
    #[must_use]
    /// `nfaults` returns how many simultaneous unit failures the level survives.
    pub const fn nfaults(self) -> usize {
        match self {
            Self::Raid1 | Self::Raid5 => 1,
            Self::Raid6 => 2,
        }
    }

    #[must_use]
    /// `redundancy_cols` returns the number of non-data columns in each stripe.
    pub const fn redundancy_cols(self) -> usize {
        match self {
            Self::Raid1 | Self::Raid5 => 1,
            Self::Raid6 => 2,
        }
    }

    const fn min_cols(self) -> usize {
        match self {
            Self::Raid1 => 2,
            Self::Raid5 => 3,
            Self::Raid6 => 4,
        }
    }
}

/// RaidLayout describes the stripe geometry of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaidLayout {
    level: RaidLevel,
    num_cols: usize,
    sectors_per_su: u64,
    bytes_per_sector: usize,
}

impl RaidLayout {
    /// `new` validates and returns a stripe geometry.
    ///
    /// # Arguments
    /// * `level` - The redundancy scheme.
    /// * `num_cols` - Number of disks in the array.
    /// * `sectors_per_su` - Sectors in one stripe unit.
    /// * `bytes_per_sector` - Bytes in one sector.
    ///
    /// # Errors
    /// Returns `DagError::InvalidLayout` when the column count does not fit the
    /// level or a size is zero.
    pub fn new(
        level: RaidLevel,
        num_cols: usize,
        sectors_per_su: u64,
        bytes_per_sector: usize,
    ) -> Result<Self> {
        if level == RaidLevel::Raid1 && num_cols != 2 {
            return Err(DagError::InvalidLayout(format!(
                "RAID1 mirrors across exactly 2 disks, got {num_cols}"
            )));
        }
        if num_cols < level.min_cols() {
            return Err(DagError::InvalidLayout(format!(
                "{level:?} needs at least {} disks, got {num_cols}",
                level.min_cols()
            )));
        }
        if sectors_per_su == 0 || bytes_per_sector == 0 {
            return Err(DagError::InvalidLayout(
                "stripe unit and sector sizes must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            level,
            num_cols,
            sectors_per_su,
            bytes_per_sector,
        })
    }

    #[must_use]
    pub const fn level(&self) -> RaidLevel {
        self.level
    }

    #[must_use]
    pub const fn num_cols(&self) -> usize {
        self.num_cols
    }

    #[must_use]
    pub const fn num_data_col(&self) -> usize {
        self.num_cols - self.level.redundancy_cols()
    }

    #[must_use]
    pub const fn sectors_per_su(&self) -> u64 {
        self.sectors_per_su
    }

    #[must_use]
    pub const fn bytes_per_sector(&self) -> usize {
        self.bytes_per_sector
    }

    #[must_use]
    pub const fn sectors_per_stripe(&self) -> u64 {
        self.num_data_col() as u64 * self.sectors_per_su
    }

    #[must_use]
    /// `bytes` converts a sector count to bytes.
    pub const fn bytes(&self, sectors: u64) -> usize {
        sectors as usize * self.bytes_per_sector
    }

    #[must_use]
    pub const fn su_bytes(&self) -> usize {
        self.bytes(self.sectors_per_su)
    }

    #[must_use]
    /// `parity_col` returns the disk holding parity (or the mirror copy) for a stripe.
    pub const fn parity_col(&self, stripe: u64) -> usize {
        match self.level {
            RaidLevel::Raid1 => 1,
            RaidLevel::Raid5 | RaidLevel::Raid6 => {
                self.num_cols - 1 - (stripe % self.num_cols as u64) as usize
            }
        }
    }

    #[must_use]
    /// `q_col` returns the disk holding Q for a stripe, if the level has one.
    pub const fn q_col(&self, stripe: u64) -> Option<usize> {
        match self.level {
            RaidLevel::Raid6 => Some((self.parity_col(stripe) + 1) % self.num_cols),
            RaidLevel::Raid1 | RaidLevel::Raid5 => None,
        }
    }

    #[must_use]
    /// `data_col` returns the disk holding data unit `unit` of a stripe.
    pub const fn data_col(&self, stripe: u64, unit: usize) -> usize {
        match self.level {
            RaidLevel::Raid1 => 0,
            RaidLevel::Raid5 | RaidLevel::Raid6 => {
                (self.parity_col(stripe) + self.level.redundancy_cols() + unit) % self.num_cols
            }
        }
    }

    #[must_use]
    /// `disk_sector` returns the first disk sector of a stripe on any column.
    pub const fn disk_sector(&self, stripe: u64) -> u64 {
        stripe * self.sectors_per_su
    }

    #[must_use]
    /// `unit_geometry` returns the sizes redundancy kernels need.
    pub const fn unit_geometry(&self) -> UnitGeometry {
        UnitGeometry {
            sectors_per_su: self.sectors_per_su,
            bytes_per_sector: self.bytes_per_sector,
        }
    }
}

/// UnitGeometry is the slice of a layout redundancy kernels depend on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnitGeometry {
    pub sectors_per_su: u64,
    pub bytes_per_sector: usize,
}
