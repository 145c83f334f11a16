//! Redundancy kernels: parity XOR in two addressing flavours and the Q syndrome.


use reed_solomon_erasure::galois_8;

use crate::layout::{PhysDiskAddr, UnitGeometry};

/// XorKernel selects how a source extent is placed into the result buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum XorKernel {
    /// Sources are aligned with the result: XOR from buffer offset 0.
    Simple,
    /// Sources are placed by their offset within the stripe unit, relative to
    /// the result extent.
    Regular,
}

impl XorKernel {
    #[must_use]
    /// `for_small_write` picks the kernel of a read-modify-write graph.
    ///
    /// The simple kernel is only correct when every source starts where its
    /// result starts: a split parity region (each parity node sees the data
    /// extent that lines up with it) or a single data unit accessed for less
    /// than a full stripe unit.
    pub const fn for_small_write(
        num_parity_nodes: usize,
        num_data_nodes: usize,
        sectors_accessed: u64,
        sectors_per_su: u64,
    ) -> Self {
        if num_parity_nodes == 2 || (num_data_nodes == 1 && sectors_accessed < sectors_per_su) {
            Self::Simple
        } else {
            Self::Regular
        }
    }

    /// Returns the byte ranges `(src_off, dst_off, len)` a source contributes to
    /// the result, or `None` when it does not overlap the result extent.
    fn placement(
        self,
        geom: UnitGeometry,
        src: &PhysDiskAddr,
        src_len: usize,
        dest: &PhysDiskAddr,
        dst_len: usize,
    ) -> Option<(usize, usize, usize)> {
        let (s0, s1) = src.su_range(geom);
        let (d0, d1) = dest.su_range(geom);
        let lo = s0.max(d0);
        let hi = s1.min(d1);
        if lo >= hi {
            return None;
        }
        match self {
            Self::Simple => Some((0, 0, src_len.min(dst_len))),
            Self::Regular => {
                let bps = geom.bytes_per_sector;
                let src_off = (lo - s0) as usize * bps;
                let dst_off = (lo - d0) as usize * bps;
                let len = ((hi - lo) as usize * bps)
                    .min(src_len.saturating_sub(src_off))
                    .min(dst_len.saturating_sub(dst_off));
                Some((src_off, dst_off, len))
            }
        }
    }

    /// `xor_into` folds one source into the parity result.
    pub fn xor_into(
        self,
        geom: UnitGeometry,
        src_pda: &PhysDiskAddr,
        src: &[u8],
        dest: &PhysDiskAddr,
        target: &mut [u8],
    ) {
        if let Some((s, d, len)) = self.placement(geom, src_pda, src.len(), dest, target.len()) {
            for (t, b) in target[d..d + len].iter_mut().zip(&src[s..s + len]) {
                *t ^= *b;
            }
        }
    }

    /// `q_into` folds one data source into the Q result, weighted by the
    /// generator (2) raised to the source's data unit in GF(2^8) over 0x11d.
    pub fn q_into(
        self,
        geom: UnitGeometry,
        src_pda: &PhysDiskAddr,
        src: &[u8],
        dest: &PhysDiskAddr,
        target: &mut [u8],
    ) {
        let coeff = galois_8::exp(2, src_pda.unit);
        if let Some((s, d, len)) = self.placement(geom, src_pda, src.len(), dest, target.len()) {
            galois_8::mul_slice_xor(coeff, &src[s..s + len], &mut target[d..d + len]);
        }
    }
}
