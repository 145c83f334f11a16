use crate::dag::{IoParam, NORMAL_PRIORITY};
use crate::engine::DiskIo;
use crate::error::IoError;
use crate::kernels::XorKernel;
use crate::layout::{PhysDiskAddr, RaidLayout, RaidLevel};

/// `verify_stripe` recomputes the redundancy of one stripe from its data
/// units and compares it with what is on disk.
///
/// # Returns
/// Columns whose parity, Q or mirror copy disagrees with the data. Empty when
/// the stripe is consistent.
///
/// # Errors
/// Returns the first `IoError` hit while reading a column.
pub fn verify_stripe<D: DiskIo + ?Sized>(
    io: &mut D,
    layout: &RaidLayout,
    stripe: u64,
) -> Result<Vec<usize>, IoError> {
    let geom = layout.unit_geometry();
    let base = layout.disk_sector(stripe);
    let spu = layout.sectors_per_su();
    let full_unit = |col: usize, unit: usize| PhysDiskAddr::new(col, unit, base, spu);

    if layout.level() == RaidLevel::Raid1 {
        let data = read_unit(io, layout, &full_unit(layout.data_col(stripe, 0), 0), stripe)?;
        let mirror_col = layout.parity_col(stripe);
        let mirror = read_unit(io, layout, &full_unit(mirror_col, 0), stripe)?;
        return Ok(if data == mirror { Vec::new() } else { vec![mirror_col] });
    }

    let p_pda = full_unit(layout.parity_col(stripe), 0);
    let mut p = vec![0u8; layout.su_bytes()];
    let mut q = vec![0u8; layout.su_bytes()];
    for u in 0..layout.num_data_col() {
        let pda = full_unit(layout.data_col(stripe, u), u);
        let data = read_unit(io, layout, &pda, stripe)?;
        XorKernel::Regular.xor_into(geom, &pda, &data, &p_pda, &mut p);
        XorKernel::Regular.q_into(geom, &pda, &data, &p_pda, &mut q);
    }

    let mut mismatched = Vec::new();
    if read_unit(io, layout, &p_pda, stripe)? != p {
        mismatched.push(p_pda.col);
    }
    if let Some(q_col) = layout.q_col(stripe) {
        if read_unit(io, layout, &full_unit(q_col, 0), stripe)? != q {
            mismatched.push(q_col);
        }
    }
    Ok(mismatched)
}

fn read_unit<D: DiskIo + ?Sized>(
    io: &mut D,
    layout: &RaidLayout,
    pda: &PhysDiskAddr,
    stripe: u64,
) -> Result<Vec<u8>, IoError> {
    let mut buf = vec![0u8; layout.su_bytes()];
    io.read(pda, &mut buf, stripe, IoParam::new(NORMAL_PRIORITY, false, false, 0))?;
    Ok(buf)
}
