//! Reference stripe mapper: logical sector ranges to per-stripe physical extents.

use crate::error::{DagError, Result};
use crate::layout::{AccessStripeMap, PhysDiskAddr, RaidLayout, RaidLevel};

/// `map_access` splits a logical sector range into one stripe map per stripe touched.
///
/// # Arguments
/// * `layout` - Stripe geometry of the array.
/// * `raid_address` - First logical sector of the access.
/// * `num_sectors` - Length of the access in sectors.
/// * `failed_cols` - Disks currently marked failed.
///
/// # Errors
/// Returns `DagError::InvalidAccess` for an empty access or an unknown failed column.
pub fn map_access(
    layout: &RaidLayout,
    raid_address: u64,
    num_sectors: u64,
    failed_cols: &[usize],
) -> Result<Vec<AccessStripeMap>> {
    if num_sectors == 0 {
        return Err(DagError::InvalidAccess("access covers no sectors".to_string()));
    }
    if let Some(col) = failed_cols.iter().find(|&&c| c >= layout.num_cols()) {
        return Err(DagError::InvalidAccess(format!(
            "failed column {col} outside a {}-disk array",
            layout.num_cols()
        )));
    }

    let sps = layout.sectors_per_stripe();
    let mut maps = Vec::new();
    let mut addr = raid_address;
    let mut remaining = num_sectors;
    while remaining > 0 {
        let stripe = addr / sps;
        let n = remaining.min(sps - addr % sps);
        maps.push(map_stripe(layout, stripe, addr, n, failed_cols));
        addr += n;
        remaining -= n;
    }
    Ok(maps)
}

fn map_stripe(
    layout: &RaidLayout,
    stripe: u64,
    raid_address: u64,
    num_sectors: u64,
    failed_cols: &[usize],
) -> AccessStripeMap {
    let spu = layout.sectors_per_su();
    let base = layout.disk_sector(stripe);

    let mut data = Vec::new();
    let mut off = raid_address % layout.sectors_per_stripe();
    let mut remaining = num_sectors;
    while remaining > 0 {
        let unit = (off / spu) as usize;
        let unit_off = off % spu;
        let len = remaining.min(spu - unit_off);
        data.push(PhysDiskAddr::new(
            layout.data_col(stripe, unit),
            unit,
            base + unit_off,
            len,
        ));
        off += len;
        remaining -= len;
    }

    let ranges = redundancy_ranges(layout, &data);
    let extents = |col: usize| -> Vec<PhysDiskAddr> {
        ranges
            .iter()
            .map(|&(start, end)| PhysDiskAddr::new(col, 0, base + start, end - start))
            .collect()
    };
    let parity = extents(layout.parity_col(stripe));
    let q = layout.q_col(stripe).map(extents).unwrap_or_default();

    let is_failed = |col: usize| failed_cols.contains(&col);
    let num_data_failed = data.iter().filter(|pda| is_failed(pda.col)).count();
    let num_parity_failed = usize::from(is_failed(layout.parity_col(stripe)));
    let num_q_failed = layout
        .q_col(stripe)
        .map_or(0, |col| usize::from(is_failed(col)));

    let mut touched: Vec<usize> = data
        .iter()
        .chain(parity.iter())
        .chain(q.iter())
        .map(|pda| pda.col)
        .filter(|&col| is_failed(col))
        .collect();
    touched.sort_unstable();
    touched.dedup();

    AccessStripeMap {
        stripe_id: stripe,
        raid_address,
        total_sectors_accessed: num_sectors,
        num_stripe_units_accessed: data.len(),
        data,
        parity,
        q,
        num_data_failed,
        num_parity_failed,
        num_q_failed,
        failed_cols: touched,
    }
}

/// Unit-relative ranges the parity (or mirror) region must cover.
fn redundancy_ranges(layout: &RaidLayout, data: &[PhysDiskAddr]) -> Vec<(u64, u64)> {
    let geom = layout.unit_geometry();
    let spu = layout.sectors_per_su();
    match (layout.level(), data) {
        (RaidLevel::Raid1, _) => data.iter().map(|pda| pda.su_range(geom)).collect(),
        (_, [only]) => vec![only.su_range(geom)],
        (_, [first, last]) => {
            let (start, _) = first.su_range(geom);
            let (_, end) = last.su_range(geom);
            if end < start {
                vec![(start, spu), (0, end)]
            } else {
                vec![(0, spu)]
            }
        }
        _ => vec![(0, spu)],
    }
}

/// `unaccessed_portion` returns the extents of a stripe's data units that the
/// access does not cover, one entry per contiguous piece.
///
/// # Arguments
/// * `asmap` - The stripe map of the access.
/// * `layout` - Stripe geometry of the array.
///
/// # Returns
/// Extents ordered by data unit, then by offset within the unit.
#[must_use]
pub fn unaccessed_portion(asmap: &AccessStripeMap, layout: &RaidLayout) -> Vec<PhysDiskAddr> {
    let geom = layout.unit_geometry();
    let spu = layout.sectors_per_su();
    let base = layout.disk_sector(asmap.stripe_id);
    let mut out = Vec::new();
    for unit in 0..layout.num_data_col() {
        let col = layout.data_col(asmap.stripe_id, unit);
        let (start, end) = asmap
            .data
            .iter()
            .find(|pda| pda.unit == unit)
            .map_or((0, 0), |pda| pda.su_range(geom));
        if start == end {
            out.push(PhysDiskAddr::new(col, unit, base, spu));
            continue;
        }
        if start > 0 {
            out.push(PhysDiskAddr::new(col, unit, base, start));
        }
        if end < spu {
            out.push(PhysDiskAddr::new(col, unit, base + end, spu - end));
        }
    }
    out
}
