//! Disk backends a write graph can execute against, plus a stripe scrubber.

pub mod array;
pub mod disk;
mod locks;
pub mod memory;
mod scrub;

pub use array::FileArray;
pub use disk::FileDisk;
pub use memory::MemArray;
pub use scrub::verify_stripe;

use crate::error::IoError;
use crate::layout::PhysDiskAddr;

/// Byte offset of an extent on its column, checked against the disk length.
fn byte_offset(
    pda: &PhysDiskAddr,
    bytes_per_sector: usize,
    len: usize,
    disk_len: u64,
) -> Result<u64, IoError> {
    let out_of_range = IoError::OutOfRange {
        col: pda.col,
        start: pda.start_sector,
        end: pda.end_sector(),
    };
    let off = pda
        .start_sector
        .checked_mul(bytes_per_sector as u64)
        .ok_or_else(|| out_of_range.clone())?;
    match off.checked_add(len as u64) {
        Some(end) if end <= disk_len => Ok(off),
        _ => Err(out_of_range),
    }
}
