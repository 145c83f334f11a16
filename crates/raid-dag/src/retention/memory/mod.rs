
use crate::dag::IoParam;
use crate::engine::DiskIo;
use crate::error::IoError;
use crate::layout::{PhysDiskAddr, RaidLayout};
use crate::metrics::IoOpType;
use crate::retention::byte_offset;
use crate::retention::locks::LockTable;

#[derive(Clone, Debug)]
struct Fault {
    col: usize,
    op: IoOpType,
    remaining: u32,
}

/// MemArray keeps one in-memory image per column and can be told to fail.
#[derive(Clone, Debug)]
pub struct MemArray {
    disks: Vec<Vec<u8>>,
    failed: Vec<bool>,
    bytes_per_sector: usize,
    locks: LockTable,
    faults: Vec<Fault>,
}

impl MemArray {
    /// `new` allocates zeroed images large enough for `stripes` stripes.
    #[must_use]
    pub fn new(layout: &RaidLayout, stripes: u64) -> Self {
        let len = layout.su_bytes() * stripes as usize;
        let cols = layout.num_cols();
        Self {
            disks: vec![vec![0; len]; cols],
            failed: vec![false; cols],
            bytes_per_sector: layout.bytes_per_sector(),
            locks: LockTable::new(cols),
            faults: Vec::new(),
        }
    }

    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.disks.len()
    }

    #[must_use]
    pub fn disk(&self, col: usize) -> &[u8] {
        &self.disks[col]
    }

    pub fn disk_mut(&mut self, col: usize) -> &mut [u8] {
        &mut self.disks[col]
    }

    /// Every later operation on `col` fails with `IoError::DiskFailed`.
    pub fn fail_disk(&mut self, col: usize) {
        self.failed[col] = true;
    }

    /// The next `times` operations of kind `op` on `col` fail.
    pub fn fail_next(&mut self, col: usize, op: IoOpType, times: u32) {
        self.faults.push(Fault {
            col,
            op,
            remaining: times,
        });
    }

    #[must_use]
    /// `locks_held` is the number of queue lock holds across all columns.
    pub fn locks_held(&self) -> u32 {
        self.locks.total()
    }

    #[must_use]
    pub fn lock_count(&self, col: usize) -> u32 {
        self.locks.held(col)
    }

    fn check(&mut self, pda: &PhysDiskAddr, op: IoOpType) -> Result<(), IoError> {
        let col = pda.col;
        if col >= self.disks.len() {
            return Err(IoError::OutOfRange {
                col,
                start: pda.start_sector,
                end: pda.end_sector(),
            });
        }
        if self.failed[col] {
            return Err(IoError::DiskFailed { col });
        }
        if let Some(fault) = self
            .faults
            .iter_mut()
            .find(|f| f.col == col && f.op == op && f.remaining > 0)
        {
            fault.remaining -= 1;
            return Err(IoError::Injected {
                col,
                op: op.as_str(),
            });
        }
        Ok(())
    }

    fn range(&self, pda: &PhysDiskAddr, len: usize) -> Result<std::ops::Range<usize>, IoError> {
        let disk_len = self.disks[pda.col].len() as u64;
        let off = byte_offset(pda, self.bytes_per_sector, len, disk_len)? as usize;
        Ok(off..off + len)
    }
}

impl DiskIo for MemArray {
    fn read(
        &mut self,
        pda: &PhysDiskAddr,
        buf: &mut [u8],
        _stripe: u64,
        param: IoParam,
    ) -> Result<(), IoError> {
        self.check(pda, IoOpType::Read)?;
        let range = self.range(pda, buf.len())?;
        buf.copy_from_slice(&self.disks[pda.col][range]);
        if param.lock {
            self.locks.acquire(pda.col);
        }
        Ok(())
    }

    fn write(
        &mut self,
        pda: &PhysDiskAddr,
        buf: &[u8],
        _stripe: u64,
        param: IoParam,
    ) -> Result<(), IoError> {
        self.check(pda, IoOpType::Write)?;
        let range = self.range(pda, buf.len())?;
        self.disks[pda.col][range].copy_from_slice(buf);
        if param.unlock {
            self.locks.release(pda.col)?;
        }
        Ok(())
    }

    fn unlock(&mut self, pda: &PhysDiskAddr, _param: IoParam) -> Result<(), IoError> {
        self.check(pda, IoOpType::Unlock)?;
        self.locks.release(pda.col)
    }
}
