#[cfg(test)]
mod array_tests;

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;

use crate::dag::IoParam;
use crate::engine::DiskIo;
use crate::error::IoError;
use crate::layout::{PhysDiskAddr, RaidLayout};
use crate::retention::byte_offset;
use crate::retention::disk::FileDisk;
use crate::retention::locks::LockTable;

/// FileArray is a set of file-backed columns, one `disk<i>.img` per column.
pub struct FileArray {
    disks: Vec<FileDisk>,
    bytes_per_sector: usize,
    locks: LockTable,
}

impl FileArray {
    /// `open` creates (or reopens) the column images under `dir`, each sized
    /// for `stripes` stripes of `layout`.
    ///
    /// # Errors
    /// Returns an error if the directory or any image cannot be prepared.
    pub fn open(dir: &Path, layout: &RaidLayout, stripes: u64) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating disk directory {}", dir.display()))?;
        let len = layout.su_bytes() as u64 * stripes;
        let disks = (0..layout.num_cols())
            .map(|i| FileDisk::open_prealloc(&dir.join(format!("disk{i}.img")), len))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            disks,
            bytes_per_sector: layout.bytes_per_sector(),
            locks: LockTable::new(layout.num_cols()),
        })
    }

    #[must_use]
    pub fn disk_len(&self) -> u64 {
        self.disks.first().map_or(0, FileDisk::len)
    }

    #[must_use]
    pub fn disk(&self, i: usize) -> Option<&FileDisk> {
        self.disks.get(i)
    }

    /// # Errors
    /// Returns an error for an unknown column or if the image cannot be moved aside.
    pub fn fail_disk(&mut self, i: usize) -> anyhow::Result<()> {
        let cols = self.disks.len();
        self.disks
            .get_mut(i)
            .with_context(|| format!("disk index out of range: {i} (cols={cols})"))?
            .fail()
    }

    /// # Errors
    /// Returns an error for an unknown column or if the image cannot be recreated.
    pub fn replace_disk(&mut self, i: usize) -> anyhow::Result<()> {
        let cols = self.disks.len();
        self.disks
            .get_mut(i)
            .with_context(|| format!("disk index out of range: {i} (cols={cols})"))?
            .replace()
    }

    /// Column indices whose images are unavailable.
    #[must_use]
    pub fn failed_cols(&self) -> Vec<usize> {
        self.disks
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.is_operational())
            .map(|(i, _)| i)
            .collect()
    }

    /// # Errors
    /// Returns the first flush failure.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.disks.iter().try_for_each(FileDisk::flush)
    }

    #[must_use]
    pub fn status_string(&self) -> String {
        let mut out = String::new();
        for (i, d) in self.disks.iter().enumerate() {
            let state = if d.is_operational() { "OK" } else { "FAILED" };
            let _ = writeln!(
                out,
                "disk {i}: {state} (locks={}, path={})",
                self.locks.held(i),
                d.path().display()
            );
        }
        out
    }

    fn usable(&self, pda: &PhysDiskAddr, len: usize) -> Result<u64, IoError> {
        let disk = self.disks.get(pda.col).ok_or(IoError::OutOfRange {
            col: pda.col,
            start: pda.start_sector,
            end: pda.end_sector(),
        })?;
        if !disk.is_operational() {
            return Err(IoError::DiskFailed { col: pda.col });
        }
        byte_offset(pda, self.bytes_per_sector, len, disk.len())
    }
}

impl DiskIo for FileArray {
    fn read(
        &mut self,
        pda: &PhysDiskAddr,
        buf: &mut [u8],
        _stripe: u64,
        param: IoParam,
    ) -> Result<(), IoError> {
        let off = self.usable(pda, buf.len())?;
        self.disks[pda.col].read_at(off, buf);
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
        let off = self.usable(pda, buf.len())?;
        self.disks[pda.col].write_at(off, buf);
        if param.unlock {
            self.locks.release(pda.col)?;
        }
        Ok(())
    }

    fn unlock(&mut self, pda: &PhysDiskAddr, _param: IoParam) -> Result<(), IoError> {
        self.locks.release(pda.col)
    }
}
