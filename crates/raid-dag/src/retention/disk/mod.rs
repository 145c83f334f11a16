#[cfg(test)]
mod disk_tests;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use memmap2::{MmapMut, MmapOptions};

/// FileDisk is one column of a file-backed array: a preallocated image file
/// mapped into memory.
pub struct FileDisk {
    path: PathBuf,
    file: Option<File>,
    map: Option<MmapMut>,
    len: u64,
}

impl FileDisk {
    /// # Errors
    /// Returns an error if the disk image cannot be created/opened or mapped.
    pub fn open_prealloc(path: &Path, len: u64) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("opening disk image {}", path.display()))?;
        file.set_len(len)?;
        let map = map_file(&file, len)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            map: Some(map),
            len,
        })
    }

    /// Mark this disk as failed (hot-remove).
    ///
    /// The image is renamed to `*.failed.<ts>` and the mapping is dropped, so
    /// every later operation on the column fails.
    ///
    /// # Errors
    /// Returns an error if the disk image cannot be renamed.
    pub fn fail(&mut self) -> anyhow::Result<()> {
        if self.path.exists() {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let failed_path = self.path.with_extension(format!("img.failed.{ts}"));
            std::fs::rename(&self.path, &failed_path).with_context(|| {
                format!("renaming failed disk image {}", self.path.display())
            })?;
        }

        self.map.take();
        self.file.take();
        Ok(())
    }

    /// Replace this disk with a fresh, zeroed image (hot-swap).
    ///
    /// # Errors
    /// Returns an error if the disk image cannot be recreated or mapped.
    pub fn replace(&mut self) -> anyhow::Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("recreating disk image {}", self.path.display()))?;
        file.set_len(self.len)?;
        let map = map_file(&file, self.len)?;

        self.file = Some(file);
        self.map = Some(map);
        Ok(())
    }

    /// Flushes dirty pages of the mapping to the image file.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> anyhow::Result<()> {
        if let Some(map) = self.map.as_ref() {
            map.flush()
                .with_context(|| format!("flushing {}", self.path.display()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn is_operational(&self) -> bool {
        self.file.is_some() && self.map.is_some()
    }

    pub fn read_at(&self, off: u64, buf: &mut [u8]) -> usize {
        let Some(map) = self.map.as_ref() else {
            return 0;
        };
        let (Ok(off), Ok(disk_len)) = (usize::try_from(off), usize::try_from(self.len)) else {
            return 0;
        };
        if off >= disk_len {
            return 0;
        }
        let end = off.saturating_add(buf.len()).min(disk_len);
        let src = &map[off..end];
        let n = src.len();
        buf[..n].copy_from_slice(src);
        n
    }

    pub fn write_at(&mut self, off: u64, data: &[u8]) -> usize {
        let Some(map) = self.map.as_mut() else {
            return 0;
        };
        let (Ok(off), Ok(disk_len)) = (usize::try_from(off), usize::try_from(self.len)) else {
            return 0;
        };
        if off >= disk_len {
            return 0;
        }
        let end = off.saturating_add(data.len()).min(disk_len);
        let dst = &mut map[off..end];
        let n = dst.len();
        dst.copy_from_slice(&data[..n]);
        n
    }
}

fn map_file(file: &File, len: u64) -> anyhow::Result<MmapMut> {
    let map_len = usize::try_from(len)
        .map_err(|_| anyhow!("disk length {len} exceeds addressable size"))?;
    let map = unsafe { MmapOptions::new().len(map_len).map_mut(file)? };
    Ok(map)
}
