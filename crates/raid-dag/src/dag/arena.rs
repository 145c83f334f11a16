use crate::error::{DagError, Result};

/// BufferId indexes a buffer owned by a DAG's arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub usize);

/// Arena owns every buffer created for one DAG. Buffers are never freed
/// individually; the arena is dropped together with its DAG.
#[derive(Debug, Default)]
pub struct Arena {
    buffers: Vec<Vec<u8>>,
    allocated: usize,
    limit: Option<usize>,
}

impl Arena {
    #[must_use]
    pub const fn new(limit: Option<usize>) -> Self {
        Self {
            buffers: Vec::new(),
            allocated: 0,
            limit,
        }
    }

    /// `alloc_zeroed` hands out a fresh zero-filled buffer.
    ///
    /// # Errors
    /// Returns `DagError::OutOfMemory` when the arena limit would be exceeded or
    /// the allocator refuses the request.
    pub fn alloc_zeroed(&mut self, len: usize) -> Result<BufferId> {
        let mut buf = self.reserve(len)?;
        buf.resize(len, 0);
        Ok(self.push(buf))
    }

    /// `alloc_from` hands out a buffer initialised with a copy of `data`.
    ///
    /// # Errors
    /// Returns `DagError::OutOfMemory` like `alloc_zeroed`.
    pub fn alloc_from(&mut self, data: &[u8]) -> Result<BufferId> {
        let mut buf = self.reserve(data.len())?;
        buf.extend_from_slice(data);
        Ok(self.push(buf))
    }

    fn reserve(&mut self, len: usize) -> Result<Vec<u8>> {
        let oom = DagError::OutOfMemory {
            requested: len,
            allocated: self.allocated,
        };
        let total = self.allocated.checked_add(len).ok_or_else(|| oom.clone())?;
        if self.limit.is_some_and(|limit| total > limit) {
            return Err(oom);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| oom.clone())?;
        self.buffers.try_reserve(1).map_err(|_| oom)?;
        self.allocated = total;
        Ok(buf)
    }

    fn push(&mut self, buf: Vec<u8>) -> BufferId {
        self.buffers.push(buf);
        BufferId(self.buffers.len() - 1)
    }

    #[must_use]
    pub fn get(&self, id: BufferId) -> &[u8] {
        &self.buffers[id.0]
    }

    pub fn get_mut(&mut self, id: BufferId) -> &mut [u8] {
        &mut self.buffers[id.0]
    }

    /// Moves a buffer out so it can be written while other buffers are read.
    pub(crate) fn take(&mut self, id: BufferId) -> Vec<u8> {
        std::mem::take(&mut self.buffers[id.0])
    }

    pub(crate) fn restore(&mut self, id: BufferId, buf: Vec<u8>) {
        self.buffers[id.0] = buf;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[must_use]
    /// `allocated_bytes` is the total size of all buffers handed out.
    pub const fn allocated_bytes(&self) -> usize {
        self.allocated
    }
}
