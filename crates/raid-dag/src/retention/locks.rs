use crate::error::IoError;

/// LockTable counts disk queue lock holds per column. A column may be held
/// more than once, e.g. by the two reads of a split parity region.
#[derive(Clone, Debug, Default)]
pub(crate) struct LockTable {
    held: Vec<u32>,
}

impl LockTable {
    pub(crate) fn new(cols: usize) -> Self {
        Self {
            held: vec![0; cols],
        }
    }

    pub(crate) fn acquire(&mut self, col: usize) {
        self.held[col] += 1;
    }

    pub(crate) fn release(&mut self, col: usize) -> Result<(), IoError> {
        match self.held.get_mut(col) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Ok(())
            }
            _ => Err(IoError::NotLocked { col }),
        }
    }

    pub(crate) fn held(&self, col: usize) -> u32 {
        self.held.get(col).copied().unwrap_or(0)
    }

    pub(crate) fn total(&self) -> u32 {
        self.held.iter().sum()
    }
}
