//! Cell-addressed memory with stack discipline.

use crate::emulation::{EmValue, EmulationError};

/// Flat memory of value cells.
///
/// Globals are allocated first and live for the whole run; each call frame
/// allocates its `alloca`s above them and releases everything it allocated
/// when it returns ([`Memory::mark`] / [`Memory::release`]).
#[derive(Debug, Clone)]
pub struct Memory {
    cells: Vec<EmValue>,
    limit: usize,
}

impl Memory {
    /// Creates an empty memory holding at most `limit` cells.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            cells: Vec::new(),
            limit,
        }
    }

    /// Number of cells in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` if nothing is allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Allocates `count` cells set to `init`, returning the first address.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::MemoryLimitExceeded`] past the limit.
    pub fn allocate(&mut self, count: usize, init: EmValue) -> Result<usize, EmulationError> {
        let base = self.cells.len();
        if base + count > self.limit {
            return Err(EmulationError::MemoryLimitExceeded {
                current: base,
                limit: self.limit,
            });
        }
        self.cells.resize(base + count, init);
        Ok(base)
    }

    /// Current top of memory, to be passed to [`Memory::release`].
    #[must_use]
    pub fn mark(&self) -> usize {
        self.cells.len()
    }

    /// Frees every cell allocated since `mark`.
    pub fn release(&mut self, mark: usize) {
        self.cells.truncate(mark);
    }

    /// Reads cell `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidAddress`] for unallocated cells.
    pub fn load(&self, addr: usize) -> Result<EmValue, EmulationError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(EmulationError::InvalidAddress { address: addr })
    }

    /// Writes cell `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidAddress`] for unallocated cells.
    pub fn store(&mut self, addr: usize, value: EmValue) -> Result<(), EmulationError> {
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(EmulationError::InvalidAddress { address: addr })?;
        *cell = value;
        Ok(())
    }

    /// Sets `count` cells starting at `addr` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError::InvalidAddress`] if the range leaves the
    /// allocated cells.
    pub fn fill(&mut self, addr: usize, count: usize, value: EmValue) -> Result<(), EmulationError> {
        let end = addr + count;
        if end > self.cells.len() {
            return Err(EmulationError::InvalidAddress {
                address: end.saturating_sub(1),
            });
        }
        self.cells[addr..end].fill(value);
        Ok(())
    }
}
