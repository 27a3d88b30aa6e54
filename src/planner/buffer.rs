//! Fixed-capacity ring of move blocks.
//!
//! Blocks are addressed by logical index: 0 is the head (oldest, possibly
//! running), `len() - 1` the newest. Neighbours are reached by index
//! arithmetic, never by stored references.

use crate::error::PlanError;

use super::block::{BlockState, MoveBlock};

/// Ring buffer owning every pending block.
#[derive(Debug, Clone)]
pub struct PlannerBuffer<const N: usize> {
    slots: [MoveBlock; N],
    head: usize,
    len: usize,
}

impl<const N: usize> PlannerBuffer<N> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            slots: [MoveBlock::EMPTY; N],
            head: 0,
            len: 0,
        }
    }

    /// Number of blocks held.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether no slot is free.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Total slot count.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % N
    }

    /// Append a block. The buffer is untouched on failure.
    pub fn push(&mut self, block: MoveBlock) -> Result<usize, PlanError> {
        if self.is_full() {
            return Err(PlanError::BufferFull);
        }
        let index = self.len;
        let slot = self.slot(index);
        self.slots[slot] = block;
        self.len += 1;
        Ok(index)
    }

    /// Block at a logical index.
    pub fn get(&self, index: usize) -> Option<&MoveBlock> {
        (index < self.len).then(|| &self.slots[self.slot(index)])
    }

    /// Mutable block at a logical index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut MoveBlock> {
        if index < self.len {
            let slot = self.slot(index);
            Some(&mut self.slots[slot])
        } else {
            None
        }
    }

    /// Oldest block, whatever its state.
    #[inline]
    pub fn head(&self) -> Option<&MoveBlock> {
        self.get(0)
    }

    /// Newest block.
    #[inline]
    pub fn newest(&self) -> Option<&MoveBlock> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// The head block if the runtime is consuming it.
    pub fn peek_running(&self) -> Option<&MoveBlock> {
        self.head().filter(|b| b.state == BlockState::Running)
    }

    /// Index of the first block the solver may revise.
    pub fn first_queued(&self) -> usize {
        match self.peek_running() {
            Some(_) => 1,
            None => 0,
        }
    }

    /// Free the head slot.
    pub fn retire_head(&mut self) -> Option<MoveBlock> {
        if self.len == 0 {
            return None;
        }
        let block = self.slots[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(block)
    }

    /// Drop every block.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterate from head to newest.
    pub fn iter(&self) -> impl Iterator<Item = &MoveBlock> + '_ {
        (0..self.len).map(move |i| &self.slots[self.slot(i)])
    }

    /// Find a block by sequence number.
    pub fn find(&self, seq: u32) -> Option<&MoveBlock> {
        self.iter().find(|b| b.seq == seq)
    }
}

impl<const N: usize> Default for PlannerBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
