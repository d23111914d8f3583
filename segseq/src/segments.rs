use alloc::boxed::Box;
use alloc::vec::Vec;
use core::{cmp, mem};

/// Owned block storage.
///
/// Blocks are allocated once and never resized or moved; growth only appends new blocks.
/// The first block may have any length, every later block holds exactly `step` slots.
/// Slots past `len` hold `T::default()`.
#[derive(Clone, Debug)]
pub(crate) struct Segments<T> {
    blocks: Vec<Box<[T]>>,
    len: usize,
    step: usize,
}

impl<T: Default> Segments<T> {
    pub(crate) fn new(step: usize) -> Self {
        debug_assert!(step > 0, "growth step must be non-zero");
        Self {
            blocks: Vec::new(),
            len: 0,
            step,
        }
    }

    pub(crate) fn with_capacity(step: usize, capacity: usize) -> Self {
        let mut segments = Self::new(step);
        if capacity > 0 {
            segments.blocks.push(new_block(capacity));
        }
        segments
    }

    /// Adopts `items` as the first block.
    pub(crate) fn from_vec(step: usize, items: Vec<T>) -> Self {
        let mut segments = Self::new(step);
        segments.len = items.len();
        if !items.is_empty() {
            segments.blocks.push(items.into_boxed_slice());
        }
        segments
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn step(&self) -> usize {
        self.step
    }

    pub(crate) fn capacity(&self) -> usize {
        match self.blocks.first() {
            None => 0,
            Some(first) => first.len() + (self.blocks.len() - 1) * self.step,
        }
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn segment_capacities(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.len()).collect()
    }

    #[cfg(test)]
    pub(crate) fn block_addrs(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.as_ptr() as usize).collect()
    }

    fn first_len(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.len())
    }

    /// Maps a logical index to `(block, offset)`.
    pub(crate) fn locate(&self, index: usize) -> (usize, usize) {
        let first = self.first_len();
        if index < first {
            return (0, index);
        }
        let rest = index - first;
        (1 + rest / self.step, rest % self.step)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let (b, off) = self.locate(index);
        Some(&self.blocks[b][off])
    }

    fn slot_mut(&mut self, index: usize) -> &mut T {
        let (b, off) = self.locate(index);
        &mut self.blocks[b][off]
    }

    /// Overwrites the item at `index` and returns the previous one.
    pub(crate) fn set(&mut self, index: usize, value: T) -> T {
        debug_assert!(index < self.len);
        mem::replace(self.slot_mut(index), value)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flat_map(|b| b.iter()).take(self.len)
    }

    /// Makes room for `additional` more items by appending blocks.
    pub(crate) fn reserve(&mut self, additional: usize) {
        let need = self.len.saturating_add(additional);
        let capacity = self.capacity();
        if need <= capacity {
            return;
        }
        if self.blocks.is_empty() {
            let size = cmp::max(additional, self.step);
            self.blocks.push(new_block(size));
            sdebug!(first = size, "segments: allocated first block");
            return;
        }
        let blocks = (need - capacity).div_ceil(self.step);
        for _ in 0..blocks {
            self.blocks.push(new_block(self.step));
        }
        sdebug!(
            added = blocks,
            segments = self.blocks.len(),
            capacity = self.capacity(),
            "segments: grew"
        );
    }

    /// Inserts at `index` (`index <= len`), shifting the tail one slot toward the end.
    pub(crate) fn insert(&mut self, index: usize, value: T) {
        debug_assert!(index <= self.len);
        self.reserve(1);

        // Rotate each block's share of [index, len] right by one; the element that falls off
        // the end of a block is carried into the front of the next one.
        let end = self.len + 1;
        let mut carry = value;
        let mut start = index;
        while start < end {
            let (b, off) = self.locate(start);
            let block = &mut self.blocks[b];
            let hi = cmp::min(block.len(), off + (end - start));
            let span = &mut block[off..hi];
            span.rotate_right(1);
            mem::swap(&mut span[0], &mut carry);
            start += hi - off;
        }
        self.len = end;
    }

    /// Removes the item at `index` (`index < len`), shifting the tail one slot toward the
    /// start and resetting the vacated slot.
    pub(crate) fn remove(&mut self, index: usize) -> T {
        debug_assert!(index < self.len);

        let mut carry = T::default();
        let mut end = self.len;
        while end > index {
            let (b, last) = self.locate(end - 1);
            let block_start = end - 1 - last;
            let start = cmp::max(index, block_start);
            let span = &mut self.blocks[b][start - block_start..=last];
            span.rotate_left(1);
            if let Some(tail) = span.last_mut() {
                mem::swap(tail, &mut carry);
            }
            end = start;
        }
        self.len -= 1;
        carry
    }

    pub(crate) fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }

    /// Drops every block and pre-sizes a fresh first block of `capacity` slots.
    pub(crate) fn reset(&mut self, capacity: usize) {
        self.clear();
        if capacity > 0 {
            self.blocks.push(new_block(capacity));
        }
    }

    /// Rebuilds the storage as a single block of exactly `len` slots.
    pub(crate) fn compact(&mut self) {
        if self.blocks.len() <= 1 && self.capacity() == self.len {
            return;
        }
        let len = self.len;
        let items: Vec<T> = mem::take(&mut self.blocks)
            .into_iter()
            .flat_map(|b| b.into_vec())
            .take(len)
            .collect();
        if !items.is_empty() {
            self.blocks.push(items.into_boxed_slice());
        }
        sdebug!(len, "segments: compacted");
    }

    /// Changes the size of blocks allocated from now on.
    pub(crate) fn set_step(&mut self, step: usize) {
        debug_assert!(step > 0, "growth step must be non-zero");
        if step == self.step {
            return;
        }
        // Later blocks must all be `step` long, so fold them into one first block.
        if self.blocks.len() > 1 {
            self.compact();
        }
        self.step = step;
    }
}

fn new_block<T: Default>(size: usize) -> Box<[T]> {
    (0..size).map(|_| T::default()).collect()
}
