//! Square-root decomposed sequence container
//!
//! The sequence is partitioned into contiguous blocks, each caching the
//! global index of its first element (`starting_pos`). Positional access
//! locates the owning block with a binary search over those cached
//! offsets, then indexes within the block directly, so insert/delete only
//! ever shift one block's worth of elements plus a `starting_pos` bump
//! across the remaining blocks.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Block<T> {
    buf: Vec<T>,
    starting_pos: usize,
}

impl<T> Block<T> {
    fn size(&self) -> usize {
        self.buf.len()
    }
}

/// Square-root-decomposed ordered sequence supporting O(sqrt(N))-ish
/// positional insert/delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedArray<T> {
    blocks: Vec<Block<T>>,
    size: usize,
}

impl<T: Clone> BlockedArray<T> {
    /// Build a blocked array from `array`, targeting `block_count` blocks.
    ///
    /// `block_count` is a target, not a guarantee: it is reduced until the
    /// last block would not be empty (see module docs on `set`).
    pub fn new(array: Vec<T>, block_count: usize) -> Self {
        let mut this = Self {
            blocks: Vec::new(),
            size: 0,
        };
        this.set(array, block_count);
        this
    }

    /// Empty blocked array with a single empty block.
    pub fn empty(block_count: usize) -> Self {
        Self::new(Vec::new(), block_count)
    }

    /// Alias for [`BlockedArray::empty`], named to match the server's
    /// `initial_array_size = 0` default construction path.
    pub fn new_empty(block_count: usize) -> Self {
        Self::empty(block_count)
    }

    /// Empty blocked array whose sole block has pre-reserved capacity,
    /// avoiding reallocation as the server's first `capacity` inserts land.
    pub fn with_capacity_hint(capacity: usize, block_count: usize) -> Self {
        let mut this = Self::new_empty(block_count);
        if let Some(block) = this.blocks.first_mut() {
            block.buf.reserve(capacity);
        }
        this
    }

    /// Re-initialize the container from a flat array, as `Set(array, B)`.
    pub fn set(&mut self, array: Vec<T>, block_count: usize) {
        let n = array.len();
        let (num_blocks, block_size) = choose_block_layout(n, block_count);

        let mut blocks = Vec::with_capacity(num_blocks);
        let mut iter = array.into_iter();
        let mut starting_pos = 0usize;
        for i in 0..num_blocks {
            let take = if i + 1 == num_blocks {
                n - starting_pos
            } else {
                block_size
            };
            let buf: Vec<T> = (&mut iter).take(take).collect();
            let len = buf.len();
            blocks.push(Block { buf, starting_pos });
            starting_pos += len;
        }

        self.blocks = blocks;
        self.size = n;
    }

    /// Total number of elements. O(1).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of blocks currently backing the sequence.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Read the element at `pos`. `pos` must be in `[0, size)`.
    pub fn get(&self, pos: usize) -> Result<T> {
        self.bounds_check_access(pos)?;
        let (block, offset) = self.locate(pos);
        Ok(self.blocks[block].buf[offset].clone())
    }

    /// Overwrite the element at `pos`. `pos` must be in `[0, size)`.
    pub fn update(&mut self, pos: usize, value: T) -> Result<()> {
        self.bounds_check_access(pos)?;
        let (block, offset) = self.locate(pos);
        self.blocks[block].buf[offset] = value;
        Ok(())
    }

    /// Insert `value` so it becomes the element at `pos`. `pos` must be in
    /// `[0, size]`.
    pub fn insert(&mut self, pos: usize, value: T) -> Result<()> {
        if pos > self.size {
            return Err(Error::OutOfBounds {
                pos,
                size: self.size,
            });
        }
        if self.blocks.is_empty() {
            self.blocks.push(Block {
                buf: Vec::new(),
                starting_pos: 0,
            });
        }
        let (block, offset) = self.locate(pos);
        self.blocks[block].buf.insert(offset, value);
        self.size += 1;
        for b in &mut self.blocks[block + 1..] {
            b.starting_pos += 1;
        }
        self.check_and_rebalance();
        Ok(())
    }

    /// Remove and return the element at `pos`. `pos` must be in `[0, size)`.
    pub fn delete(&mut self, pos: usize) -> Result<T> {
        self.bounds_check_access(pos)?;
        let (block, offset) = self.locate(pos);
        let value = self.blocks[block].buf.remove(offset);
        self.size -= 1;
        for b in &mut self.blocks[block + 1..] {
            b.starting_pos -= 1;
        }
        self.check_and_rebalance();
        Ok(value)
    }

    /// Return a fresh contiguous copy. Callers must not assume aliasing
    /// with the container's internal storage.
    pub fn get_all(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.size);
        for b in &self.blocks {
            out.extend_from_slice(&b.buf);
        }
        out
    }

    fn bounds_check_access(&self, pos: usize) -> Result<()> {
        if pos >= self.size {
            return Err(Error::OutOfBounds {
                pos,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Binary search over cached `starting_pos` for the block owning
    /// (or, for `pos == size`, immediately following) `pos`.
    fn locate(&self, pos: usize) -> (usize, usize) {
        let count_le = self.blocks.partition_point(|b| b.starting_pos <= pos);
        let block = count_le.saturating_sub(1);
        let offset = pos - self.blocks[block].starting_pos;
        (block, offset)
    }

    fn check_and_rebalance(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let max_size = self.blocks.iter().map(Block::size).max().unwrap_or(0);
        let min_size = self.blocks.iter().map(Block::size).min().unwrap_or(0);
        if max_size > 2 * min_size {
            let block_count = self.blocks.len();
            let all = self.get_all();
            self.set(all, block_count);
        }
    }
}

/// Choose `(num_blocks, block_size)` for `n` elements given a desired
/// `block_count`, shrinking `block_count` until the last block would not
/// be empty.
fn choose_block_layout(n: usize, block_count: usize) -> (usize, usize) {
    let mut b = block_count.max(1);
    loop {
        let block_size = div_ceil(n, b).max(1);
        if b > 1 && block_size * b >= n + block_size {
            b -= 1;
            continue;
        }
        return (b, block_size);
    }
}

fn div_ceil(n: usize, d: usize) -> usize {
    if n == 0 {
        0
    } else {
        (n + d - 1) / d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: i32) -> Vec<i32> {
        (0..n).collect()
    }

    #[test]
    fn test_construction_fills_blocks_left_to_right() {
        let arr = BlockedArray::new(seq(10), 3);
        assert_eq!(arr.size(), 10);
        assert_eq!(arr.get_all(), seq(10));
    }

    #[test]
    fn test_construction_reduces_block_count_to_avoid_empty_block() {
        // 5 elements into 10 requested blocks: block_size=1, but an
        // empty 10th block would result unless block_count shrinks.
        let arr = BlockedArray::new(seq(5), 10);
        assert_eq!(arr.size(), 5);
        assert!(arr.block_count() <= 5);
        assert_eq!(arr.get_all(), seq(5));
    }

    #[test]
    fn test_get_update() {
        let mut arr = BlockedArray::new(vec![10, 20, 30], 2);
        assert_eq!(arr.get(1).unwrap(), 20);
        arr.update(1, 99).unwrap();
        assert_eq!(arr.get(1).unwrap(), 99);
        assert!(arr.get(3).is_err());
    }

    #[test]
    fn test_insert_shifts_suffix_and_starting_pos() {
        let mut arr = BlockedArray::new(vec![1, 2, 3], 2);
        arr.insert(1, 100).unwrap();
        assert_eq!(arr.get_all(), vec![1, 100, 2, 3]);
        assert_eq!(arr.size(), 4);
    }

    #[test]
    fn test_insert_at_end() {
        let mut arr = BlockedArray::new(vec![1, 2, 3], 2);
        arr.insert(3, 4).unwrap();
        assert_eq!(arr.get_all(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut arr = BlockedArray::new(vec![1, 2, 3], 2);
        assert!(arr.insert(4, 0).is_err());
    }

    #[test]
    fn test_delete() {
        let mut arr = BlockedArray::new(vec![1, 2, 3, 4, 5], 2);
        let removed = arr.delete(2).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(arr.get_all(), vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_delete_out_of_bounds() {
        let mut arr = BlockedArray::new(vec![1, 2, 3], 2);
        assert!(arr.delete(3).is_err());
    }

    #[test]
    fn test_get_all_returns_detached_copy() {
        let arr = BlockedArray::new(vec![1, 2, 3], 2);
        let mut copy = arr.get_all();
        copy.push(4);
        assert_eq!(arr.size(), 3);
    }

    #[test]
    fn test_rebalance_keeps_blocks_within_factor_of_two() {
        let mut arr = BlockedArray::new(seq(100), 10);
        for _ in 0..60 {
            arr.delete(0).unwrap();
        }
        let max = arr_block_sizes(&arr).into_iter().max().unwrap_or(0);
        let min = arr_block_sizes(&arr).into_iter().min().unwrap_or(0);
        if arr.size() > 0 {
            assert!(max <= 2 * min);
        }
        assert_eq!(arr.get_all(), seq(100)[60..].to_vec());
    }

    fn arr_block_sizes(arr: &BlockedArray<i32>) -> Vec<usize> {
        arr.blocks.iter().map(Block::size).collect()
    }

    #[test]
    fn test_naive_reference_equivalence_insert_delete_update() {
        let mut arr = BlockedArray::new(seq(20), 4);
        let mut naive = seq(20);

        arr.insert(5, 1000).unwrap();
        naive.insert(5, 1000);
        assert_eq!(arr.get_all(), naive);

        arr.delete(0).unwrap();
        naive.remove(0);
        assert_eq!(arr.get_all(), naive);

        arr.update(10, -1).unwrap();
        naive[10] = -1;
        assert_eq!(arr.get_all(), naive);

        arr.insert(arr.size(), 7).unwrap();
        naive.push(7);
        assert_eq!(arr.get_all(), naive);
    }

    #[test]
    fn test_empty_array() {
        let arr: BlockedArray<i32> = BlockedArray::empty(10);
        assert_eq!(arr.size(), 0);
        assert!(arr.get(0).is_err());
    }

    #[test]
    fn test_insert_into_empty() {
        let mut arr: BlockedArray<i32> = BlockedArray::empty(10);
        arr.insert(0, 42).unwrap();
        assert_eq!(arr.get_all(), vec![42]);
    }

    #[test]
    fn test_with_capacity_hint_starts_empty() {
        let mut arr: BlockedArray<i32> = BlockedArray::with_capacity_hint(64, 8);
        assert_eq!(arr.size(), 0);
        arr.insert(0, 1).unwrap();
        assert_eq!(arr.get_all(), vec![1]);
    }
}
