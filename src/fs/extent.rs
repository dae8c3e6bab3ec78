//! Extent walking.
//!
//! A file's bytes are the concatenation of its extents' block runs in array
//! order. The walker turns a byte offset into a typed position instead of a
//! raw pointer, and a byte range into absolute image segments; extent
//! transitions are checked before any access.

use crate::BLOCK_SIZE;
use crate::Fs;

/// A position within a file's extent chain.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pos {
    /// Index of the extent in the array.
    pub idx: u32,
    /// Byte offset within the extent's run.
    ///
    /// At end of file this may equal the run's byte length (one past the
    /// physical end); the position must not be read from before checking.
    pub within: u64,
}

impl Fs<'_> {
    /// Walks inode `ino`'s extents to byte `offset`.
    ///
    /// The inode must not be empty and `offset` must not exceed its size.
    /// When `offset` equals the size, the returned position designates the
    /// tail extent and the byte one past the last valid one.
    pub(crate) fn walk(&self, ino: u32, offset: u64) -> Pos {
        let size = self.inode(ino).size;
        let array_block = self.inode(ino).extents.start;
        debug_assert!(size > 0 && offset <= size);
        let mut covered = 0;
        let mut idx = 0;
        loop {
            let bytes = self.extent(array_block, idx).byte_len();
            // Stop in the extent containing the offset, or in the tail
            // extent when the offset is the end of file.
            if offset < covered + bytes || covered + bytes >= size {
                return Pos {
                    idx,
                    within: offset - covered,
                };
            }
            covered += bytes;
            idx += 1;
        }
    }

    /// Maps the byte range `[offset, offset + len)` of inode `ino` to a list
    /// of `(image offset, length)` segments, one per extent crossed.
    ///
    /// The range must lie within the file.
    pub(crate) fn segments(&self, ino: u32, offset: u64, len: u64) -> Vec<(usize, usize)> {
        let mut segments = Vec::new();
        if len == 0 {
            return segments;
        }
        debug_assert!(offset + len <= self.inode(ino).size);
        let array_block = self.inode(ino).extents.start;
        let mut pos = self.walk(ino, offset);
        let mut remaining = len;
        loop {
            let extent = self.extent(array_block, pos.idx);
            let avail = extent.byte_len() - pos.within;
            let take = remaining.min(avail);
            let start = extent.start as u64 * BLOCK_SIZE as u64 + pos.within;
            segments.push((start as usize, take as usize));
            remaining -= take;
            if remaining == 0 {
                return segments;
            }
            pos.idx += 1;
            pos.within = 0;
        }
    }
}
