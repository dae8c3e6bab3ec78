//! File data manipulation: growing, shrinking and copying byte ranges.
//!
//! Directories and regular files share this layer; a directory's entry array
//! is ordinary file data.

use crate::BLOCK_SIZE;
use crate::EXTENTS_PER_FILE;
use crate::Error;
use crate::Fs;
use crate::extent::Pos;
use crate::layout::Extent;
use crate::util;

impl Fs<'_> {
    /// Grows inode `ino` by exactly `n` zeroed bytes and returns the offset
    /// of the first appended byte.
    ///
    /// The tail extent is extended in place while the block right after its
    /// run is free; otherwise a new one-block extent is appended, failing
    /// with [`Error::NoSpace`] once the array holds [`EXTENTS_PER_FILE`]
    /// entries. On failure every block claimed by this call is released
    /// again and the inode is left as it was.
    pub(crate) fn append(&mut self, ino: u32, n: u64) -> Result<u64, Error> {
        let orig_size = self.inode(ino).size;
        if n == 0 {
            return Ok(orig_size);
        }
        let orig_blocks = self.inode(ino).blocks;
        let array_block;
        let orig_tail;
        let mut pos;
        if orig_size == 0 {
            // Bootstrap: one block for the extent array, one for the data.
            if self.sb().free_blocks_count < 2 {
                return Err(Error::NoSpace);
            }
            array_block = self.alloc_block()?;
            let first = self.alloc_block()?;
            self.set_extent(array_block, 0, Extent { start: first, count: 1 });
            let inode = self.inode_mut(ino);
            inode.extents = Extent {
                start: array_block,
                count: 1,
            };
            inode.blocks = 2;
            pos = Pos { idx: 0, within: 0 };
            orig_tail = None;
        } else {
            array_block = self.inode(ino).extents.start;
            pos = self.walk(ino, orig_size);
            let tail = self.extent(array_block, pos.idx);
            orig_tail = Some((pos.idx, tail.count));
        }
        let mut remaining = n;
        while remaining > 0 {
            let extent = self.extent(array_block, pos.idx);
            let extent_bytes = extent.byte_len();
            if pos.within == extent_bytes {
                // The run is full: extend it in place when the next physical
                // block is free, otherwise start a new extent.
                let next = extent.start + extent.count;
                if self.block_is_free(next) {
                    self.claim_block(next);
                    self.set_extent(
                        array_block,
                        pos.idx,
                        Extent {
                            start: extent.start,
                            count: extent.count + 1,
                        },
                    );
                } else {
                    if pos.idx as usize + 1 >= EXTENTS_PER_FILE {
                        self.unwind_append(ino, array_block, orig_tail, orig_blocks, pos.idx);
                        return Err(Error::NoSpace);
                    }
                    let block = match self.alloc_block() {
                        Ok(block) => block,
                        Err(e) => {
                            self.unwind_append(ino, array_block, orig_tail, orig_blocks, pos.idx);
                            return Err(e);
                        }
                    };
                    self.set_extent(array_block, pos.idx + 1, Extent { start: block, count: 1 });
                    pos.idx += 1;
                    pos.within = 0;
                }
                self.inode_mut(ino).blocks += 1;
                continue;
            }
            let chunk = remaining.min(extent_bytes - pos.within);
            let start = extent.start as u64 * BLOCK_SIZE as u64 + pos.within;
            // The appended range must read back as zeros, including slack
            // bytes left over in a previously truncated tail block.
            self.bytes_mut(start as usize, chunk as usize).fill(0);
            pos.within += chunk;
            remaining -= chunk;
        }
        let inode = self.inode_mut(ino);
        inode.size = orig_size + n;
        inode.mtime = util::timestamp();
        Ok(orig_size)
    }

    /// Releases everything a failed [`Fs::append`] claimed: extents added
    /// after the original tail, the blocks the original tail grew by, and
    /// (for an initially empty inode) the extent array itself.
    fn unwind_append(
        &mut self,
        ino: u32,
        array_block: u32,
        orig_tail: Option<(u32, u32)>,
        orig_blocks: u64,
        last_idx: u32,
    ) {
        let first_new = match orig_tail {
            Some((tail_idx, tail_count)) => {
                let tail = self.extent(array_block, tail_idx);
                for block in tail.start + tail_count..tail.start + tail.count {
                    self.free_block(block);
                }
                self.set_extent(
                    array_block,
                    tail_idx,
                    Extent {
                        start: tail.start,
                        count: tail_count,
                    },
                );
                tail_idx + 1
            }
            None => 0,
        };
        for idx in first_new..=last_idx {
            let extent = self.extent(array_block, idx);
            for block in extent.start..extent.start + extent.count {
                self.free_block(block);
            }
        }
        if orig_tail.is_none() {
            self.free_block(array_block);
        }
        self.inode_mut(ino).blocks = orig_blocks;
    }

    /// Deletes the byte range `[offset, offset + n)` of inode `ino`,
    /// shifting the tail of the file left and releasing the blocks that fall
    /// out of use. When the file becomes empty its extent array is released
    /// too.
    pub(crate) fn splice_out(&mut self, ino: u32, offset: u64, n: u64) {
        if n == 0 {
            return;
        }
        let size = self.inode(ino).size;
        debug_assert!(offset + n <= size);
        let tail_len = size - offset - n;
        if tail_len > 0 {
            self.copy_range(ino, offset + n, offset, tail_len);
        }
        let new_size = size - n;
        let array_block = self.inode(ino).extents.start;
        // Data is linear across the extent chain, so exactly the first
        // `retained` blocks stay in use.
        let mut retained = new_size.div_ceil(BLOCK_SIZE as u64);
        let mut covered = 0;
        let mut idx = 0;
        while covered < size {
            let extent = self.extent(array_block, idx);
            let keep = (extent.count as u64).min(retained) as u32;
            for block in extent.start + keep..extent.start + extent.count {
                self.free_block(block);
                self.inode_mut(ino).blocks -= 1;
            }
            if keep > 0 && keep < extent.count {
                self.set_extent(
                    array_block,
                    idx,
                    Extent {
                        start: extent.start,
                        count: keep,
                    },
                );
            }
            retained -= keep as u64;
            covered += extent.byte_len();
            idx += 1;
        }
        let inode = self.inode_mut(ino);
        inode.size = new_size;
        inode.mtime = util::timestamp();
        if new_size == 0 {
            self.free_block(array_block);
            self.inode_mut(ino).blocks -= 1;
        }
    }

    /// Resizes inode `ino` to `new_size` bytes, releasing or zero-filling
    /// the difference.
    pub(crate) fn resize(&mut self, ino: u32, new_size: u64) -> Result<(), Error> {
        let size = self.inode(ino).size;
        if new_size < size {
            self.splice_out(ino, new_size, size - new_size);
            Ok(())
        } else if new_size > size {
            self.append(ino, new_size - size).map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Copies `len` file bytes of inode `ino` from `src` to `dst`, crossing
    /// extent boundaries on both sides. Both ranges must lie within the
    /// file; they may overlap as long as `dst` does not exceed `src`.
    fn copy_range(&mut self, ino: u32, src: u64, dst: u64, len: u64) {
        let mut from = self.segments(ino, src, len);
        let mut to = self.segments(ino, dst, len);
        let mut fi = 0;
        let mut ti = 0;
        while fi < from.len() && ti < to.len() {
            let (fs, fl) = from[fi];
            let (ts, tl) = to[ti];
            let take = fl.min(tl);
            self.copy_bytes(fs, ts, take);
            if fl == take {
                fi += 1;
            } else {
                from[fi] = (fs + take, fl - take);
            }
            if tl == take {
                ti += 1;
            } else {
                to[ti] = (ts + take, tl - take);
            }
        }
    }

    /// Reads `buf.len()` bytes at file offset `offset` of inode `ino`.
    pub(crate) fn read_at(&self, ino: u32, offset: u64, buf: &mut [u8]) {
        let mut copied = 0;
        for (start, len) in self.segments(ino, offset, buf.len() as u64) {
            buf[copied..copied + len].copy_from_slice(self.bytes(start, len));
            copied += len;
        }
    }

    /// Writes `buf` at file offset `offset` of inode `ino`. The range must
    /// lie within the file.
    pub(crate) fn write_at(&mut self, ino: u32, offset: u64, buf: &[u8]) {
        let mut copied = 0;
        for (start, len) in self.segments(ino, offset, buf.len() as u64) {
            self.bytes_mut(start, len).copy_from_slice(&buf[copied..copied + len]);
            copied += len;
        }
    }
}

#[cfg(test)]
mod test {
    use crate::BLOCK_SIZE;
    use crate::Fs;
    use crate::format::format;

    fn image(blocks: usize, inodes: u32) -> Vec<u8> {
        let mut img = vec![0u8; blocks * BLOCK_SIZE];
        format(&mut img, inodes).unwrap();
        img
    }

    #[test]
    fn append_bootstraps_an_empty_file() {
        let mut img = image(64, 8);
        let mut fs = Fs::open(&mut img).unwrap();
        fs.create("/f", 0o644).unwrap();
        let ino = fs.resolve("/f").unwrap();
        assert_eq!(fs.append(ino, 10).unwrap(), 0);
        let blocks = fs.inode(ino).blocks;
        assert_eq!(blocks, 2);
        // Further appends land at the previous end of file.
        assert_eq!(fs.append(ino, 10).unwrap(), 10);
        let size = fs.inode(ino).size;
        assert_eq!(size, 20);
        let blocks = fs.inode(ino).blocks;
        assert_eq!(blocks, 2);
        let mut buf = [0xffu8; 20];
        fs.read_at(ino, 0, &mut buf);
        assert_eq!(buf, [0u8; 20]);
    }

    #[test]
    fn append_zeroes_reused_tail_slack() {
        let mut img = image(64, 8);
        let mut fs = Fs::open(&mut img).unwrap();
        fs.create("/f", 0o644).unwrap();
        let ino = fs.resolve("/f").unwrap();
        fs.append(ino, 8).unwrap();
        fs.write_at(ino, 0, b"12345678");
        fs.splice_out(ino, 4, 4);
        // The freed slack still holds old bytes on disk; growing over it
        // must hand back zeros.
        fs.append(ino, 4).unwrap();
        let mut buf = [0xffu8; 8];
        fs.read_at(ino, 0, &mut buf);
        assert_eq!(&buf, b"1234\0\0\0\0");
    }

    #[test]
    fn splice_out_shifts_across_extents_and_frees() {
        let mut img = image(64, 8);
        let mut fs = Fs::open(&mut img).unwrap();
        // Force `/a` into two single-block extents.
        fs.create("/a", 0o644).unwrap();
        fs.create("/b", 0o644).unwrap();
        fs.truncate("/a", BLOCK_SIZE as u64).unwrap();
        fs.truncate("/b", BLOCK_SIZE as u64).unwrap();
        fs.truncate("/a", 2 * BLOCK_SIZE as u64).unwrap();
        let ino = fs.resolve("/a").unwrap();
        fs.write_at(ino, 0, &vec![b'A'; BLOCK_SIZE]);
        fs.write_at(ino, BLOCK_SIZE as u64, &vec![b'B'; BLOCK_SIZE]);
        let free_before = fs.statfs().blocks_free;
        // Cut the whole first block: the second block's bytes move into the
        // first extent and the now unused block is released.
        fs.splice_out(ino, 0, BLOCK_SIZE as u64);
        let size = fs.inode(ino).size;
        assert_eq!(size, BLOCK_SIZE as u64);
        let blocks = fs.inode(ino).blocks;
        assert_eq!(blocks, 2);
        assert_eq!(fs.statfs().blocks_free, free_before + 1);
        let mut buf = vec![0u8; BLOCK_SIZE];
        fs.read_at(ino, 0, &mut buf);
        assert!(buf.iter().all(|&b| b == b'B'));
    }

    #[test]
    fn splice_out_to_empty_releases_the_extent_array() {
        let mut img = image(64, 8);
        let mut fs = Fs::open(&mut img).unwrap();
        let free_clean = fs.statfs().blocks_free;
        fs.create("/f", 0o644).unwrap();
        let ino = fs.resolve("/f").unwrap();
        let free_with_dir = fs.statfs().blocks_free;
        fs.append(ino, 100).unwrap();
        fs.splice_out(ino, 0, 100);
        let size = fs.inode(ino).size;
        let blocks = fs.inode(ino).blocks;
        assert_eq!(size, 0);
        assert_eq!(blocks, 0);
        assert_eq!(fs.statfs().blocks_free, free_with_dir);
        // The root directory still owns its own two blocks.
        assert_eq!(free_with_dir, free_clean - 2);
    }

    #[test]
    fn truncate_mid_extent_keeps_the_tail_block() {
        let mut img = image(64, 8);
        let mut fs = Fs::open(&mut img).unwrap();
        fs.create("/f", 0o644).unwrap();
        let ino = fs.resolve("/f").unwrap();
        fs.append(ino, 3 * BLOCK_SIZE as u64).unwrap();
        fs.resize(ino, BLOCK_SIZE as u64 + 1).unwrap();
        // Two data blocks remain: one full, one holding a single byte.
        let blocks = fs.inode(ino).blocks;
        assert_eq!(blocks, 3);
        let array_block = fs.inode(ino).extents.start;
        let tail = fs.extent(array_block, 0);
        let count = tail.count;
        assert_eq!(count, 2);
    }
}
