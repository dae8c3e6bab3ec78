//! Filesystem runtime context.
//!
//! [`Fs`] owns the mapped image for the duration of a mount. All on-image
//! state is reached through the typed accessors below; they are the only
//! places where raw bytes are reinterpreted as records.

use crate::BLOCK_SIZE;
use crate::Error;
use crate::layout::Dentry;
use crate::layout::Extent;
use crate::layout::Inode;
use crate::layout::STATE_VALID;
use crate::layout::Superblock;
use std::mem::size_of;

/// A mounted filesystem over a mapped image.
pub struct Fs<'img> {
    image: &'img mut [u8],
}

impl<'img> Fs<'img> {
    /// Mounts the filesystem contained in `image`.
    ///
    /// Validates the superblock before any operation can run: magic, state,
    /// agreement between the recorded and the actual image size, and region
    /// offsets within bounds.
    pub fn open(image: &'img mut [u8]) -> Result<Self, Error> {
        if image.len() < 4 * BLOCK_SIZE || image.len() % BLOCK_SIZE != 0 {
            return Err(Error::InvalidImage);
        }
        let fs = Self { image };
        let sb = fs.sb();
        if sb.magic != crate::MAGIC || sb.state != STATE_VALID {
            return Err(Error::InvalidImage);
        }
        let max_block_count = sb.max_block_count as u64;
        let max_inodes_count = sb.max_inodes_count as u64;
        if sb.size != fs.image.len() as u64 || max_block_count != sb.size / BLOCK_SIZE as u64 {
            return Err(Error::InvalidImage);
        }
        if sb.inode_size != size_of::<Inode>() as u32 || max_inodes_count < 2 {
            return Err(Error::InvalidImage);
        }
        // The metadata regions must be laid out in order and fit the image.
        let bits_per_block = (BLOCK_SIZE * 8) as u64;
        let inode_bitmap_blocks = max_inodes_count.div_ceil(bits_per_block);
        let block_bitmap_blocks = max_block_count.div_ceil(bits_per_block);
        let table_blocks =
            (max_inodes_count * sb.inode_size as u64).div_ceil(BLOCK_SIZE as u64);
        if sb.inode_bitmap == 0
            || (sb.block_bitmap as u64) < sb.inode_bitmap as u64 + inode_bitmap_blocks
            || (sb.inode_table as u64) < sb.block_bitmap as u64 + block_bitmap_blocks
            || sb.inode_table as u64 + table_blocks > max_block_count
        {
            return Err(Error::InvalidImage);
        }
        Ok(fs)
    }

    /// Returns a view of the superblock.
    pub(crate) fn sb(&self) -> &Superblock {
        unsafe { &*(self.image.as_ptr() as *const Superblock) }
    }

    /// Returns a mutable view of the superblock.
    pub(crate) fn sb_mut(&mut self) -> &mut Superblock {
        unsafe { &mut *(self.image.as_mut_ptr() as *mut Superblock) }
    }

    fn inode_offset(&self, ino: u32) -> usize {
        debug_assert!(ino < self.sb().max_inodes_count);
        self.sb().inode_table as usize * BLOCK_SIZE + ino as usize * size_of::<Inode>()
    }

    /// Returns a view of inode `ino`.
    pub(crate) fn inode(&self, ino: u32) -> &Inode {
        let off = self.inode_offset(ino);
        let bytes = &self.image[off..off + size_of::<Inode>()];
        unsafe { &*(bytes.as_ptr() as *const Inode) }
    }

    /// Returns a mutable view of inode `ino`.
    pub(crate) fn inode_mut(&mut self, ino: u32) -> &mut Inode {
        let off = self.inode_offset(ino);
        let bytes = &mut self.image[off..off + size_of::<Inode>()];
        unsafe { &mut *(bytes.as_mut_ptr() as *mut Inode) }
    }

    /// Returns the inode bitmap.
    pub(crate) fn inode_bitmap(&self) -> &[u8] {
        let start = self.sb().inode_bitmap as usize * BLOCK_SIZE;
        let len = (self.sb().max_inodes_count as usize).div_ceil(8);
        &self.image[start..start + len]
    }

    /// Returns the inode bitmap, mutably.
    pub(crate) fn inode_bitmap_mut(&mut self) -> &mut [u8] {
        let start = self.sb().inode_bitmap as usize * BLOCK_SIZE;
        let len = (self.sb().max_inodes_count as usize).div_ceil(8);
        &mut self.image[start..start + len]
    }

    /// Returns the block bitmap.
    pub(crate) fn block_bitmap(&self) -> &[u8] {
        let start = self.sb().block_bitmap as usize * BLOCK_SIZE;
        let len = (self.sb().max_block_count as usize).div_ceil(8);
        &self.image[start..start + len]
    }

    /// Returns the block bitmap, mutably.
    pub(crate) fn block_bitmap_mut(&mut self) -> &mut [u8] {
        let start = self.sb().block_bitmap as usize * BLOCK_SIZE;
        let len = (self.sb().max_block_count as usize).div_ceil(8);
        &mut self.image[start..start + len]
    }

    /// Returns the extent descriptor `index` of the array stored in block
    /// `array_block`.
    pub(crate) fn extent(&self, array_block: u32, index: u32) -> Extent {
        let off = array_block as usize * BLOCK_SIZE + index as usize * size_of::<Extent>();
        let bytes = &self.image[off..off + size_of::<Extent>()];
        unsafe { *(bytes.as_ptr() as *const Extent) }
    }

    /// Writes the extent descriptor `index` of the array stored in block
    /// `array_block`.
    pub(crate) fn set_extent(&mut self, array_block: u32, index: u32, extent: Extent) {
        let off = array_block as usize * BLOCK_SIZE + index as usize * size_of::<Extent>();
        let bytes = &mut self.image[off..off + size_of::<Extent>()];
        unsafe {
            *(bytes.as_mut_ptr() as *mut Extent) = extent;
        }
    }

    /// Returns the directory entry record stored at `bytes`.
    ///
    /// `bytes` must hold a whole record; entries are block-aligned so a
    /// record never straddles an extent boundary.
    pub(crate) fn dentry_at(bytes: &[u8]) -> &Dentry {
        debug_assert!(bytes.len() >= size_of::<Dentry>());
        unsafe { &*(bytes.as_ptr() as *const Dentry) }
    }

    /// Returns `len` image bytes starting at absolute offset `off`.
    pub(crate) fn bytes(&self, off: usize, len: usize) -> &[u8] {
        &self.image[off..off + len]
    }

    /// Returns `len` image bytes starting at absolute offset `off`, mutably.
    pub(crate) fn bytes_mut(&mut self, off: usize, len: usize) -> &mut [u8] {
        &mut self.image[off..off + len]
    }

    /// Copies `len` bytes from absolute offset `src` to absolute offset
    /// `dst`; the ranges may overlap.
    pub(crate) fn copy_bytes(&mut self, src: usize, dst: usize, len: usize) {
        self.image.copy_within(src..src + len, dst);
    }
}
