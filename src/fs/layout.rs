//! On-disk data structures.
//!
//! All records are packed little-endian and are accessed in place, cast over
//! the mapped image. Block indices and inode numbers are 32 bit; sizes and
//! timestamps are 64 bit.

use crate::BLOCK_SIZE;
use crate::EXTENTS_PER_FILE;
use crate::NAME_MAX;
use static_assertions::const_assert_eq;
use std::mem::size_of;
use std::slice;

/// Superblock state: the filesystem is valid.
pub const STATE_VALID: u32 = 1;

/// A point in time, seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C, packed)]
pub struct Timespec {
    /// Seconds.
    pub sec: u64,
    /// Nanoseconds.
    pub nsec: u64,
}

/// The superblock, occupying the beginning of block 0.
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct Superblock {
    /// The filesystem's magic number.
    pub magic: u64,
    /// State of the filesystem: 0 = uninitialised, 1 = valid, 2 = error.
    pub state: u32,
    /// Size of the image in bytes.
    pub size: u64,
    /// Total number of inodes.
    pub max_inodes_count: u32,
    /// Total number of blocks.
    pub max_block_count: u32,
    /// Number of inodes in use.
    pub inodes_count: u32,
    /// Number of blocks in use.
    pub blocks_count: u32,
    /// Number of free inodes.
    pub free_inodes_count: u32,
    /// Number of free blocks.
    pub free_blocks_count: u32,
    /// Block index of the inode bitmap.
    pub inode_bitmap: u32,
    /// Block index of the block bitmap.
    pub block_bitmap: u32,
    /// Block index of the inode table.
    pub inode_table: u32,
    /// Size of an inode record in bytes.
    pub inode_size: u32,
}

/// A run of `count` contiguous blocks starting at block `start`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C, packed)]
pub struct Extent {
    /// Index of the first block of the run.
    pub start: u32,
    /// Number of blocks in the run.
    pub count: u32,
}

impl Extent {
    /// Returns the length of the run in bytes.
    pub fn byte_len(&self) -> u64 {
        self.count as u64 * BLOCK_SIZE as u64
    }
}

/// An inode record in the inode table.
///
/// A non-empty inode's data lives in up to [`EXTENTS_PER_FILE`] extents; the
/// descriptors are stored in a dedicated block pointed to by `extents`
/// (whose `count` is then exactly 1). An empty inode has `size == 0` and
/// `blocks == 0`, and its `extents` field is meaningless.
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct Inode {
    /// File type and permission bits.
    pub mode: u32,
    /// Number of directory entries referencing this inode. Directories count
    /// `.`, `..` and one per child subdirectory.
    pub links: u32,
    /// Size of the file in bytes. For directories, the total size of the
    /// stored entry records.
    pub size: u64,
    /// Timestamp of the last modification.
    pub mtime: Timespec,
    /// Number of blocks used by the file, including the extent-array block.
    pub blocks: u64,
    /// Location of the extent array.
    pub extents: Extent,
}

impl Inode {
    /// Tells whether the inode is a directory.
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

/// A directory entry record.
///
/// A directory's data is a dense array of these; removal splices the array,
/// so entry order is not stable across mutations.
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct Dentry {
    /// The referenced inode number.
    pub ino: u32,
    /// NUL-terminated file name.
    pub name: [u8; NAME_MAX],
}

impl Dentry {
    /// Builds an entry for inode `ino` named `name`, truncated to
    /// `NAME_MAX - 1` bytes.
    pub fn new(ino: u32, name: &str) -> Self {
        let mut entry = Self {
            ino,
            name: [0; NAME_MAX],
        };
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_MAX - 1);
        entry.name[..len].copy_from_slice(&bytes[..len]);
        entry
    }

    /// Returns the entry's name, without the terminating NUL.
    pub fn name(&self) -> &[u8] {
        let name = &self.name;
        let len = name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
        &name[..len]
    }

    /// Reinterprets the record as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const Self as *const u8, size_of::<Self>()) }
    }
}

const_assert_eq!(size_of::<Superblock>(), 60);
const_assert_eq!(size_of::<Timespec>(), 16);
const_assert_eq!(size_of::<Inode>(), 48);
const_assert_eq!(size_of::<Extent>(), 8);
const_assert_eq!(size_of::<Dentry>(), 256);
// One block of descriptors is exactly the per-file extent limit.
const_assert_eq!(BLOCK_SIZE / size_of::<Extent>(), EXTENTS_PER_FILE);
const_assert_eq!(BLOCK_SIZE % size_of::<Dentry>(), 0);
