//! a1fs is a user-space filesystem backed by a single fixed-size image file
//! mapped into memory.
//!
//! The image is split into 4096-byte blocks: block 0 holds the superblock,
//! followed by the inode bitmap, the block bitmap, the inode table and the
//! data region. File data is addressed through per-inode extent arrays.
//!
//! The crate exposes the filesystem operations as typed methods on [`Fs`];
//! a host binding (FUSE or similar) is expected to translate between kernel
//! callbacks and these methods. Paths passed to the operations are absolute
//! within the filesystem and start with `/`.

mod alloc;
mod bitmap;
mod ctx;
mod data;
mod dir;
mod error;
mod extent;
mod format;
mod image;
mod layout;
mod ops;
mod path;
mod util;

pub use ctx::Fs;
pub use error::Error;
pub use format::{format, is_present};
pub use image::ImageMap;
pub use layout::Timespec;
pub use ops::{Attr, SetTime, StatFs};
pub use util::ByteSize;

/// Size of a block in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Maximum length of a file name, including the terminating NUL.
pub const NAME_MAX: usize = 252;

/// Maximum length of a path.
pub const PATH_MAX: usize = 4096;

/// Maximum number of extents per inode: one block worth of descriptors.
pub const EXTENTS_PER_FILE: usize = 512;

/// The filesystem's magic number, stored at the beginning of the superblock.
pub const MAGIC: u64 = 0xc5c369a1c5c369a1;

/// Inode number of the root directory. Inode 0 is reserved.
pub(crate) const ROOT_INO: u32 = 1;
