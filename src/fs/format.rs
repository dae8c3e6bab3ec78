//! Filesystem creation.

use crate::BLOCK_SIZE;
use crate::Error;
use crate::MAGIC;
use crate::ROOT_INO;
use crate::bitmap;
use crate::layout::Inode;
use crate::layout::STATE_VALID;
use crate::layout::Superblock;
use crate::util;
use std::mem::size_of;

/// Tells whether `image` already contains a valid filesystem.
pub fn is_present(image: &[u8]) -> bool {
    if image.len() < size_of::<Superblock>() {
        return false;
    }
    let sb = unsafe { &*(image.as_ptr() as *const Superblock) };
    sb.magic == MAGIC && sb.state == STATE_VALID
}

/// Formats `image` into an empty filesystem with `n_inodes` inodes.
///
/// The image size must be a positive multiple of the block size. Fails with
/// [`Error::NoSpace`] when the metadata regions do not fit the image.
pub fn format(image: &mut [u8], n_inodes: u32) -> Result<(), Error> {
    // Inode 0 is reserved and inode 1 is the root directory, so any valid
    // filesystem holds at least two inodes.
    if image.is_empty() || image.len() % BLOCK_SIZE != 0 || n_inodes < 2 {
        return Err(Error::InvalidImage);
    }
    let max_block_count = (image.len() / BLOCK_SIZE) as u32;
    let bits_per_block = (BLOCK_SIZE * 8) as u32;
    let inode_bitmap_blocks = n_inodes.div_ceil(bits_per_block);
    let block_bitmap_blocks = max_block_count.div_ceil(bits_per_block);
    let inode_table_blocks =
        (n_inodes as u64 * size_of::<Inode>() as u64).div_ceil(BLOCK_SIZE as u64) as u32;
    let reserved = 1 + inode_bitmap_blocks + block_bitmap_blocks + inode_table_blocks;
    if reserved > max_block_count {
        return Err(Error::NoSpace);
    }

    let inode_bitmap = 1;
    let block_bitmap = inode_bitmap + inode_bitmap_blocks;
    let inode_table = block_bitmap + block_bitmap_blocks;

    // Reserve inode 0 and the root inode; mark every metadata block used.
    let inode_bits =
        &mut image[inode_bitmap as usize * BLOCK_SIZE..][..inode_bitmap_blocks as usize * BLOCK_SIZE];
    bitmap::fill_prefix(inode_bits, 2);
    let block_bits =
        &mut image[block_bitmap as usize * BLOCK_SIZE..][..block_bitmap_blocks as usize * BLOCK_SIZE];
    bitmap::fill_prefix(block_bits, reserved);

    // Create the empty root directory. Only the inode is needed: an empty
    // file owns no blocks.
    let root_off = inode_table as usize * BLOCK_SIZE + ROOT_INO as usize * size_of::<Inode>();
    let root = unsafe { &mut *(image[root_off..].as_mut_ptr() as *mut Inode) };
    *root = unsafe { std::mem::zeroed() };
    root.mode = libc::S_IFDIR;
    root.links = 2;
    root.mtime = util::timestamp();

    let sb = unsafe { &mut *(image.as_mut_ptr() as *mut Superblock) };
    *sb = Superblock {
        magic: MAGIC,
        state: STATE_VALID,
        size: image.len() as u64,
        max_inodes_count: n_inodes,
        max_block_count,
        // Inode 0 is reserved in the bitmap but stays outside the counters:
        // only the root directory is accounted as in use.
        inodes_count: 1,
        blocks_count: reserved,
        free_inodes_count: n_inodes - 1,
        free_blocks_count: max_block_count - reserved,
        inode_bitmap,
        block_bitmap,
        inode_table,
        inode_size: size_of::<Inode>() as u32,
    };
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Fs;

    #[test]
    fn format_geometry() {
        // 256 blocks, 32 inodes: one block for each bitmap, one for the
        // inode table.
        let mut img = vec![0u8; 256 * BLOCK_SIZE];
        format(&mut img, 32).unwrap();
        let fs = Fs::open(&mut img).unwrap();
        let st = fs.statfs();
        assert_eq!(st.blocks, 256);
        assert_eq!(st.files, 1);
        assert_eq!(st.files_free, 31);
        assert_eq!(st.blocks_free, 256 - 4);
        assert_eq!(st.block_size, BLOCK_SIZE as u32);
        assert_eq!(st.name_max, crate::NAME_MAX as u32);
    }

    #[test]
    fn root_is_an_empty_directory() {
        let mut img = vec![0u8; 64 * BLOCK_SIZE];
        format(&mut img, 16).unwrap();
        let fs = Fs::open(&mut img).unwrap();
        let attr = fs.getattr("/").unwrap();
        assert_eq!(attr.ino, 1);
        assert_eq!(attr.links, 2);
        assert_eq!(attr.size, 0);
        assert_eq!(attr.blocks, 0);
        assert!(attr.mode & libc::S_IFMT == libc::S_IFDIR);
    }

    #[test]
    fn rejects_bad_geometry() {
        // Not a multiple of the block size.
        let mut img = vec![0u8; BLOCK_SIZE + 1];
        assert_eq!(format(&mut img, 8), Err(Error::InvalidImage));
        // Metadata alone outgrows the image.
        let mut img = vec![0u8; 2 * BLOCK_SIZE];
        assert_eq!(format(&mut img, 1024), Err(Error::NoSpace));
        let mut img = vec![0u8; 8 * BLOCK_SIZE];
        assert_eq!(format(&mut img, 0), Err(Error::InvalidImage));
    }

    #[test]
    fn detects_existing_filesystem() {
        let mut img = vec![0u8; 16 * BLOCK_SIZE];
        assert!(!is_present(&img));
        format(&mut img, 8).unwrap();
        assert!(is_present(&img));
        img[0] ^= 0xff;
        assert!(!is_present(&img));
    }
}
