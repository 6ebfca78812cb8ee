//! Module handling directory entries.
//!
//! A directory entry is a single byte holding the child's inode index.
//! Entries fill the directory's data block(s) as a contiguous prefix,
//! with a 0x00 tail. The terminator is unambiguous: inode 0 is the root
//! and is never anyone's child.

use crate::error::Error;
use crate::error::Result;
use crate::image::Image;
use crate::image::ROOT_BLOCK;
use crate::image::ROOT_INODE;
use std::cmp::min;

/// Returns the ordered list of data blocks holding the entries of the
/// directory at inode `dir`.
///
/// The root owns block 0 through its zero `DIRECT_BLOCKS[0]`, so for the
/// root the list starts with block 0. Nonzero direct block entries
/// follow in slot order for every directory.
pub fn block_list(image: &Image, dir: usize) -> Vec<u8> {
	let inode = &image.inodes[dir];

	let mut blocks = Vec::new();
	if dir == ROOT_INODE {
		blocks.push(ROOT_BLOCK);
	}
	blocks.extend(inode.direct_blocks.iter().copied().filter(|blk| *blk != 0));

	blocks
}

/// Tells whether the directory at inode `dir` still has room for an
/// entry in its first data block.
pub fn has_free_slot(image: &Image, dir: usize) -> bool {
	let block = image.inodes[dir].direct_blocks[0] as usize;

	image.blocks[block].contains(&0)
}

/// Appends the child inode index `child` at the first 0x00 byte of the
/// directory's first data block.
///
/// Only `DIRECT_BLOCKS[0]` is consulted, which caps a directory at
/// `block_size` entries.
pub fn insert_entry(image: &mut Image, parent: usize, child: u8) -> Result<()> {
	let block = image.inodes[parent].direct_blocks[0] as usize;

	let slot = image.blocks[block]
		.iter()
		.position(|b| *b == 0)
		.ok_or(Error::DirectoryFull)?;
	image.blocks[block][slot] = child;

	Ok(())
}

/// Removes the entry holding `child` from the directory at inode
/// `parent`, keeping the remaining entries contiguous.
///
/// Unless the entry is the last one, every survivor after it is shifted
/// left by one position; the vacated last position becomes 0x00. The
/// shift runs across all of the directory's blocks in order. The entry
/// count is taken from the parent's size field, which the caller must
/// not have decremented yet.
pub fn remove_entry(image: &mut Image, parent: usize, child: u8) {
	let block_size = image.block_size as usize;

	let slots: Vec<(usize, usize)> = block_list(image, parent)
		.iter()
		.flat_map(|blk| (0..block_size).map(move |off| (*blk as usize, off)))
		.collect();
	let count = min(image.inodes[parent].size as usize, slots.len());
	if count == 0 {
		return;
	}

	let Some(at) = (0..count).find(|i| {
		let (blk, off) = slots[*i];
		image.blocks[blk][off] == child
	}) else {
		return;
	};

	for i in at..count - 1 {
		let (dst_blk, dst_off) = slots[i];
		let (src_blk, src_off) = slots[i + 1];
		image.blocks[dst_blk][dst_off] = image.blocks[src_blk][src_off];
	}

	let (last_blk, last_off) = slots[count - 1];
	image.blocks[last_blk][last_off] = 0;
}
