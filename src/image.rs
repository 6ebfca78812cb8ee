//! Module handling the on-disk image layout.
//!
//! The image is a contiguous byte sequence: a three byte superblock
//! (block size, block count, inode count), the block usage bitmap, the
//! inode table, the root inode index and the data block region. Every
//! field is a single byte, so there are no endianness concerns.

use crate::alloc;
use crate::error::Result;
use std::cmp::min;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use zerocopy::transmute;
use zerocopy::FromBytes;
use zerocopy::FromZeros;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// The size of an inode record in bytes.
pub const INODE_SIZE: usize = 22;
/// The size of the name field of an inode in bytes.
pub const NAME_LEN: usize = 10;
/// The number of block slots on an inode, all three levels included.
pub const BLOCK_SLOTS: usize = 9;
/// The index of the root inode.
pub const ROOT_INODE: usize = 0;
/// The data block reserved for the root directory.
pub const ROOT_BLOCK: u8 = 0;

/// An inode record as stored in the inode table.
///
/// The three block index arrays are used in order as plain direct
/// extensions: no indirection block is ever dereferenced. A zero entry
/// means "no block", which is unambiguous because block 0 is reserved
/// for the root directory.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct Inode {
	/// Nonzero if the slot is allocated.
	pub is_used: u8,
	/// Nonzero if the inode is a directory.
	pub is_dir: u8,
	/// The entry name, NUL-padded on the right.
	pub name: [u8; NAME_LEN],
	/// For a file, the content length in bytes. For a directory, the
	/// number of children.
	pub size: u8,
	/// Direct block indices.
	pub direct_blocks: [u8; 3],
	/// Indirect block indices.
	pub indirect_blocks: [u8; 3],
	/// Double indirect block indices.
	pub double_indirect_blocks: [u8; 3],
}

impl Inode {
	/// Returns the name, trimmed at the first NUL byte.
	pub fn name(&self) -> &[u8] {
		let end = self.name.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
		&self.name[..end]
	}

	/// Writes `name` into the name field, padding the remainder with NUL
	/// bytes. Anything beyond the field size is cut off.
	pub fn set_name(&mut self, name: &str) {
		let bytes = name.as_bytes();
		let len = min(bytes.len(), NAME_LEN);

		self.name.fill(0);
		self.name[..len].copy_from_slice(&bytes[..len]);
	}

	/// Returns the block index stored in slot `i` of the nine slots, in
	/// direct, indirect, double indirect order.
	pub fn block_slot(&self, i: usize) -> u8 {
		match i {
			0..=2 => self.direct_blocks[i],
			3..=5 => self.indirect_blocks[i - 3],
			_ => self.double_indirect_blocks[i - 6],
		}
	}

	/// Sets slot `i` of the nine block slots to `blk`.
	pub fn set_block_slot(&mut self, i: usize, blk: u8) {
		match i {
			0..=2 => self.direct_blocks[i] = blk,
			3..=5 => self.indirect_blocks[i - 3] = blk,
			_ => self.double_indirect_blocks[i - 6] = blk,
		}
	}

	/// Returns an iterator over the blocks referenced by the inode, that
	/// is the nonzero entries of the three block index arrays.
	pub fn referenced_blocks(&self) -> impl Iterator<Item = u8> + '_ {
		self.direct_blocks
			.iter()
			.chain(self.indirect_blocks.iter())
			.chain(self.double_indirect_blocks.iter())
			.copied()
			.filter(|blk| *blk != 0)
	}
}

/// Returns the size of the bitmap in bytes for `num_blocks` data blocks.
pub fn bitmap_len(num_blocks: u8) -> usize {
	(num_blocks as usize).div_ceil(8)
}

/// In-memory mirror of a filesystem image.
pub struct Image {
	/// The size of a data block in bytes.
	pub block_size: u8,
	/// The total number of data blocks.
	pub num_blocks: u8,
	/// The total number of inode slots.
	pub num_inodes: u8,

	/// The block usage bitmap, bit `i` of byte `i / 8` telling whether
	/// block `i` is in use.
	pub bitmap: Vec<u8>,
	/// The inode table.
	pub inodes: Vec<Inode>,
	/// The index of the root inode, always 0.
	pub root: u8,
	/// The data blocks.
	pub blocks: Vec<Vec<u8>>,
}

impl Image {
	/// Creates a freshly initialized image.
	///
	/// Only the root inode is allocated. It owns block 0, has no children
	/// and every data block is zeroed.
	pub fn new(block_size: u8, num_blocks: u8, num_inodes: u8) -> Self {
		let mut bitmap = vec![0; bitmap_len(num_blocks)];
		bitmap[0] = 0x01;

		let mut inodes = vec![Inode::new_zeroed(); num_inodes as usize];
		let root = &mut inodes[ROOT_INODE];
		root.is_used = 1;
		root.is_dir = 1;
		root.set_name("/");

		Self {
			block_size,
			num_blocks,
			num_inodes,

			bitmap,
			inodes,
			root: ROOT_INODE as u8,
			blocks: vec![vec![0; block_size as usize]; num_blocks as usize],
		}
	}

	/// Reads a whole image from `file`, region by region, using the sizes
	/// found in the superblock.
	pub fn load(file: &mut File) -> Result<Self> {
		file.seek(SeekFrom::Start(0))?;

		let mut superblock = [0u8; 3];
		file.read_exact(&mut superblock)?;
		let [block_size, num_blocks, num_inodes] = superblock;

		let mut bitmap = vec![0; bitmap_len(num_blocks)];
		file.read_exact(&mut bitmap)?;

		let mut inodes = Vec::with_capacity(num_inodes as usize);
		for _ in 0..num_inodes {
			let mut buf = [0u8; INODE_SIZE];
			file.read_exact(&mut buf)?;

			let inode: Inode = transmute!(buf);
			inodes.push(inode);
		}

		let mut root = [0u8; 1];
		file.read_exact(&mut root)?;

		let mut blocks = Vec::with_capacity(num_blocks as usize);
		for _ in 0..num_blocks {
			let mut block = vec![0; block_size as usize];
			file.read_exact(&mut block)?;

			blocks.push(block);
		}

		Ok(Self {
			block_size,
			num_blocks,
			num_inodes,

			bitmap,
			inodes,
			root: root[0],
			blocks,
		})
	}

	/// Rewrites the whole image to `file`, every region in order.
	pub fn store(&self, file: &mut File) -> Result<()> {
		file.seek(SeekFrom::Start(0))?;

		file.write_all(&[self.block_size, self.num_blocks, self.num_inodes])?;
		file.write_all(&self.bitmap)?;
		for inode in &self.inodes {
			file.write_all(inode.as_bytes())?;
		}
		file.write_all(&[self.root])?;
		for block in &self.blocks {
			file.write_all(block)?;
		}

		Ok(())
	}

	/// Rewrites only the inode table region to `file`.
	///
	/// Used by a pure rename, which touches nothing else.
	pub fn store_inode_table(&self, file: &mut File) -> Result<()> {
		let off = 3 + self.bitmap.len() as u64;

		file.seek(SeekFrom::Start(off))?;
		for inode in &self.inodes {
			file.write_all(inode.as_bytes())?;
		}

		Ok(())
	}

	/// Returns the index of the first inode whose name equals `name`.
	///
	/// The scan is flat: directory membership plays no role, which is why
	/// names are global to the image. Free slots never match since their
	/// name field is zeroed.
	pub fn lookup(&self, name: &str) -> Option<usize> {
		self.inodes
			.iter()
			.position(|inode| inode.name() == name.as_bytes())
	}

	/// Recomputes the bitmap from the inode table.
	///
	/// Block 0 is always marked. Every other bit is set exactly when an
	/// allocated inode references the block. The bitmap is never edited
	/// incrementally: a transient inode state during a removal would
	/// otherwise leave stale bits behind.
	pub fn rederive_bitmap(&mut self) {
		let used = alloc::used_block_map(self);

		self.bitmap.fill(0);
		for (i, used) in used.iter().enumerate() {
			if *used {
				self.bitmap[i / 8] |= 1 << (i % 8);
			}
		}
	}
}
