//! Simulation of a small UNIX-style indexed filesystem.
//!
//! A regular file plays the role of the block device: it holds a densely
//! packed image made of a superblock, a block usage bitmap, an inode
//! table, the root inode index and the data blocks. The library creates
//! such an image and inserts, removes, renames and relocates files and
//! directories inside it.
//!
//! Every mutating operation follows the same pattern: load the whole
//! image, validate, mutate in memory, recompute the bitmap from the
//! inode table and rewrite the image. The output is deterministic down
//! to the last byte, so two identical operation sequences always produce
//! identical images.

mod alloc;
mod dir;
mod error;
mod image;
mod path;

pub use error::Error;
pub use error::Result;

use image::Image;
use image::Inode;
use image::BLOCK_SLOTS;
use image::NAME_LEN;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use zerocopy::FromZeros;

/// Opens an existing image for reading and writing.
fn open_image(path: &Path) -> Result<File> {
	let file = OpenOptions::new().read(true).write(true).open(path)?;

	Ok(file)
}

/// Checks that `path` is absolute and has a nonempty last component.
fn check_entry_path(path: &str) -> Result<()> {
	if !path.starts_with('/') || path::leaf_name(path).is_empty() {
		return Err(Error::InvalidPath(path.to_owned()));
	}

	Ok(())
}

/// Checks that `name` fits an inode name field and is not taken yet.
fn check_new_name(image: &Image, name: &str) -> Result<()> {
	if name.len() > NAME_LEN {
		return Err(Error::NameTooLong(name.to_owned()));
	}
	if image.lookup(name).is_some() {
		return Err(Error::DuplicateName(name.to_owned()));
	}

	Ok(())
}

/// Resolves the parent component of `path` to an inode index.
fn resolve_parent(image: &Image, path: &str) -> Result<usize> {
	let name = path::parent_name(path);

	let parent = image
		.lookup(name)
		.ok_or_else(|| Error::NotFound(name.to_owned()))?;
	if image.inodes[parent].is_dir != 1 {
		return Err(Error::NotADirectory(name.to_owned()));
	}

	Ok(parent)
}

/// Creates a new filesystem image at `fs_path`, overwriting any previous
/// content.
///
/// The image starts with the root directory alone: inode 0 owns block 0,
/// the bitmap has only bit 0 set and every data block is zeroed.
pub fn init_fs(
	fs_path: impl AsRef<Path>,
	block_size: u8,
	num_blocks: u8,
	num_inodes: u8,
) -> Result<()> {
	if block_size == 0 || num_blocks == 0 || num_inodes == 0 {
		return Err(Error::InvalidGeometry);
	}

	let mut file = OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.truncate(true)
		.open(fs_path.as_ref())?;

	Image::new(block_size, num_blocks, num_inodes).store(&mut file)
}

/// Adds the file at `file_path` with the given content to an initialized
/// image.
///
/// The lowest free inode slot and the lowest free data blocks are used.
/// The content is laid out over `ceil(len / block_size)` blocks, the
/// last one NUL-padded, and their indices fill the inode's nine block
/// slots in order. The parent directory gains one entry.
pub fn add_file(fs_path: impl AsRef<Path>, file_path: &str, content: &[u8]) -> Result<()> {
	let mut file = open_image(fs_path.as_ref())?;
	let mut image = Image::load(&mut file)?;

	check_entry_path(file_path)?;
	let name = path::leaf_name(file_path);
	check_new_name(&image, name)?;
	let parent = resolve_parent(&image, file_path)?;

	let index = alloc::first_free_inode(&image).ok_or(Error::NoFreeInode)?;

	let count = content.len().div_ceil(image.block_size as usize);
	if count > BLOCK_SLOTS || content.len() > u8::MAX as usize {
		return Err(Error::FileTooLarge(content.len()));
	}
	let blocks = alloc::first_n_free_blocks(&image, count).ok_or(Error::NoFreeBlocks)?;

	for (chunk, blk) in content.chunks(image.block_size as usize).zip(&blocks) {
		let block = &mut image.blocks[*blk as usize];
		block[..chunk.len()].copy_from_slice(chunk);
		block[chunk.len()..].fill(0);
	}

	let inode = &mut image.inodes[index];
	inode.is_used = 1;
	inode.is_dir = 0;
	inode.set_name(name);
	inode.size = content.len() as u8;
	for i in 0..BLOCK_SLOTS {
		inode.set_block_slot(i, 0);
	}
	for (i, blk) in blocks.iter().enumerate() {
		inode.set_block_slot(i, *blk);
	}

	dir::insert_entry(&mut image, parent, index as u8)?;
	image.inodes[parent].size += 1;

	image.rederive_bitmap();
	image.store(&mut file)
}

/// Adds the directory at `dir_path` to an initialized image.
///
/// Behaves like [`add_file`] with empty content, except that the new
/// directory owns exactly one data block for its future entries. The
/// block stays zeroed until children arrive.
pub fn add_dir(fs_path: impl AsRef<Path>, dir_path: &str) -> Result<()> {
	let mut file = open_image(fs_path.as_ref())?;
	let mut image = Image::load(&mut file)?;

	check_entry_path(dir_path)?;
	let name = path::leaf_name(dir_path);
	check_new_name(&image, name)?;
	let parent = resolve_parent(&image, dir_path)?;

	let index = alloc::first_free_inode(&image).ok_or(Error::NoFreeInode)?;
	let blocks = alloc::first_n_free_blocks(&image, 1).ok_or(Error::NoFreeBlocks)?;

	let inode = &mut image.inodes[index];
	inode.is_used = 1;
	inode.is_dir = 1;
	inode.set_name(name);
	inode.size = 0;
	for i in 0..BLOCK_SLOTS {
		inode.set_block_slot(i, 0);
	}
	inode.direct_blocks[0] = blocks[0];

	dir::insert_entry(&mut image, parent, index as u8)?;
	image.inodes[parent].size += 1;

	image.rederive_bitmap();
	image.store(&mut file)
}

/// Removes the entry at `entry_path` from an initialized image.
///
/// The entry is treated as a file when the path contains a `.` anywhere,
/// and as a directory otherwise. Removing a nonempty directory fails
/// without touching the image.
///
/// The inode is zeroed, the data blocks it referenced are zeroed, the
/// parent loses the child entry and the freed blocks drop out of the
/// recomputed bitmap.
pub fn remove(fs_path: impl AsRef<Path>, entry_path: &str) -> Result<()> {
	let mut file = open_image(fs_path.as_ref())?;
	let mut image = Image::load(&mut file)?;

	check_entry_path(entry_path)?;
	let name = path::leaf_name(entry_path);
	let index = image
		.lookup(name)
		.ok_or_else(|| Error::NotFound(name.to_owned()))?;
	let parent = resolve_parent(&image, entry_path)?;

	// A `.` anywhere in the path marks a file; only dot-less paths get
	// the directory treatment.
	if !entry_path.contains('.') && image.inodes[index].size != 0 {
		return Err(Error::DirectoryNotEmpty);
	}

	let freed: Vec<u8> = image.inodes[index].referenced_blocks().collect();

	dir::remove_entry(&mut image, parent, index as u8);
	image.inodes[parent].size -= 1;
	image.inodes[index] = Inode::new_zeroed();
	for blk in freed {
		image.blocks[blk as usize].fill(0);
	}

	image.rederive_bitmap();
	image.store(&mut file)
}

/// Renames or relocates the entry at `old_path` to `new_path`.
///
/// When both paths share their parent this is a pure rename: the name
/// field is overwritten and only the inode table region is rewritten.
/// Otherwise the entry is unlinked from the old parent, linked into the
/// new parent's directory block and renamed, and the whole image is
/// rewritten.
pub fn move_entry(fs_path: impl AsRef<Path>, old_path: &str, new_path: &str) -> Result<()> {
	let mut file = open_image(fs_path.as_ref())?;
	let mut image = Image::load(&mut file)?;

	check_entry_path(old_path)?;
	check_entry_path(new_path)?;

	let old_name = path::leaf_name(old_path);
	let index = image
		.lookup(old_name)
		.ok_or_else(|| Error::NotFound(old_name.to_owned()))?;

	let name = path::leaf_name(new_path);
	if name.len() > NAME_LEN {
		return Err(Error::NameTooLong(name.to_owned()));
	}
	// Renaming an entry to its own name is not a collision
	if image.lookup(name).is_some_and(|other| other != index) {
		return Err(Error::DuplicateName(name.to_owned()));
	}

	if path::parent_name(old_path) == path::parent_name(new_path) {
		image.inodes[index].set_name(name);

		return image.store_inode_table(&mut file);
	}

	let old_parent = resolve_parent(&image, old_path)?;
	let new_parent = resolve_parent(&image, new_path)?;
	if !dir::has_free_slot(&image, new_parent) {
		return Err(Error::DirectoryFull);
	}

	dir::remove_entry(&mut image, old_parent, index as u8);
	image.inodes[old_parent].size -= 1;
	dir::insert_entry(&mut image, new_parent, index as u8)?;
	image.inodes[new_parent].size += 1;
	image.inodes[index].set_name(name);

	image.rederive_bitmap();
	image.store(&mut file)
}
