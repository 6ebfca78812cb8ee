//! Error types reported by filesystem image operations.

use std::io;
use thiserror::Error;

/// Result alias used by every image operation.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while mutating a filesystem image.
///
/// Validation errors are reported before anything is written, so the image
/// on disk is left untouched. An I/O error occurring mid-write leaves the
/// image in an undefined state.
#[derive(Debug, Error)]
pub enum Error {
	/// The image file could not be opened, read or written.
	#[error("image i/o failed: {0}")]
	Io(#[from] io::Error),
	/// Attempt to remove a directory which still has children.
	#[error("directory is not empty")]
	DirectoryNotEmpty,
	/// The entry name does not fit in the 10 bytes of an inode name field.
	#[error("name `{0}` is too long")]
	NameTooLong(String),
	/// The entry name is already present in the inode table.
	///
	/// Names are global to the image since inodes are resolved by a flat
	/// name scan.
	#[error("name `{0}` already exists")]
	DuplicateName(String),
	/// Every inode slot is allocated.
	#[error("no free inode")]
	NoFreeInode,
	/// Fewer free data blocks than the operation requires.
	#[error("no free blocks")]
	NoFreeBlocks,
	/// The content does not fit in the nine block slots of an inode, or its
	/// length overflows the one-byte size field.
	#[error("content of {0} bytes does not fit in an inode")]
	FileTooLarge(usize),
	/// No inode carries the given name.
	#[error("`{0}` not found")]
	NotFound(String),
	/// The resolved parent is a regular file.
	#[error("`{0}` is not a directory")]
	NotADirectory(String),
	/// The parent's directory block has no room left for a new entry.
	#[error("directory is full")]
	DirectoryFull,
	/// The path is not absolute or has an empty last component.
	#[error("invalid path `{0}`")]
	InvalidPath(String),
	/// A filesystem cannot be created with a zero block size, block count or
	/// inode count.
	#[error("invalid filesystem geometry")]
	InvalidGeometry,
}
