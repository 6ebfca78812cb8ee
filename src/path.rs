//! Module handling path decomposition.
//!
//! Paths are absolute, `/`-separated and carry no trailing slash. Only
//! the two outermost components matter to the operations: the leaf name
//! and the parent name. Both functions are pure.

/// Returns the component after the last `/` of `path`.
pub fn leaf_name(path: &str) -> &str {
	match path.rfind('/') {
		Some(i) => &path[i + 1..],
		None => path,
	}
}

/// Returns the substring between the first and the last `/` of `path`,
/// or `/` when that substring is empty.
///
/// For a nested path such as `/a/b/c` the result is `a/b`, which never
/// matches an inode name. Deeper nesting therefore resolves through the
/// innermost parent only when the path has exactly two components.
pub fn parent_name(path: &str) -> &str {
	let parent = match path.rfind('/') {
		Some(i) if i >= 1 => &path[1..i],
		_ => "",
	};

	if parent.is_empty() {
		"/"
	} else {
		parent
	}
}
