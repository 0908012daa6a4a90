// src/filesystem/mod.rs

//! Filesystem operations for container transformation
//!
//! This module provides:
//! - A change-set trie that reduces a container diff to leaf operations
//! - Archive-preserving copies and removals of container content
//! - Size/type checks for engine config files and no-overwrite writes
//! - Path sanitization for joining container paths under a rootfs

mod changeset;
mod copy;
pub mod path;

pub use changeset::{ChangeSetTrie, NodeId, NodeOp, reduce_changes};
pub use copy::{MAX_FILE_SIZE, archive_copy, check_file_valid, remove_all, write_new_file};
pub use path::{rootfs_join, sanitize_path};
