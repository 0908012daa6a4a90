// src/filesystem/copy.rs

//! File operations used while moving container state
//!
//! Copies go through `cp -a` so ownership, modes, timestamps, device nodes
//! and extended attributes of the container's files survive unchanged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Upper bound for engine config files read from disk
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Make sure `path` is a regular-sized file and not a directory
pub fn check_file_valid(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| Error::InvalidFile {
        path: path.to_path_buf(),
        reason: format!("stat failed: {}", e),
    })?;

    if metadata.is_dir() {
        return Err(Error::InvalidFile {
            path: path.to_path_buf(),
            reason: "should not be a directory".to_string(),
        });
    }
    if metadata.len() > MAX_FILE_SIZE {
        return Err(Error::InvalidFile {
            path: path.to_path_buf(),
            reason: format!("larger than {} bytes", MAX_FILE_SIZE),
        });
    }
    Ok(())
}

/// Archive-copy `src` to `dest` with `cp -a`
///
/// With `recursive` set the copy uses `cp -ra`; when `dest` is an existing
/// directory `src` lands inside it under its own name, merging with any
/// directory already there.
pub async fn archive_copy(src: &Path, dest: &Path, recursive: bool) -> Result<()> {
    let flags = if recursive { "-ra" } else { "-a" };
    debug!("cp {} {} {}", flags, src.display(), dest.display());

    let output = Command::new("cp")
        .arg(flags)
        .arg(src)
        .arg(dest)
        .output()
        .await
        .map_err(|e| Error::CommandFailed {
            command: format!("cp {}", flags),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: format!("cp {} {} {}", flags, src.display(), dest.display()),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Remove a file or directory tree; a missing path is not an error
pub async fn remove_all(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Write `data` to a file that must not exist yet, with the given mode
pub fn write_new_file(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::AlreadyExists(format!("{} already exist", path.display()))
            }
            _ => Error::Io(e),
        })?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
