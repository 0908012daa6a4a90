// src/filesystem/path.rs

//! Path handling for container root filesystems
//!
//! Change records name paths as the container sees them (`/etc/hosts`).
//! They come from the source daemon, so they are sanitized before being
//! joined under a host-side rootfs directory. The join then resolves
//! symlinked parent directories as the container would, with the rootfs
//! as `/`, so a link such as `etc -> /` cannot lead outside it.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Symlinks followed in one join before giving up, as `ELOOP` does
const MAX_LINK_HOPS: usize = 40;

/// Turn a container-absolute path into a relative one
///
/// `.` components are dropped, leading slashes are stripped, and `..` is
/// rejected outright. An empty result (the container root itself) is an
/// error, since no change ever targets `/`.
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    let mut normalized = PathBuf::new();
    for component in Path::new(path_str.trim_start_matches('/')).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path_str.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "{} resolves to the container root",
            path_str
        )));
    }

    Ok(normalized)
}

/// Join a container-absolute path under a host-side rootfs directory
///
/// Parent components that are symlinks are followed inside `rootfs`:
/// absolute targets restart at the rootfs and `..` stops at it. The final
/// component is not followed, so copying or removing a link acts on the
/// link itself. Components that do not exist yet are joined as they are.
/// Other I/O errors while inspecting the rootfs are returned.
pub fn rootfs_join(rootfs: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let rootfs = rootfs.as_ref();
    let relative = sanitize_path(path.as_ref())?;

    let mut pending: VecDeque<OsString> = relative
        .components()
        .map(|c| c.as_os_str().to_os_string())
        .collect();
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(name) = pending.pop_front() {
        // Only link targets put `..` back; it climbs no higher than the rootfs
        if name == ".." {
            resolved.pop();
            continue;
        }
        if pending.is_empty() {
            resolved.push(name);
            break;
        }

        let candidate = rootfs.join(&resolved).join(&name);
        let target = match fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => fs::read_link(&candidate)?,
            Ok(_) => {
                resolved.push(name);
                continue;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                resolved.push(name);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        hops += 1;
        if hops > MAX_LINK_HOPS {
            return Err(Error::InvalidPath(format!(
                "too many levels of symbolic links in {}",
                path.as_ref().display()
            )));
        }

        if target.is_absolute() {
            resolved.clear();
        }
        for component in target.components().rev() {
            match component {
                Component::Normal(c) => pending.push_front(c.to_os_string()),
                Component::ParentDir => pending.push_front(OsString::from("..")),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
    }

    Ok(rootfs.join(resolved))
}
