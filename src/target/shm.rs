// src/target/shm.rs

//! Shared-memory mount of a bundle
//!
//! Every container gets a private tmpfs at `<bundle>/mounts/shm` which the
//! runtime spec binds over `/dev/shm`.

use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use async_trait::async_trait;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use tracing::debug;

use crate::error::{Error, Result};

/// Mode of the directories leading to the mount point
const MOUNTS_DIR_MODE: u32 = 0o700;

/// Mount options of a shm tmpfs of `size` bytes
pub fn shm_options(size: i64) -> String {
    format!("mode=1777,size={}", size)
}

/// Creates and removes shm mounts
#[async_trait]
pub trait ShmMounter: Send + Sync {
    /// Create `path` and mount a tmpfs of `size` bytes on it
    async fn mount(&self, path: &Path, size: i64) -> Result<()>;

    /// Lazily detach the mount at `path`
    async fn unmount(&self, path: &Path) -> Result<()>;
}

/// Kernel tmpfs mounts
#[derive(Debug, Default, Clone, Copy)]
pub struct TmpfsMounter;

#[async_trait]
impl ShmMounter for TmpfsMounter {
    async fn mount(&self, path: &Path, size: i64) -> Result<()> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(MOUNTS_DIR_MODE)
            .create(path)?;

        let options = shm_options(size);
        debug!("mount shm on {} ({})", path.display(), options);
        mount::<str, Path, str, str>(
            Some("shm"),
            path,
            Some("tmpfs"),
            MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
            Some(options.as_str()),
        )
        .map_err(|e| Error::Mount(format!("mount shm on {}: {}", path.display(), e)))
    }

    async fn unmount(&self, path: &Path) -> Result<()> {
        umount2(path, MntFlags::MNT_DETACH)
            .map_err(|e| Error::Mount(format!("umount {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use tokio::sync::Notify;

    /// Records mounts instead of performing them; the directory is still created
    #[derive(Default)]
    pub struct RecordingMounter {
        pub mounted: Mutex<Vec<(PathBuf, i64)>>,
        pub unmounted: Mutex<Vec<PathBuf>>,
        pub fail_mount: bool,
        /// Park `mount` on `release` after signalling `entered`
        pub hold_mount: bool,
        pub entered: Notify,
        pub release: Notify,
    }

    #[async_trait]
    impl ShmMounter for RecordingMounter {
        async fn mount(&self, path: &Path, size: i64) -> Result<()> {
            if self.fail_mount {
                return Err(Error::Mount(format!("mount shm on {}: EPERM", path.display())));
            }
            if self.hold_mount {
                self.entered.notify_one();
                self.release.notified().await;
            }
            std::fs::create_dir_all(path)?;
            self.mounted.lock().push((path.to_path_buf(), size));
            Ok(())
        }

        async fn unmount(&self, path: &Path) -> Result<()> {
            self.unmounted.lock().push(path.to_path_buf());
            Ok(())
        }
    }
}
