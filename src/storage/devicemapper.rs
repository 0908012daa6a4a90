// src/storage/devicemapper.rs

//! Differential migration for devicemapper targets
//!
//! The new rootfs is a fresh thin device holding only the image. The source
//! daemon's diff of the container names what the writable layer changed;
//! the list is reduced to leaf operations and replayed onto the new device
//! while it is mounted.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::BaseStorage;
use crate::error::{Error, Result};
use crate::filesystem::{archive_copy, reduce_changes, remove_all, rootfs_join};
use crate::source::SourceEngine;
use crate::types::{ChangeKind, CommonConfig};

/// Replays the container diff onto a freshly allocated device
pub struct DeviceMapperDriver {
    base: BaseStorage,
    source: Arc<dyn SourceEngine>,
}

impl DeviceMapperDriver {
    pub fn new(base: BaseStorage, source: Arc<dyn SourceEngine>) -> Self {
        Self { base, source }
    }

    pub fn base(&self) -> &BaseStorage {
        &self.base
    }

    /// Mount the new rootfs, apply the diff, and always unmount again
    ///
    /// An unmount failure is logged and does not fail the migration.
    pub async fn transform_rw_layer(&self, container: &CommonConfig, old_rootfs: &str) -> Result<()> {
        let id = container.id.as_str();
        self.base.mount_rootfs(id).await?;

        let result = self.apply_changes(container, old_rootfs).await;

        if let Err(e) = self.base.unmount_rootfs(id).await {
            warn!("device mapper umount rootfs of {} failed: {}", id, e);
        }
        result
    }

    async fn apply_changes(&self, container: &CommonConfig, old_rootfs: &str) -> Result<()> {
        let diff = self.source.changes(&container.id).await?;
        let changes = reduce_changes(&diff, &container.mount_points);
        info!(
            "device mapper driver got {} changes for {}, applying {}",
            diff.len(),
            container.id,
            changes.len()
        );

        for change in &changes {
            let src = rootfs_join(old_rootfs, &change.path)?;
            let dest = rootfs_join(&container.base_fs, &change.path)?;

            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    let parent = dest.parent().ok_or_else(|| {
                        Error::InvalidPath(format!("{} has no parent", dest.display()))
                    })?;
                    tokio::fs::create_dir_all(parent).await?;
                    if let Err(e) = archive_copy(&src, parent, true).await {
                        error!("device mapper copy {} to {} failed: {}", src.display(), dest.display(), e);
                        return Err(e);
                    }
                }
                ChangeKind::Deleted => {
                    if let Err(e) = remove_all(&dest).await {
                        error!("device mapper remove {} failed: {}", dest.display(), e);
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }
}
