// src/storage/mod.rs

//! Storage migration
//!
//! A container's writable layer has to end up in a root filesystem owned by
//! the target engine. How it gets there depends on the target's storage
//! backend:
//!
//! - **overlay2** ([`OverlayDriver`]): the new rootfs is an overlay whose
//!   upper directory can take the old upper directory wholesale.
//! - **devicemapper** ([`DeviceMapperDriver`]): the new rootfs is a thin
//!   device; only the paths the source daemon reports as changed are copied.
//!
//! Both share [`BaseStorage`], the calls into the target image store.

mod devicemapper;
mod image;
mod overlay;

pub use devicemapper::DeviceMapperDriver;
pub use image::{ExecImageService, ImageReply, ImageService, PrepareReply};
pub use overlay::OverlayDriver;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::StorageBackend;
use crate::error::{Error, Result};
use crate::source::SourceEngine;
use crate::types::CommonConfig;

/// Image store operations shared by every driver
#[derive(Clone)]
pub struct BaseStorage {
    images: Arc<dyn ImageService>,
}

impl BaseStorage {
    pub fn new(images: Arc<dyn ImageService>) -> Self {
        Self { images }
    }

    /// Allocate the new root filesystem of `id`
    ///
    /// If the store reports an error the half-prepared container is removed
    /// again on a best-effort basis.
    pub async fn generate_rootfs(&self, id: &str, image: &str) -> Result<PathBuf> {
        let reply = self.images.prepare(id, image).await?;

        if let Some(msg) = reply.error() {
            match self.images.remove(id).await {
                Ok(r) => info!("image store remove container {}: {:?}", id, r.error()),
                Err(e) => info!("image store remove container {}: {}", id, e),
            }
            return Err(Error::ImageService(format!("prepare rootfs failed: {}", msg)));
        }
        if reply.mount_point.is_empty() {
            return Err(Error::ImageService(
                "image store returned an empty rootfs".to_string(),
            ));
        }

        Ok(PathBuf::from(reply.mount_point))
    }

    /// Release the rootfs of `id`; failures are only logged
    pub async fn cleanup_rootfs(&self, id: &str) {
        let result = self.images.remove(id).await;
        match result.as_ref().map(ImageReply::error) {
            Ok(None) => info!("remove container {}'s rootfs successful", id),
            Ok(Some(msg)) => warn!("remove container {}'s rootfs: {}", id, msg),
            Err(e) => warn!("remove container {}'s rootfs: {}", id, e),
        }
    }

    pub async fn mount_rootfs(&self, id: &str) -> Result<()> {
        let reply = self.images.mount(id).await?;
        match reply.error() {
            Some(msg) => Err(Error::ImageService(format!(
                "mount container {}'s rootfs failed: {}",
                id, msg
            ))),
            None => Ok(()),
        }
    }

    /// Unmount the rootfs of `id`, retrying once with force
    pub async fn unmount_rootfs(&self, id: &str) -> Result<()> {
        let reply = self.images.unmount(id, false).await?;
        let Some(msg) = reply.error() else {
            return Ok(());
        };

        let forced = self.images.unmount(id, true).await;
        info!("image store force umount container {}: {:?}", id, forced);
        match forced {
            Ok(r) if r.error().is_none() => Ok(()),
            _ => Err(Error::ImageService(format!(
                "umount container {}'s rootfs failed: {}",
                id, msg
            ))),
        }
    }
}

/// Storage driver selected from the target engine's backend
pub enum StorageDriver {
    Overlay(OverlayDriver),
    DeviceMapper(DeviceMapperDriver),
}

impl StorageDriver {
    /// Build the driver for `backend`
    ///
    /// The source engine is only consulted by the differential driver.
    pub fn new(
        backend: StorageBackend,
        images: Arc<dyn ImageService>,
        source: Arc<dyn SourceEngine>,
    ) -> Self {
        let base = BaseStorage::new(images);
        match backend {
            StorageBackend::Overlay2 => Self::Overlay(OverlayDriver::new(base)),
            StorageBackend::DeviceMapper => {
                Self::DeviceMapper(DeviceMapperDriver::new(base, source))
            }
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Overlay(_) => StorageBackend::Overlay2,
            Self::DeviceMapper(_) => StorageBackend::DeviceMapper,
        }
    }

    fn base(&self) -> &BaseStorage {
        match self {
            Self::Overlay(d) => d.base(),
            Self::DeviceMapper(d) => d.base(),
        }
    }

    /// Allocate the target rootfs of `id`
    pub async fn generate_rootfs(&self, id: &str, image: &str) -> Result<PathBuf> {
        self.base().generate_rootfs(id, image).await
    }

    /// Replicate the writable layer from `old_rootfs` into `container.base_fs`
    pub async fn transform_rw_layer(&self, container: &CommonConfig, old_rootfs: &str) -> Result<()> {
        match self {
            Self::Overlay(d) => d.transform_rw_layer(container, old_rootfs).await,
            Self::DeviceMapper(d) => d.transform_rw_layer(container, old_rootfs).await,
        }
    }

    /// Undo [`generate_rootfs`](Self::generate_rootfs); never fails
    pub async fn cleanup(&self, id: &str) {
        self.base().cleanup_rootfs(id).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockImageService;
    use super::*;

    #[tokio::test]
    async fn test_generate_rootfs() {
        let images = Arc::new(MockImageService::with_mount_point("/isulad/merged"));
        let base = BaseStorage::new(images.clone());

        let rootfs = base.generate_rootfs("c1", "busybox").await.unwrap();
        assert_eq!(rootfs, PathBuf::from("/isulad/merged"));
        assert_eq!(images.calls(), vec!["prepare c1 busybox"]);
    }

    #[tokio::test]
    async fn test_generate_rootfs_error_removes_container() {
        let images = Arc::new(MockImageService {
            prepare_error: Some("no space".to_string()),
            ..Default::default()
        });
        let base = BaseStorage::new(images.clone());

        let err = base.generate_rootfs("c1", "busybox").await.unwrap_err();
        assert!(err.to_string().contains("no space"));
        assert_eq!(images.calls(), vec!["prepare c1 busybox", "remove c1"]);
    }

    #[tokio::test]
    async fn test_generate_rootfs_empty_mount_point() {
        let images = Arc::new(MockImageService::default());
        let base = BaseStorage::new(images);
        assert!(base.generate_rootfs("c1", "busybox").await.is_err());
    }

    #[tokio::test]
    async fn test_unmount_retries_with_force() {
        let images = Arc::new(MockImageService::default());
        images.unmount_errors.lock().push("device busy".to_string());
        let base = BaseStorage::new(images.clone());

        base.unmount_rootfs("c1").await.unwrap();
        assert_eq!(
            images.calls(),
            vec!["umount c1 force=false", "umount c1 force=true"]
        );
    }

    #[tokio::test]
    async fn test_unmount_force_failure_reports_first_error() {
        let images = Arc::new(MockImageService::default());
        images.unmount_errors.lock().push("device busy".to_string());
        images.unmount_errors.lock().push("still busy".to_string());
        let base = BaseStorage::new(images);

        let err = base.unmount_rootfs("c1").await.unwrap_err();
        assert!(err.to_string().contains("device busy"));
    }

    #[tokio::test]
    async fn test_mount_error_is_reported() {
        let images = Arc::new(MockImageService {
            mount_error: Some("bad layer".to_string()),
            ..Default::default()
        });
        let base = BaseStorage::new(images);
        assert!(base.mount_rootfs("c1").await.is_err());
    }
}
