// src/storage/overlay.rs

//! Full-copy migration for overlay2 targets

use std::path::Path;

use tracing::info;

use super::BaseStorage;
use crate::error::Result;
use crate::filesystem::archive_copy;
use crate::types::CommonConfig;

/// Layer directory of an overlay rootfs (`<layer>/merged` -> `<layer>`)
fn layer_dir(rootfs: &str) -> &Path {
    Path::new(rootfs.strip_suffix("/merged").unwrap_or(rootfs))
}

/// Copies the whole upper directory of the old layer into the new one
pub struct OverlayDriver {
    base: BaseStorage,
}

impl OverlayDriver {
    pub fn new(base: BaseStorage) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BaseStorage {
        &self.base
    }

    /// Copy `<old layer>/diff` over `<new layer>/diff`
    pub async fn transform_rw_layer(&self, container: &CommonConfig, old_rootfs: &str) -> Result<()> {
        let src = layer_dir(old_rootfs).join("diff");
        let dest = layer_dir(&container.base_fs);

        info!(
            "overlay driver copying {} into {}",
            src.display(),
            dest.display()
        );
        archive_copy(&src, dest, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockImageService;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_layer_dir() {
        assert_eq!(layer_dir("/var/lib/docker/overlay2/abc/merged"), Path::new("/var/lib/docker/overlay2/abc"));
        assert_eq!(layer_dir("/plain"), Path::new("/plain"));
    }

    #[tokio::test]
    async fn test_transform_copies_upper_dir() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("docker/abc");
        fs::create_dir_all(old.join("diff/root")).unwrap();
        fs::write(old.join("diff/root/add"), "added").unwrap();
        fs::create_dir_all(old.join("merged")).unwrap();
        let new = temp.path().join("isulad/xyz");
        fs::create_dir_all(new.join("diff/etc")).unwrap();
        fs::write(new.join("diff/etc/keep"), "kept").unwrap();

        let driver = OverlayDriver::new(BaseStorage::new(Arc::new(MockImageService::default())));
        let container = CommonConfig {
            base_fs: format!("{}/merged", new.display()),
            ..Default::default()
        };
        driver
            .transform_rw_layer(&container, &format!("{}/merged", old.display()))
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(new.join("diff/root/add")).unwrap(), "added");
        assert_eq!(fs::read_to_string(new.join("diff/etc/keep")).unwrap(), "kept");
    }
}
