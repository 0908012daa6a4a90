// src/target/mod.rs

//! Target engine bundle
//!
//! Each transformed container gets a bundle directory under the runtime
//! path of the target engine:
//!
//! ```text
//! <graph>/engines/lcr/<id>/
//!     hostconfig.json   config.v2.json   config.json    (0640)
//!     hostname          hosts            resolv.conf    (0644)
//!     mounts/shm                                        (tmpfs)
//! ```
//!
//! Files are only ever created, never overwritten, so a half-finished
//! earlier attempt is detected instead of silently merged into.

mod runtime;
mod shm;

pub use runtime::{ExecRegistrar, RuntimeRegistrar};
pub use shm::{ShmMounter, TmpfsMounter, shm_options};


use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::error;

use crate::error::{Error, Result};
use crate::filesystem::{remove_all, write_new_file};
use crate::types::{HOSTCONFIG, NETWORK_FILES, OCICONFIG, V2CONFIG};

/// Mode of a bundle directory
const BUNDLE_DIR_MODE: u32 = 0o750;
/// Mode of the engine config files
const CONFIG_FILE_MODE: u32 = 0o640;
/// Mode of `hostname`, `hosts` and `resolv.conf`
const NETWORK_FILE_MODE: u32 = 0o644;

/// Serialize `value` as JSON indented with tabs
pub fn marshal_indent<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// File mode a bundle file is created with
fn file_mode(path: &Path) -> u32 {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if NETWORK_FILES.contains(&name) {
        NETWORK_FILE_MODE
    } else {
        CONFIG_FILE_MODE
    }
}

/// Bundle directories of the target engine
#[derive(Debug, Clone)]
pub struct IsuladLayout {
    runtime_path: PathBuf,
}

impl IsuladLayout {
    pub fn new(runtime_path: impl Into<PathBuf>) -> Self {
        Self {
            runtime_path: runtime_path.into(),
        }
    }

    /// Parent of every bundle directory
    pub fn runtime_path(&self) -> &Path {
        &self.runtime_path
    }

    pub fn bundle_dir(&self, id: &str) -> PathBuf {
        self.runtime_path.join(id)
    }

    pub fn host_config_path(&self, id: &str) -> PathBuf {
        self.bundle_dir(id).join(HOSTCONFIG)
    }

    pub fn v2_config_path(&self, id: &str) -> PathBuf {
        self.bundle_dir(id).join(V2CONFIG)
    }

    pub fn oci_config_path(&self, id: &str) -> PathBuf {
        self.bundle_dir(id).join(OCICONFIG)
    }

    /// Location of `hostname`, `hosts` or `resolv.conf` in the bundle
    pub fn network_file_path(&self, id: &str, file: &str) -> PathBuf {
        self.bundle_dir(id).join(file)
    }

    /// Create the bundle directory of `id`
    ///
    /// An existing directory means the container has been transformed
    /// already or another run is working on it.
    pub fn prepare_bundle_dir(&self, id: &str) -> Result<PathBuf> {
        let path = self.bundle_dir(id);
        if std::fs::symlink_metadata(&path).is_ok() {
            return Err(Error::AlreadyExists(format!(
                "directory {} already exists, container has been or is being transformed",
                path.display()
            )));
        }

        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(BUNDLE_DIR_MODE)
            .create(&path)?;
        Ok(path)
    }

    /// Serialize `value` into a new file at `path`
    pub fn save_config<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let data = marshal_indent(value)?;
        write_new_file(path, &data, file_mode(path)).inspect_err(|e| {
            error!("write config to file {} failed: {}", path.display(), e);
        })
    }

    /// Remove the bundle directory of `id` and everything in it
    pub async fn cleanup(&self, id: &str) -> Result<()> {
        remove_all(&self.bundle_dir(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_marshal_indent_uses_tabs() {
        let mut map = BTreeMap::new();
        map.insert("Runtime", "lcr");
        let data = marshal_indent(&map).unwrap();
        assert_eq!(String::from_utf8(data).unwrap(), "{\n\t\"Runtime\": \"lcr\"\n}");
    }

    #[test]
    fn test_prepare_bundle_dir_refuses_existing() {
        let temp = TempDir::new().unwrap();
        let layout = IsuladLayout::new(temp.path().join("engines/lcr"));

        let dir = layout.prepare_bundle_dir("abc").unwrap();
        assert!(dir.is_dir());

        let err = layout.prepare_bundle_dir("abc").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(err.to_string().contains("has been or is being transformed"));
    }

    #[test]
    fn test_save_config_modes_and_no_overwrite() {
        let temp = TempDir::new().unwrap();
        let layout = IsuladLayout::new(temp.path());
        layout.prepare_bundle_dir("abc").unwrap();

        let cfg = layout.host_config_path("abc");
        layout.save_config(&cfg, &serde_json::json!({"Runtime": "lcr"})).unwrap();
        let mode = fs::metadata(&cfg).unwrap().permissions().mode();
        assert_eq!(mode & 0o007, 0);

        let hosts = layout.network_file_path("abc", "hosts");
        layout.save_config(&hosts, "127.0.0.1 localhost").unwrap();
        let mode = fs::metadata(&hosts).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o600);

        assert!(matches!(
            layout.save_config(&cfg, &serde_json::json!({})),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_file_mode() {
        assert_eq!(file_mode(Path::new("/b/resolv.conf")), NETWORK_FILE_MODE);
        assert_eq!(file_mode(Path::new("/b/config.json")), CONFIG_FILE_MODE);
    }

    #[tokio::test]
    async fn test_cleanup_removes_bundle() {
        let temp = TempDir::new().unwrap();
        let layout = IsuladLayout::new(temp.path());
        layout.prepare_bundle_dir("abc").unwrap();
        fs::write(layout.oci_config_path("abc"), "{}").unwrap();

        layout.cleanup("abc").await.unwrap();
        assert!(!layout.bundle_dir("abc").exists());
        layout.cleanup("abc").await.unwrap();
    }
}
