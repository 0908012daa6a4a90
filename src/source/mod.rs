// src/source/mod.rs

//! Source engine access
//!
//! Two things are needed from the engine a container is moved away from:
//! its daemon (to pause the container and to list what its writable layer
//! changed) and its on-disk state (the three config files).

mod docker;

pub use docker::DockerClient;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::Result;
use crate::filesystem::check_file_valid;
use crate::types::{
    ContainerChange, DockerHostConfig, DockerV2Config, HOSTCONFIG, OCICONFIG, OciSpec, V2CONFIG,
};

/// Runtime whose state directory lists the running containers
pub const CONTAINERD_RUNTIME: &str = "io.containerd.runtime.v1.linux";
/// Namespace the source engine registers its containers under
pub const CONTAINERD_NAMESPACE: &str = "moby";

/// Daemon operations of the source engine
#[async_trait]
pub trait SourceEngine: Send + Sync {
    /// Suspend every process of the container
    ///
    /// Pausing a paused container fails with `Error::AlreadyPaused`.
    async fn pause(&self, id: &str) -> Result<()>;

    /// Paths changed in the container's writable layer
    async fn changes(&self, id: &str) -> Result<Vec<ContainerChange>>;
}

/// On-disk layout of the source engine
#[derive(Debug, Clone)]
pub struct DockerLayout {
    graph: PathBuf,
    state: PathBuf,
}

impl DockerLayout {
    pub fn new(graph: impl Into<PathBuf>, state: impl Into<PathBuf>) -> Self {
        Self {
            graph: graph.into(),
            state: state.into(),
        }
    }

    /// Directory holding one sub-directory per running container
    pub fn running_dir(&self) -> PathBuf {
        self.state
            .join("containerd/daemon")
            .join(CONTAINERD_RUNTIME)
            .join(CONTAINERD_NAMESPACE)
    }

    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.graph.join("containers").join(id)
    }

    pub fn host_config_path(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(HOSTCONFIG)
    }

    pub fn v2_config_path(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(V2CONFIG)
    }

    pub fn oci_config_path(&self, id: &str) -> PathBuf {
        self.running_dir().join(id).join(OCICONFIG)
    }

    pub fn load_host_config(&self, id: &str) -> Result<DockerHostConfig> {
        load_json(&self.host_config_path(id))
    }

    pub fn load_v2_config(&self, id: &str) -> Result<DockerV2Config> {
        load_json(&self.v2_config_path(id))
    }

    /// Runtime spec of a running container
    pub fn load_oci_spec(&self, id: &str) -> Result<OciSpec> {
        load_json(&self.oci_config_path(id))
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    check_file_valid(path)?;
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| {
        error!("can't parse {}: {}", path.display(), e);
        e.into()
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = DockerLayout::new("/var/lib/docker", "/var/run/docker");
        assert_eq!(
            layout.running_dir(),
            PathBuf::from("/var/run/docker/containerd/daemon/io.containerd.runtime.v1.linux/moby")
        );
        assert_eq!(
            layout.host_config_path("abc"),
            PathBuf::from("/var/lib/docker/containers/abc/hostconfig.json")
        );
        assert_eq!(
            layout.oci_config_path("abc"),
            PathBuf::from(
                "/var/run/docker/containerd/daemon/io.containerd.runtime.v1.linux/moby/abc/config.json"
            )
        );
    }

    #[test]
    fn test_load_host_config() {
        let temp = TempDir::new().unwrap();
        let layout = DockerLayout::new(temp.path().join("graph"), temp.path().join("state"));
        fs::create_dir_all(layout.container_dir("abc")).unwrap();
        fs::write(
            layout.host_config_path("abc"),
            r#"{"ShmSize": 1024, "LogConfig": {"Type": "syslog", "Config": {}}}"#,
        )
        .unwrap();

        let cfg = layout.load_host_config("abc").unwrap();
        assert_eq!(cfg.host.shm_size, 1024);
        assert_eq!(cfg.log_config.unwrap().driver, "syslog");
    }

    #[test]
    fn test_load_rejects_directory_and_bad_json() {
        let temp = TempDir::new().unwrap();
        let layout = DockerLayout::new(temp.path().join("graph"), temp.path().join("state"));
        fs::create_dir_all(layout.v2_config_path("abc")).unwrap();
        assert!(matches!(
            layout.load_v2_config("abc"),
            Err(Error::InvalidFile { .. })
        ));

        fs::create_dir_all(layout.container_dir("def")).unwrap();
        fs::write(layout.host_config_path("def"), "{not json").unwrap();
        assert!(matches!(layout.load_host_config("def"), Err(Error::Json(_))));
    }
}
