// src/config.rs

//! Transformation configuration
//!
//! Everything a run needs is collected into one [`TransformConfig`] that is
//! built once at startup and shared (behind an `Arc`) by the orchestrator,
//! the pipelines and the storage drivers.
//!
//! The target engine's settings come from its own daemon configuration file
//! (`/etc/isulad/daemon.json` by default); unset keys fall back to the
//! engine's defaults before validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filesystem::check_file_valid;

/// Default iSulad graph root
pub const DEFAULT_ISULAD_GRAPH: &str = "/var/lib/isulad";
/// Default iSulad state root
pub const DEFAULT_ISULAD_STATE: &str = "/var/run/isulad";
/// The only low-level runtime containers can be handed to
pub const DEFAULT_RUNTIME: &str = "lcr";
/// Default iSulad storage backend
pub const DEFAULT_STORAGE_DRIVER: &str = "overlay2";

/// Default Docker graph root
pub const DEFAULT_DOCKER_GRAPH: &str = "/var/lib/docker";
/// Default Docker execution state root
pub const DEFAULT_DOCKER_STATE: &str = "/var/run/docker";
/// Default Docker API socket
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Storage backend of the target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Layered backend; the whole upper directory is copied
    Overlay2,
    /// Block backend; only changed paths are copied
    DeviceMapper,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overlay2 => "overlay2",
            Self::DeviceMapper => "devicemapper",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overlay2" => Ok(Self::Overlay2),
            "devicemapper" => Ok(Self::DeviceMapper),
            other => Err(Error::Config(format!("not support storage driver: {}", other))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings read from the iSulad daemon configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub graph: String,
    pub state: String,
    #[serde(rename = "default-runtime")]
    pub runtime: String,
    #[serde(rename = "log-level")]
    pub log_level: String,
    #[serde(rename = "log-driver")]
    pub log_driver: String,
    #[serde(rename = "storage-driver")]
    pub storage_driver: String,
    #[serde(rename = "storage-opts")]
    pub storage_opts: Vec<String>,
    #[serde(rename = "image-layer-check")]
    pub image_layer_check: bool,
}

impl DaemonConfig {
    /// Load the daemon configuration, apply defaults and validate it
    pub fn load(path: &Path) -> Result<Self> {
        check_file_valid(path)?;
        let data = std::fs::read(path)?;
        let mut config: DaemonConfig = serde_json::from_slice(&data)?;
        config.apply_defaults();
        config.validate()?;
        debug!("Loaded iSulad daemon config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Fill unset keys with the engine defaults
    pub fn apply_defaults(&mut self) {
        if self.graph.is_empty() {
            self.graph = DEFAULT_ISULAD_GRAPH.to_string();
        }
        if self.state.is_empty() {
            self.state = DEFAULT_ISULAD_STATE.to_string();
        }
        if self.runtime.is_empty() {
            self.runtime = DEFAULT_RUNTIME.to_string();
        }
        if self.storage_driver.is_empty() {
            self.storage_driver = DEFAULT_STORAGE_DRIVER.to_string();
        }
    }

    /// Reject runtimes and storage backends containers cannot be moved to
    pub fn validate(&self) -> Result<()> {
        if self.runtime != DEFAULT_RUNTIME {
            return Err(Error::Config(format!("not support runtime: {}", self.runtime)));
        }
        self.storage_backend()?;
        Ok(())
    }

    pub fn storage_backend(&self) -> Result<StorageBackend> {
        self.storage_driver.parse()
    }

    /// `<graph>/engines/<runtime>`, the parent of every bundle directory
    pub fn runtime_path(&self) -> PathBuf {
        Path::new(&self.graph).join("engines").join(&self.runtime)
    }
}

/// Locations of the source engine's state
#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub graph: PathBuf,
    pub state: PathBuf,
    pub socket: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            graph: PathBuf::from(DEFAULT_DOCKER_GRAPH),
            state: PathBuf::from(DEFAULT_DOCKER_STATE),
            socket: PathBuf::from(DEFAULT_DOCKER_SOCKET),
        }
    }
}

/// External programs driving the target engine's image store and runtime
#[derive(Debug, Clone)]
pub struct HelperConfig {
    pub image_helper: PathBuf,
    pub runtime_helper: PathBuf,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            image_helper: PathBuf::from("isulad-img-helper"),
            runtime_helper: PathBuf::from("lcr-create-helper"),
        }
    }
}

/// Complete configuration of one transformation run
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub docker: DockerConfig,
    pub isulad: DaemonConfig,
    pub helpers: HelperConfig,
}

impl TransformConfig {
    pub fn new(docker: DockerConfig, isulad: DaemonConfig, helpers: HelperConfig) -> Self {
        Self {
            docker,
            isulad,
            helpers,
        }
    }
}
