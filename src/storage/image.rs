// src/storage/image.rs

//! Image/layer service of the target engine
//!
//! The target engine allocates container root filesystems in its own image
//! store. The store is driven through the [`ImageService`] trait; replies
//! carry an optional embedded error message which callers treat as a
//! failure just like a transport error.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::DaemonConfig;
use crate::error::{Error, Result};

/// Reply of a plain image store operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageReply {
    #[serde(default)]
    pub errmsg: Option<String>,
}

impl ImageReply {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            errmsg: Some(msg.into()),
        }
    }

    /// The embedded error, if the reply carries a non-empty one
    pub fn error(&self) -> Option<&str> {
        self.errmsg.as_deref().filter(|m| !m.is_empty())
    }
}

/// Reply of a rootfs allocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PrepareReply {
    #[serde(default)]
    pub mount_point: String,
    #[serde(default)]
    pub errmsg: Option<String>,
}

impl PrepareReply {
    pub fn error(&self) -> Option<&str> {
        self.errmsg.as_deref().filter(|m| !m.is_empty())
    }
}

/// Operations on the target engine's image store
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Allocate a root filesystem for container `id` from `image`
    async fn prepare(&self, id: &str, image: &str) -> Result<PrepareReply>;

    /// Release everything the store holds for `id`
    async fn remove(&self, id: &str) -> Result<ImageReply>;

    /// Mount the root filesystem of `id`
    async fn mount(&self, id: &str) -> Result<ImageReply>;

    /// Unmount the root filesystem of `id`
    async fn unmount(&self, id: &str, force: bool) -> Result<ImageReply>;
}

/// Image service backed by an external helper program
///
/// The helper receives the store location on its command line and prints
/// one JSON reply on stdout:
///
/// ```text
/// <helper> --graph /var/lib/isulad --state /var/run/isulad --driver overlay2 \
///          prepare --id <id> --image <image>
/// {"mount_point": "/var/lib/isulad/storage/overlay/<layer>/merged"}
/// ```
pub struct ExecImageService {
    program: PathBuf,
    global_args: Vec<String>,
}

impl ExecImageService {
    /// Locate the helper and bind it to the daemon's store
    pub fn new(program: &std::path::Path, daemon: &DaemonConfig) -> Result<Self> {
        let program = which::which(program).map_err(|e| {
            Error::InitError(format!(
                "image helper {} not found: {}",
                program.display(),
                e
            ))
        })?;

        let mut global_args = vec![
            "--graph".to_string(),
            daemon.graph.clone(),
            "--state".to_string(),
            daemon.state.clone(),
            "--driver".to_string(),
            daemon.storage_driver.clone(),
        ];
        for opt in &daemon.storage_opts {
            global_args.push("--storage-opt".to_string());
            global_args.push(opt.clone());
        }
        if daemon.image_layer_check {
            global_args.push("--layer-check".to_string());
        }

        Ok(Self {
            program,
            global_args,
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, op: &str, args: &[&str]) -> Result<T> {
        debug!("{} {} {:?}", self.program.display(), op, args);

        let output = Command::new(&self.program)
            .args(&self.global_args)
            .arg(op)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ImageService(format!("run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(Error::ImageService(format!(
                "{} {} exited with {}: {}",
                self.program.display(),
                op,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::ImageService(format!("parse {} reply: {}", op, e))
        })
    }
}

#[async_trait]
impl ImageService for ExecImageService {
    async fn prepare(&self, id: &str, image: &str) -> Result<PrepareReply> {
        self.call("prepare", &["--id", id, "--image", image]).await
    }

    async fn remove(&self, id: &str) -> Result<ImageReply> {
        self.call("remove", &["--id", id]).await
    }

    async fn mount(&self, id: &str) -> Result<ImageReply> {
        self.call("mount", &["--id", id]).await
    }

    async fn unmount(&self, id: &str, force: bool) -> Result<ImageReply> {
        if force {
            self.call("umount", &["--id", id, "--force"]).await
        } else {
            self.call("umount", &["--id", id]).await
        }
    }
}
