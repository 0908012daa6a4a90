// tests/common/mod.rs

//! Shared fakes and fixtures for integration tests.
//!
//! A [`Host`] lays out a Docker graph root, a Docker state root and an
//! iSulad graph root under one temporary directory. Collaborators that would
//! touch real daemons, mounts or helper programs are replaced by recording
//! fakes.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use crossdock::config::{DaemonConfig, DockerConfig, HelperConfig, TransformConfig};
use crossdock::source::SourceEngine;
use crossdock::storage::{ImageReply, ImageService, PrepareReply};
use crossdock::target::{RuntimeRegistrar, ShmMounter};
use crossdock::transform::{ContainerTracker, TransformContext, Transformer};
use crossdock::types::ContainerChange;
use crossdock::{Error, Result};

pub const ID_A: &str = "aaaa56789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0";
pub const ID_B: &str = "bbbb56789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0";

const CONTAINERD_DIR: &str = "run/docker/containerd/daemon/io.containerd.runtime.v1.linux/moby";

/// Docker daemon that pauses anything and reports a fixed diff
#[derive(Default)]
pub struct FakeSource {
    pub changes: Mutex<Vec<ContainerChange>>,
    pub paused: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceEngine for FakeSource {
    async fn pause(&self, id: &str) -> Result<()> {
        self.paused.lock().push(id.to_string());
        Ok(())
    }

    async fn changes(&self, _id: &str) -> Result<Vec<ContainerChange>> {
        Ok(self.changes.lock().clone())
    }
}

/// Holds a call until the test releases it
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Image store that allocates `<layers>/<id>/{merged,diff}` per container
pub struct FakeImages {
    layers: PathBuf,
    pub calls: Mutex<Vec<String>>,
    pub prepare_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeImages {
    pub fn new(layers: PathBuf) -> Self {
        Self {
            layers,
            calls: Mutex::new(Vec::new()),
            prepare_gate: Mutex::new(None),
        }
    }

    pub fn layer(&self, id: &str) -> PathBuf {
        self.layers.join(id)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Make the next `prepare` wait on the returned gate
    pub fn hold_prepare(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.prepare_gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl ImageService for FakeImages {
    async fn prepare(&self, id: &str, image: &str) -> Result<PrepareReply> {
        self.calls.lock().push(format!("prepare {} {}", id, image));
        let gate = self.prepare_gate.lock().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let layer = self.layer(id);
        fs::create_dir_all(layer.join("merged"))?;
        fs::create_dir_all(layer.join("diff"))?;
        Ok(PrepareReply {
            mount_point: layer.join("merged").display().to_string(),
            errmsg: None,
        })
    }

    async fn remove(&self, id: &str) -> Result<ImageReply> {
        self.calls.lock().push(format!("remove {}", id));
        let _ = fs::remove_dir_all(self.layer(id));
        Ok(ImageReply::ok())
    }

    async fn mount(&self, id: &str) -> Result<ImageReply> {
        self.calls.lock().push(format!("mount {}", id));
        Ok(ImageReply::ok())
    }

    async fn unmount(&self, id: &str, force: bool) -> Result<ImageReply> {
        self.calls.lock().push(format!("umount {} force={}", id, force));
        Ok(ImageReply::ok())
    }
}

/// Shm mounter that only creates the mount point
#[derive(Default)]
pub struct FakeShm {
    pub mounted: Mutex<Vec<PathBuf>>,
    pub unmounted: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ShmMounter for FakeShm {
    async fn mount(&self, path: &Path, _size: i64) -> Result<()> {
        fs::create_dir_all(path)?;
        self.mounted.lock().push(path.to_path_buf());
        Ok(())
    }

    async fn unmount(&self, path: &Path) -> Result<()> {
        self.unmounted.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Runtime registrar that records the spec it was handed
#[derive(Default)]
pub struct FakeRegistrar {
    pub created: Mutex<Vec<(String, serde_json::Value)>>,
    fail: AtomicBool,
}

impl FakeRegistrar {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuntimeRegistrar for FakeRegistrar {
    async fn create(&self, id: &str, _runtime_path: &Path, spec: &[u8]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Runtime("lcr create failed".to_string()));
        }
        let spec = serde_json::from_slice(spec)?;
        self.created.lock().push((id.to_string(), spec));
        Ok(())
    }
}

/// Both engines' state trees under one temporary directory
pub struct Host {
    pub temp: TempDir,
    pub storage_driver: &'static str,
    pub source: Arc<FakeSource>,
    pub images: Arc<FakeImages>,
    pub shm: Arc<FakeShm>,
    pub registrar: Arc<FakeRegistrar>,
}

impl Host {
    pub fn new(storage_driver: &'static str) -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(CONTAINERD_DIR)).unwrap();
        let images = FakeImages::new(temp.path().join("isulad/storage/overlay"));

        Self {
            temp,
            storage_driver,
            source: Arc::new(FakeSource::default()),
            images: Arc::new(images),
            shm: Arc::new(FakeShm::default()),
            registrar: Arc::new(FakeRegistrar::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Old rootfs of `id`, as the source runtime spec names it
    pub fn old_rootfs(&self, id: &str) -> PathBuf {
        self.root().join("docker/overlay2").join(id).join("merged")
    }

    pub fn bundle(&self, id: &str) -> PathBuf {
        self.root().join("isulad/engines/lcr").join(id)
    }

    /// Write a running container's source state
    ///
    /// The writable layer holds `/root/notes`; the merged view also has it,
    /// so both storage backends have something to carry over.
    pub fn add_container(&self, id: &str, name: &str) {
        let ctr = self.root().join("docker/containers").join(id);
        fs::create_dir_all(&ctr).unwrap();
        fs::write(
            ctr.join("hostconfig.json"),
            serde_json::json!({
                "Runtime": "runc",
                "ShmSize": 67108864,
                "RestartPolicy": {"Name": "unless-stopped", "MaximumRetryCount": 0},
                "LogConfig": {"Type": "json-file", "Config": {"max-size": "10m"}}
            })
            .to_string(),
        )
        .unwrap();
        for file in ["hostname", "hosts", "resolv.conf"] {
            fs::write(ctr.join(file), format!("{} of {}\n", file, name)).unwrap();
        }
        fs::write(
            ctr.join("config.v2.json"),
            serde_json::json!({
                "ID": id,
                "Name": format!("/{}", name),
                "Image": "sha256:feed",
                "Config": {"Image": "busybox:latest@sha256:0123"},
                "State": {"Running": true, "Paused": true, "Pid": 4242},
                "Created": "2024-03-01T10:00:00Z",
                "HostnamePath": ctr.join("hostname"),
                "HostsPath": ctr.join("hosts"),
                "ResolvConfPath": ctr.join("resolv.conf"),
                "LogPath": ctr.join(format!("{}-json.log", id)),
            })
            .to_string(),
        )
        .unwrap();

        let old = self.old_rootfs(id);
        let layer = old.parent().unwrap();
        fs::create_dir_all(layer.join("diff/root")).unwrap();
        fs::write(layer.join("diff/root/notes"), name).unwrap();
        fs::create_dir_all(old.join("root")).unwrap();
        fs::write(old.join("root/notes"), name).unwrap();

        let running = self.root().join(CONTAINERD_DIR).join(id);
        fs::create_dir_all(&running).unwrap();
        fs::write(
            running.join("config.json"),
            serde_json::json!({
                "ociVersion": "1.0.1",
                "root": {"path": old},
                "mounts": [
                    {"destination": "/etc/hosts", "type": "bind", "source": ctr.join("hosts")},
                    {"destination": "/dev/shm", "type": "tmpfs", "source": "shm"}
                ],
                "linux": {"namespaces": [{"type": "pid"}, {"type": "mount"}]}
            })
            .to_string(),
        )
        .unwrap();
    }

    pub fn config(&self) -> TransformConfig {
        let mut isulad = DaemonConfig {
            graph: self.root().join("isulad").display().to_string(),
            storage_driver: self.storage_driver.to_string(),
            ..Default::default()
        };
        isulad.apply_defaults();
        let docker = DockerConfig {
            graph: self.root().join("docker"),
            state: self.root().join("run/docker"),
            socket: self.root().join("docker.sock"),
        };
        TransformConfig::new(docker, isulad, HelperConfig::default())
    }

    /// Wire a transformer to the fakes, enumerating containers from disk
    pub fn transformer(&self) -> Transformer {
        let config = self.config();
        let ctx = TransformContext::new(
            &config,
            self.source.clone(),
            self.images.clone(),
            self.shm.clone(),
            self.registrar.clone(),
        )
        .unwrap();
        let containers = ContainerTracker::scan(&ctx.docker.running_dir()).unwrap();
        Transformer::new(ctx, containers)
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}
