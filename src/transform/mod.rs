// src/transform/mod.rs

//! Transformation orchestrator
//!
//! Resolves the requested identifiers against the running containers, runs
//! one [`Pipeline`] per claimed container and streams one
//! [`TransformResult`] per identifier back to the caller. The result channel
//! closes once every pipeline and every rollback it started has finished.

mod pipeline;
mod tracker;

pub use pipeline::Pipeline;
pub use tracker::{ContainerTracker, TransformStatus};

use std::fmt;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::TransformConfig;
use crate::error::{Error, Result};
use crate::source::{DockerClient, DockerLayout, SourceEngine};
use crate::storage::{ExecImageService, ImageService, StorageDriver};
use crate::target::{ExecRegistrar, IsuladLayout, RuntimeRegistrar, ShmMounter, TmpfsMounter};
use crate::transaction::RollbackLedger;

/// Capacity of the result channel
pub const RESULT_BUFFER: usize = 128;

/// Outcome for one requested identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// The identifier as given by the caller
    pub id: String,
    pub ok: bool,
    pub message: String,
}

impl TransformResult {
    fn new(id: &str, ok: bool, detail: impl fmt::Display) -> Self {
        Self {
            id: id.to_string(),
            ok,
            message: format!("transform {}: {}", id, detail),
        }
    }
}

impl fmt::Display for TransformResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collaborators and locations shared by every pipeline of a run
pub struct TransformContext {
    pub docker: DockerLayout,
    pub isulad: IsuladLayout,
    /// Runtime written into every host config
    pub runtime: String,
    pub source: Arc<dyn SourceEngine>,
    pub storage: Arc<StorageDriver>,
    pub shm: Arc<dyn ShmMounter>,
    pub registrar: Arc<dyn RuntimeRegistrar>,
}

impl TransformContext {
    /// Wire the given collaborators to the configured locations
    pub fn new(
        config: &TransformConfig,
        source: Arc<dyn SourceEngine>,
        images: Arc<dyn ImageService>,
        shm: Arc<dyn ShmMounter>,
        registrar: Arc<dyn RuntimeRegistrar>,
    ) -> Result<Self> {
        let backend = config.isulad.storage_backend()?;
        let storage = StorageDriver::new(backend, images, Arc::clone(&source));

        Ok(Self {
            docker: DockerLayout::new(config.docker.graph.clone(), config.docker.state.clone()),
            isulad: IsuladLayout::new(config.isulad.runtime_path()),
            runtime: config.isulad.runtime.clone(),
            source,
            storage: Arc::new(storage),
            shm,
            registrar,
        })
    }
}

/// Moves running source containers to the target engine
pub struct Transformer {
    ctx: Arc<TransformContext>,
    containers: Arc<ContainerTracker>,
}

impl Transformer {
    pub fn new(ctx: TransformContext, containers: ContainerTracker) -> Self {
        Self {
            ctx: Arc::new(ctx),
            containers: Arc::new(containers),
        }
    }

    /// Connect to every collaborator and enumerate the running containers
    ///
    /// Any failure here happens before a single container is touched.
    pub async fn init(config: &TransformConfig) -> Result<Self> {
        let client = DockerClient::connect(&config.docker.socket)
            .await
            .map_err(|e| Error::InitError(format!("create docker client failed: {}", e)))?;
        let images = ExecImageService::new(&config.helpers.image_helper, &config.isulad)?;
        let registrar = ExecRegistrar::new(&config.helpers.runtime_helper)?;

        let ctx = TransformContext::new(
            config,
            Arc::new(client),
            Arc::new(images),
            Arc::new(TmpfsMounter),
            Arc::new(registrar),
        )
        .map_err(|e| Error::InitError(format!("init storage driver failed: {}", e)))?;

        let containers = ContainerTracker::scan(&ctx.docker.running_dir())?;
        info!(
            "found {} running containers, storage driver {}",
            containers.len(),
            ctx.storage.backend()
        );
        Ok(Self::new(ctx, containers))
    }

    pub fn containers(&self) -> &ContainerTracker {
        &self.containers
    }

    /// Transform `ids` (or every known container when `all` is set)
    ///
    /// Each identifier yields exactly one result. `cancel` is shared by all
    /// pipelines; cancelling it rolls back every container in flight.
    pub fn transform(
        &self,
        ids: Vec<String>,
        all: bool,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransformResult> {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let ids = if all { self.containers.ids() } else { ids };
        let tasks = TaskTracker::new();

        for token in ids {
            let ctx = Arc::clone(&self.ctx);
            let containers = Arc::clone(&self.containers);
            let cancel = cancel.clone();
            let listeners = tasks.clone();
            let tx = tx.clone();

            tasks.spawn(async move {
                let result = transform_one(ctx, &containers, &token, all, cancel, listeners).await;
                if tx.send(result).await.is_err() {
                    debug!("result receiver dropped before {} finished", token);
                }
            });
        }
        tasks.close();

        // The last sender goes away only after every rollback listener is done
        tokio::spawn(async move {
            tasks.wait().await;
            drop(tx);
        });

        rx
    }
}

async fn transform_one(
    ctx: Arc<TransformContext>,
    containers: &ContainerTracker,
    token: &str,
    exact: bool,
    cancel: CancellationToken,
    listeners: TaskTracker,
) -> TransformResult {
    let (id, status) = if exact {
        containers.claim_exact(token)
    } else {
        containers.claim(token)
    };

    match status {
        TransformStatus::NotFound => TransformResult::new(token, false, "container was not found"),
        TransformStatus::AlreadyTransformed => {
            TransformResult::new(token, true, "container has been transformed")
        }
        TransformStatus::NeedsTransform => {
            let ledger = RollbackLedger::new(id.as_str(), cancel, listeners);
            match Pipeline::new(ctx, id, ledger).run().await {
                Ok(()) => TransformResult::new(token, true, "success"),
                Err(e) => TransformResult::new(token, false, e),
            }
        }
    }
}

/// Cancel `cancel` on the first SIGHUP, SIGINT or SIGTERM
pub fn cancel_on_signals(cancel: CancellationToken) -> Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = hangup.recv() => "SIGHUP",
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = cancel.cancelled() => return,
        };
        info!("catch signal {}", name);
        cancel.cancel();
    });
    Ok(())
}
