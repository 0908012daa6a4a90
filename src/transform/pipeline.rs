// src/transform/pipeline.rs

//! Per-container transformation
//!
//! Steps run strictly in order, each behind a cancellation checkpoint. A
//! cancel-triggered rollback waits for the step in flight to return:
//!
//! 1. pause the source container
//! 2. create the bundle directory (undo: remove it)
//! 3. rewrite `hostconfig.json`
//! 4. allocate the new rootfs (undo: release it) and rewrite `config.v2.json`
//! 5. mount the shm tmpfs (undo: detach it)
//! 6. copy `hostname`, `hosts` and `resolv.conf`
//! 7. rewrite `config.json`
//! 8. replicate the writable layer into the new rootfs
//! 9. register the bundle with the runtime
//!
//! The first failure stops the sequence and unwinds the ledger. Nothing is
//! retried.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::{error, info};

use super::TransformContext;
use crate::error::{Error, Result, ResultExt};
use crate::filesystem::archive_copy;
use crate::reconcile::{V2Context, reconcile_host_config, reconcile_oci_spec, transform_v2_config};
use crate::transaction::{RollbackLedger, TransformState};
use crate::types::{CommonConfig, IsuladHostConfig, IsuladV2Config, LogConfig, NETWORK_FILES, OciSpec};

/// One container's way through the steps
pub struct Pipeline {
    ctx: Arc<TransformContext>,
    id: String,
    ledger: RollbackLedger,
}

impl Pipeline {
    pub fn new(ctx: Arc<TransformContext>, id: impl Into<String>, ledger: RollbackLedger) -> Self {
        Self {
            ctx,
            id: id.into(),
            ledger,
        }
    }

    /// Transform the container, undoing completed steps on failure
    ///
    /// A run that completes while cancellation claims the ledger reports
    /// `Error::Cancelled`; its steps are being undone by then.
    pub async fn run(mut self) -> Result<()> {
        self.ledger.wait();
        info!("start to transform {}", self.id);

        let result = self.steps().await;
        if let Err(e) = &result {
            error!("transform {} failed: {}", self.id, e);
            self.ledger.run().await;
        }
        self.ledger.close();

        match result {
            Ok(()) if self.ledger.is_interrupted() => Err(Error::Cancelled(format!(
                "transformation of {} interrupted, rolled back",
                self.id
            ))),
            Ok(()) => {
                info!("transform {} successfully", self.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn steps(&self) -> Result<()> {
        use TransformState::*;

        self.guarded(Paused, self.pause()).await?;
        self.guarded(BundlePrepared, async { self.prepare_bundle() })
            .await?;
        let (host, log_config) = self
            .guarded(HostConfigWritten, async { self.transform_host_config() })
            .await?;
        let v2 = self
            .guarded(
                V2ConfigWritten,
                self.transform_v2_config(&host, log_config.as_ref()),
            )
            .await?;
        self.guarded(
            ShmPrepared,
            self.prepare_shm(&v2.common.shm_path, host.shm_size),
        )
        .await?;
        self.guarded(NetworkFilesCopied, self.copy_network_files(&v2.common))
            .await?;
        let (spec, old_rootfs) = self
            .guarded(OciConfigWritten, async {
                self.transform_oci_spec(&v2.common, &host)
            })
            .await?;
        self.guarded(
            RwLayerMigrated,
            self.ctx.storage.transform_rw_layer(&v2.common, &old_rootfs),
        )
        .await?;
        self.guarded(Finalized, self.register(&spec)).await
    }

    /// Run `work` as step `state`, with rollback held off until it returns
    async fn guarded<T>(
        &self,
        state: TransformState,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let _step = self.ledger.begin(state).await?;
        work.await.step(state.step())
    }

    /// Suspend the source container; a paused container is fine as it is
    async fn pause(&self) -> Result<()> {
        match self.ctx.source.pause(&self.id).await {
            Ok(()) | Err(Error::AlreadyPaused(_)) => Ok(()),
            Err(e) => {
                error!("pause container {} failed: {}", self.id, e);
                Err(e)
            }
        }
    }

    fn prepare_bundle(&self) -> Result<()> {
        self.ctx.isulad.prepare_bundle_dir(&self.id)?;

        let layout = self.ctx.isulad.clone();
        let id = self.id.clone();
        self.ledger
            .register("clean up bundle dir", move || async move { layout.cleanup(&id).await });
        Ok(())
    }

    fn transform_host_config(&self) -> Result<(IsuladHostConfig, Option<LogConfig>)> {
        let mut cfg = self.ctx.docker.load_host_config(&self.id)?;
        reconcile_host_config(&mut cfg.host, &self.ctx.runtime);

        let path = self.ctx.isulad.host_config_path(&self.id);
        self.ctx.isulad.save_config(&path, &cfg.host)?;
        Ok((cfg.host, cfg.log_config))
    }

    async fn transform_v2_config(
        &self,
        host: &IsuladHostConfig,
        log_config: Option<&LogConfig>,
    ) -> Result<IsuladV2Config> {
        let docker = self.ctx.docker.load_v2_config(&self.id)?;
        let base_path = self.ctx.isulad.bundle_dir(&self.id);
        let mut v2 = transform_v2_config(
            docker,
            &V2Context {
                base_path: &base_path,
                host,
                log_config,
                now: Local::now(),
            },
        );

        let rootfs = self
            .ctx
            .storage
            .generate_rootfs(&self.id, &v2.common.image)
            .await?;
        let storage = Arc::clone(&self.ctx.storage);
        let id = self.id.clone();
        self.ledger
            .register("clean up storage register", move || async move {
                storage.cleanup(&id).await;
                Ok(())
            });

        v2.common.base_fs = rootfs.display().to_string();
        let path = self.ctx.isulad.v2_config_path(&self.id);
        self.ctx.isulad.save_config(&path, &v2)?;
        Ok(v2)
    }

    async fn prepare_shm(&self, shm_path: &str, size: i64) -> Result<()> {
        let path = PathBuf::from(shm_path);
        self.ctx.shm.mount(&path, size).await?;

        let shm = Arc::clone(&self.ctx.shm);
        self.ledger
            .register(format!("umount share shm {}", shm_path), move || async move {
                shm.unmount(&path).await
            });
        Ok(())
    }

    async fn copy_network_files(&self, container: &CommonConfig) -> Result<()> {
        for file in NETWORK_FILES {
            let src = container.origin_network_file(file).ok_or_else(|| {
                Error::NotFound(format!("{} of container {}", file, self.id))
            })?;
            let dest = self.ctx.isulad.network_file_path(&self.id, file);
            archive_copy(&src, &dest, false).await.inspect_err(|_| {
                error!("copy {} to {} failed", src.display(), dest.display());
            })?;
        }
        Ok(())
    }

    /// Returns the rewritten spec and the root path the source runtime used
    fn transform_oci_spec(
        &self,
        container: &CommonConfig,
        host: &IsuladHostConfig,
    ) -> Result<(OciSpec, String)> {
        let mut spec = self.ctx.docker.load_oci_spec(&self.id)?;
        let old_rootfs = reconcile_oci_spec(&mut spec, container, host);

        let path = self.ctx.isulad.oci_config_path(&self.id);
        self.ctx.isulad.save_config(&path, &spec)?;
        Ok((spec, old_rootfs))
    }

    async fn register(&self, spec: &OciSpec) -> Result<()> {
        let data = serde_json::to_vec(spec)?;
        self.ctx
            .registrar
            .create(&self.id, self.ctx.isulad.runtime_path(), &data)
            .await
    }
}
