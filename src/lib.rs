// src/lib.rs

//! Crossdock
//!
//! In-place migration of paused Docker containers to iSulad. Each container
//! keeps its writable layer, network files and runtime settings; only the
//! engine that owns it changes.
//!
//! # Architecture
//!
//! - Orchestrator: resolves identifiers and runs one pipeline per container
//! - Pipelines: fixed sequence of steps with a cancellation checkpoint before each
//! - Rollback ledger: compensations registered as resources are created, run LIFO
//! - Storage drivers: overlay2 copies the whole upper layer, devicemapper only changes
//! - Reconciliation: pure rewrites of the Docker configs into iSulad's formats

pub mod cli;
pub mod config;
mod error;
pub mod filesystem;
pub mod logging;
pub mod reconcile;
pub mod source;
pub mod storage;
pub mod target;
pub mod transaction;
pub mod transform;
pub mod types;

pub use config::{DaemonConfig, StorageBackend, TransformConfig};
pub use error::{Error, Result, ResultExt};
pub use transaction::RollbackLedger;
pub use transform::{TransformContext, TransformResult, Transformer};
