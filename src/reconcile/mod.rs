// src/reconcile/mod.rs

//! Configuration reconciliation
//!
//! Pure rewrites of the source engine's documents into what the target
//! engine accepts. Nothing here touches the filesystem; the pipeline loads,
//! reconciles and saves.
//!
//! - [`host`]: `hostconfig.json` (runtime, restart policy, user namespace)
//! - [`v2`]: `config.v2.json` (log driver, annotations, paths, state)
//! - [`oci`]: `config.json` (root, cgroups, namespaces, devices, mounts)

pub mod host;
pub mod oci;
pub mod v2;

pub use host::reconcile_host_config;
pub use oci::reconcile_oci_spec;
pub use v2::{V2Context, cgroup_dir, strip_image_digest, transform_v2_config};

/// Annotation naming the cgroup directory containers are placed under
pub const ANNOTATION_CGROUP_DIR: &str = "cgroup.dir";
/// Cgroup directory used when the source parent cannot be kept
pub const DEFAULT_CGROUP_DIR: &str = "/isulad";
