// src/types/mod.rs

//! On-disk document types of both engines
//!
//! - [`docker`]: what the source engine writes (`hostconfig.json`,
//!   `config.v2.json`) and what its API returns for a container diff
//! - [`isulad`]: the target engine's equivalents
//! - [`oci`]: the runtime spec (`config.json`), shared by both
//!
//! Only the fields the transformation reads or rewrites are typed; OCI
//! documents keep every other key verbatim.

pub mod docker;
pub mod isulad;
pub mod oci;

pub use docker::{ChangeKind, ContainerChange, DockerHostConfig, DockerV2Config, LogConfig};
pub use isulad::{CommonConfig, ContainerConfig, ContainerState, IsuladHostConfig, IsuladV2Config, MountPoint};
pub use oci::OciSpec;

/// Host configuration file name
pub const HOSTCONFIG: &str = "hostconfig.json";
/// Container configuration file name
pub const V2CONFIG: &str = "config.v2.json";
/// Runtime spec file name
pub const OCICONFIG: &str = "config.json";

/// Network files every container gets its own copy of
pub const HOSTNAME: &str = "hostname";
pub const HOSTS: &str = "hosts";
pub const RESOLV_CONF: &str = "resolv.conf";

/// Network files in the order they are copied
pub const NETWORK_FILES: [&str; 3] = [HOSTNAME, HOSTS, RESOLV_CONF];

/// Length of a full container identifier
pub const CONTAINER_ID_LEN: usize = 64;

/// Returns true if `id` looks like a full container identifier
pub fn is_full_container_id(id: &str) -> bool {
    id.len() == CONTAINER_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

pub(crate) fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}
