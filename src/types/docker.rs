// src/types/docker.rs

//! Source engine documents

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::isulad::{ContainerConfig, ContainerState, IsuladHostConfig, MountPoint};

/// Kind of a filesystem change reported by the daemon's diff endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
}

impl TryFrom<u8> for ChangeKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Modified),
            1 => Ok(Self::Added),
            2 => Ok(Self::Deleted),
            other => Err(format!("unknown change kind {}", other)),
        }
    }
}

impl From<ChangeKind> for u8 {
    fn from(kind: ChangeKind) -> u8 {
        match kind {
            ChangeKind::Modified => 0,
            ChangeKind::Added => 1,
            ChangeKind::Deleted => 2,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Modified => "C",
            Self::Added => "A",
            Self::Deleted => "D",
        })
    }
}

/// One entry of `GET /containers/{id}/changes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerChange {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Kind")]
    pub kind: ChangeKind,
}

impl ContainerChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for ContainerChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// Log driver settings from the source host config
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "Type", default)]
    pub driver: String,
    #[serde(rename = "Config", default)]
    pub config: Option<BTreeMap<String, String>>,
}

impl LogConfig {
    pub fn opt(&self, key: &str) -> Option<&str> {
        self.config.as_ref()?.get(key).map(String::as_str)
    }
}

/// `hostconfig.json` as written by the source engine
///
/// Keys the target engine understands land in `host`; the log driver is
/// kept aside because the target records it in the container config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerHostConfig {
    #[serde(flatten)]
    pub host: IsuladHostConfig,
    #[serde(rename = "LogConfig", default)]
    pub log_config: Option<LogConfig>,
}

/// `config.v2.json` as written by the source engine
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DockerV2Config {
    #[serde(rename = "State")]
    pub state: Option<ContainerState>,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Created")]
    pub created: Option<DateTime<FixedOffset>>,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Args")]
    pub args: Option<Vec<String>>,
    #[serde(rename = "CgroupParent")]
    pub cgroup_parent: String,
    #[serde(rename = "Config")]
    pub config: Option<ContainerConfig>,
    /// Image ID (`sha256:...`)
    #[serde(rename = "Image")]
    pub image_id: String,
    #[serde(rename = "LogPath")]
    pub log_path: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "MountLabel")]
    pub mount_label: String,
    #[serde(rename = "ProcessLabel")]
    pub process_label: String,
    #[serde(rename = "RestartCount")]
    pub restart_count: i64,
    #[serde(rename = "MountPoints")]
    pub mount_points: Option<BTreeMap<String, MountPoint>>,
    #[serde(rename = "HostnamePath")]
    pub hostname_path: String,
    #[serde(rename = "HostsPath")]
    pub hosts_path: String,
    #[serde(rename = "ShmPath")]
    pub shm_path: String,
    #[serde(rename = "ResolvConfPath")]
    pub resolv_conf_path: String,
    #[serde(rename = "SeccompProfile")]
    pub seccomp_profile: String,
    #[serde(rename = "HasBeenStartedBefore")]
    pub has_been_started_before: bool,
    #[serde(rename = "HasBeenManuallyStopped")]
    pub has_been_manually_stopped: bool,
    #[serde(rename = "NoNewPrivileges")]
    pub no_new_privileges: bool,
}
