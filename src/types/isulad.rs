// src/types/isulad.rs

//! Target engine documents
//!
//! Field names serialize the way iSulad expects them. The aliases accept
//! the spellings the source engine uses for the same keys, so these types
//! also parse the matching parts of the source documents directly.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{is_false, is_zero_i64};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "MaximumRetryCount")]
    pub maximum_retry_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightDevice {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Weight")]
    pub weight: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleDevice {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Rate")]
    pub rate: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ulimit {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hard")]
    pub hard: i64,
    #[serde(rename = "Soft")]
    pub soft: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMapping {
    #[serde(rename = "CgroupPermissions")]
    pub cgroup_permissions: String,
    #[serde(rename = "PathInContainer")]
    pub path_in_container: String,
    #[serde(rename = "PathOnHost")]
    pub path_on_host: String,
}

/// `hostconfig.json` of the target engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsuladHostConfig {
    #[serde(rename = "Binds", skip_serializing_if = "Option::is_none")]
    pub binds: Option<Vec<String>>,
    #[serde(rename = "NetworkMode", skip_serializing_if = "String::is_empty")]
    pub network_mode: String,
    #[serde(rename = "GroupAdd", skip_serializing_if = "Option::is_none")]
    pub group_add: Option<Vec<String>>,
    #[serde(rename = "IpcMode", skip_serializing_if = "String::is_empty")]
    pub ipc_mode: String,
    #[serde(rename = "PidMode", skip_serializing_if = "String::is_empty")]
    pub pid_mode: String,
    #[serde(rename = "Privileged", skip_serializing_if = "is_false")]
    pub privileged: bool,
    #[serde(rename = "ShmSize", skip_serializing_if = "is_zero_i64")]
    pub shm_size: i64,
    #[serde(rename = "AutoRemove", skip_serializing_if = "is_false")]
    pub auto_remove: bool,
    #[serde(rename = "ReadonlyRootfs", skip_serializing_if = "is_false")]
    pub readonly_rootfs: bool,
    #[serde(rename = "UTSMode", skip_serializing_if = "String::is_empty")]
    pub uts_mode: String,
    #[serde(rename = "UsernsMode", skip_serializing_if = "String::is_empty")]
    pub userns_mode: String,
    #[serde(rename = "Sysctls", skip_serializing_if = "Option::is_none")]
    pub sysctls: Option<BTreeMap<String, String>>,
    #[serde(rename = "Runtime", skip_serializing_if = "String::is_empty")]
    pub runtime: String,
    #[serde(rename = "RestartPolicy", skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(rename = "CapAdd", skip_serializing_if = "Option::is_none")]
    pub cap_add: Option<Vec<String>>,
    #[serde(rename = "CapDrop", skip_serializing_if = "Option::is_none")]
    pub cap_drop: Option<Vec<String>>,
    #[serde(rename = "Dns", skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(rename = "DnsOptions", skip_serializing_if = "Option::is_none")]
    pub dns_options: Option<Vec<String>>,
    #[serde(rename = "DnsSearch", skip_serializing_if = "Option::is_none")]
    pub dns_search: Option<Vec<String>>,
    #[serde(rename = "ExtraHosts", skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<String>>,
    #[serde(rename = "CPUShares", alias = "CpuShares", skip_serializing_if = "is_zero_i64")]
    pub cpu_shares: i64,
    #[serde(rename = "Memory", skip_serializing_if = "is_zero_i64")]
    pub memory: i64,
    #[serde(rename = "OomScoreAdj", skip_serializing_if = "is_zero_i64")]
    pub oom_score_adj: i64,
    #[serde(rename = "BlkioWeight", skip_serializing_if = "Option::is_none")]
    pub blkio_weight: Option<u16>,
    #[serde(rename = "BlkioWeightDevice", skip_serializing_if = "Option::is_none")]
    pub blkio_weight_device: Option<Vec<WeightDevice>>,
    #[serde(rename = "BlkioDeviceReadBps", skip_serializing_if = "Option::is_none")]
    pub blkio_device_read_bps: Option<Vec<ThrottleDevice>>,
    #[serde(rename = "BlkioDeviceWriteBps", skip_serializing_if = "Option::is_none")]
    pub blkio_device_write_bps: Option<Vec<ThrottleDevice>>,
    #[serde(rename = "CPUPeriod", alias = "CpuPeriod", skip_serializing_if = "is_zero_i64")]
    pub cpu_period: i64,
    #[serde(rename = "CPUQuota", alias = "CpuQuota", skip_serializing_if = "is_zero_i64")]
    pub cpu_quota: i64,
    #[serde(
        rename = "CPURealtimePeriod",
        alias = "CpuRealtimePeriod",
        skip_serializing_if = "is_zero_i64"
    )]
    pub cpu_realtime_period: i64,
    #[serde(
        rename = "CPURealtimeRuntime",
        alias = "CpuRealtimeRuntime",
        skip_serializing_if = "is_zero_i64"
    )]
    pub cpu_realtime_runtime: i64,
    #[serde(rename = "CpusetCpus", skip_serializing_if = "String::is_empty")]
    pub cpuset_cpus: String,
    #[serde(rename = "CpusetMems", skip_serializing_if = "String::is_empty")]
    pub cpuset_mems: String,
    #[serde(rename = "Devices", skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceMapping>>,
    #[serde(rename = "SecurityOpt", skip_serializing_if = "Option::is_none")]
    pub security_opt: Option<Vec<String>>,
    #[serde(rename = "StorageOpt", skip_serializing_if = "Option::is_none")]
    pub storage_opt: Option<BTreeMap<String, String>>,
    #[serde(rename = "KernelMemory", skip_serializing_if = "is_zero_i64")]
    pub kernel_memory: i64,
    #[serde(rename = "MemoryReservation", skip_serializing_if = "is_zero_i64")]
    pub memory_reservation: i64,
    #[serde(rename = "MemorySwap", skip_serializing_if = "is_zero_i64")]
    pub memory_swap: i64,
    #[serde(rename = "OomKillDisable", skip_serializing_if = "Option::is_none")]
    pub oom_kill_disable: Option<bool>,
    #[serde(rename = "PidsLimit", skip_serializing_if = "Option::is_none")]
    pub pids_limit: Option<i64>,
    #[serde(rename = "FilesLimit", skip_serializing_if = "is_zero_i64")]
    pub files_limit: i64,
    #[serde(rename = "Ulimits", skip_serializing_if = "Option::is_none")]
    pub ulimits: Option<Vec<Ulimit>>,
    #[serde(rename = "CgroupParent", skip_serializing_if = "String::is_empty")]
    pub cgroup_parent: String,
}

/// A volume or bind mount recorded in the container config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPoint {
    #[serde(rename = "Destination", skip_serializing_if = "String::is_empty")]
    pub destination: String,
    #[serde(rename = "Driver", skip_serializing_if = "String::is_empty")]
    pub driver: String,
    #[serde(rename = "Key", skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(rename = "Name", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Named", skip_serializing_if = "String::is_empty")]
    pub named: String,
    #[serde(rename = "Propagation", skip_serializing_if = "String::is_empty")]
    pub propagation: String,
    #[serde(rename = "RW", skip_serializing_if = "is_false")]
    pub rw: bool,
    #[serde(rename = "Relabel", skip_serializing_if = "String::is_empty")]
    pub relabel: String,
    #[serde(rename = "Source", skip_serializing_if = "String::is_empty")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    #[serde(rename = "Test")]
    pub test: Vec<String>,
    #[serde(rename = "Interval")]
    pub interval: i64,
    #[serde(rename = "Timeout")]
    pub timeout: i64,
    #[serde(rename = "StartPeriod")]
    pub start_period: i64,
    #[serde(rename = "Retries")]
    pub retries: i64,
    #[serde(rename = "ExitOnUnhealthy")]
    pub exit_on_unhealthy: bool,
}

/// The `Config` section of the container config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "DomainName", alias = "Domainname", skip_serializing_if = "String::is_empty")]
    pub domain_name: String,
    #[serde(rename = "User", skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(rename = "AttachStdin")]
    pub attach_stdin: bool,
    #[serde(rename = "AttachStdout")]
    pub attach_stdout: bool,
    #[serde(rename = "AttachStderr")]
    pub attach_stderr: bool,
    #[serde(rename = "ExposedPorts")]
    pub exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(rename = "Tty")]
    pub tty: bool,
    #[serde(rename = "OpenStdin")]
    pub open_stdin: bool,
    #[serde(rename = "StdinOnce")]
    pub stdin_once: bool,
    #[serde(rename = "Env")]
    pub env: Option<Vec<String>>,
    #[serde(rename = "Cmd")]
    pub cmd: Option<Vec<String>>,
    #[serde(rename = "ArgsEscaped")]
    pub args_escaped: bool,
    #[serde(rename = "NetworkDisabled")]
    pub network_disabled: bool,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "WorkingDir", skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(rename = "Entrypoint")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(rename = "MacAddress", skip_serializing_if = "String::is_empty")]
    pub mac_address: String,
    #[serde(rename = "Onbuild", alias = "OnBuild")]
    pub onbuild: Option<Vec<String>>,
    #[serde(rename = "Labels")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(rename = "Annotations")]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "StopSignal", skip_serializing_if = "String::is_empty")]
    pub stop_signal: String,
    #[serde(rename = "HealthCheck", alias = "Healthcheck")]
    pub health_check: Option<HealthCheck>,
    #[serde(rename = "SystemContainer")]
    pub system_container: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthLog {
    #[serde(rename = "Start", skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(rename = "End", skip_serializing_if = "String::is_empty")]
    pub end: String,
    #[serde(rename = "ExitCode", skip_serializing_if = "is_zero_i64")]
    pub exit_code: i64,
    #[serde(rename = "Output", skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthState {
    #[serde(rename = "Status", skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(rename = "FailingStreak", skip_serializing_if = "is_zero_i64")]
    pub failing_streak: i64,
    #[serde(rename = "Log", skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<HealthLog>,
}

/// Runtime state recorded in the container config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerState {
    #[serde(rename = "Dead", skip_serializing_if = "is_false")]
    pub dead: bool,
    #[serde(
        rename = "RemovalInprogress",
        alias = "RemovalInProgress",
        skip_serializing_if = "is_false"
    )]
    pub removal_in_progress: bool,
    #[serde(rename = "Restarting", skip_serializing_if = "is_false")]
    pub restarting: bool,
    #[serde(rename = "Running", skip_serializing_if = "is_false")]
    pub running: bool,
    #[serde(rename = "OomKilled", alias = "OOMKilled", skip_serializing_if = "is_false")]
    pub oom_killed: bool,
    #[serde(rename = "Paused", skip_serializing_if = "is_false")]
    pub paused: bool,
    #[serde(rename = "Starting", skip_serializing_if = "is_false")]
    pub starting: bool,
    #[serde(rename = "Error", skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(rename = "ExitCode", skip_serializing_if = "is_zero_i64")]
    pub exit_code: i64,
    #[serde(rename = "FinishedAt", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<FixedOffset>>,
    #[serde(rename = "Pid", skip_serializing_if = "is_zero_i64")]
    pub pid: i64,
    #[serde(rename = "StartedAt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,
    #[serde(rename = "Health", skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
}

/// The `CommonConfig` section of the target `config.v2.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(rename = "Path", skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(rename = "Args", skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(rename = "Config")]
    pub config: ContainerConfig,
    #[serde(rename = "Created", skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<FixedOffset>>,
    #[serde(rename = "HasBeenManuallyStopped", skip_serializing_if = "is_false")]
    pub has_been_manually_stopped: bool,
    #[serde(rename = "HasBeenStartedBefore", skip_serializing_if = "is_false")]
    pub has_been_started_before: bool,
    #[serde(rename = "Image", skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(rename = "ImageType", skip_serializing_if = "String::is_empty")]
    pub image_type: String,
    #[serde(rename = "HostnamePath", skip_serializing_if = "String::is_empty")]
    pub hostname_path: String,
    #[serde(rename = "HostsPath", skip_serializing_if = "String::is_empty")]
    pub hosts_path: String,
    #[serde(rename = "ResolvConfPath", skip_serializing_if = "String::is_empty")]
    pub resolv_conf_path: String,
    #[serde(rename = "ShmPath", skip_serializing_if = "String::is_empty")]
    pub shm_path: String,
    #[serde(rename = "LogPath", skip_serializing_if = "String::is_empty")]
    pub log_path: String,
    #[serde(rename = "LogDriver", skip_serializing_if = "String::is_empty")]
    pub log_driver: String,
    #[serde(rename = "BaseFs", skip_serializing_if = "String::is_empty")]
    pub base_fs: String,
    #[serde(rename = "MountPoints", skip_serializing_if = "BTreeMap::is_empty")]
    pub mount_points: BTreeMap<String, MountPoint>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "RestartCount", skip_serializing_if = "is_zero_i64")]
    pub restart_count: i64,
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "MountLabel")]
    pub mount_label: String,
    #[serde(rename = "ProcessLabel")]
    pub process_label: String,
    #[serde(rename = "SeccompProfile")]
    pub seccomp_profile: String,
    #[serde(rename = "NoNewPrivileges")]
    pub no_new_privileges: bool,

    /// Source-side network file locations, never persisted
    #[serde(skip)]
    pub origin_hostname_path: String,
    #[serde(skip)]
    pub origin_hosts_path: String,
    #[serde(skip)]
    pub origin_resolv_conf_path: String,
}

impl CommonConfig {
    /// Source-side location of one of the network files
    pub fn origin_network_file(&self, name: &str) -> Option<PathBuf> {
        let path = match name {
            super::HOSTNAME => &self.origin_hostname_path,
            super::HOSTS => &self.origin_hosts_path,
            super::RESOLV_CONF => &self.origin_resolv_conf_path,
            _ => return None,
        };
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Target `config.v2.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsuladV2Config {
    #[serde(rename = "CommonConfig")]
    pub common: CommonConfig,
    #[serde(rename = "Image", skip_serializing_if = "String::is_empty", default)]
    pub image: String,
    #[serde(rename = "State")]
    pub state: ContainerState,
}
