// src/reconcile/v2.rs

//! Container config rewrite
//!
//! The source `config.v2.json` becomes the target's `CommonConfig` plus
//! state. Settings the target keeps as annotations (log driver options,
//! OOM score, file limit, cgroup directory) move into
//! `Config.Annotations`.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local};
use regex::Regex;

use super::{ANNOTATION_CGROUP_DIR, DEFAULT_CGROUP_DIR};
use crate::types::{
    CommonConfig, DockerV2Config, HOSTNAME, HOSTS, IsuladHostConfig, IsuladV2Config, LogConfig,
    RESOLV_CONF,
};

const LOG_DRIVER_JSON_FILE: &str = "json-file";
const LOG_DRIVER_SYSLOG: &str = "syslog";

const DEFAULT_LOG_SIZE: &str = "30KB";
const DEFAULT_LOG_ROTATE: &str = "7";
const DEFAULT_LOG_PATH: &str = "none";

/// Where the target mounts container root filesystems
const ROOTFS_MOUNT: &str = "/var/lib/isulad/mnt/rootfs";

/// Image reference with an optional `@<hex>` digest suffix
static IMAGE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9._\-/:]*)(?:@[[:xdigit:]]+)?").unwrap());

/// Inputs besides the source document
pub struct V2Context<'a> {
    /// Bundle directory of the container
    pub base_path: &'a Path,
    pub host: &'a IsuladHostConfig,
    pub log_config: Option<&'a LogConfig>,
    pub now: DateTime<Local>,
}

/// Drop a trailing digest from an image reference
pub fn strip_image_digest(reference: &str) -> String {
    IMAGE_REFERENCE
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Cgroup directory for a container whose source parent is `cgroup_parent`
///
/// A parent under `/docker/` or one not ending in the container id cannot
/// be carried over; everything else keeps its directory.
pub fn cgroup_dir(cgroup_parent: &str, id: &str) -> String {
    let suffix = format!("/{}", id);
    match cgroup_parent.strip_suffix(&suffix) {
        Some(dir) if !cgroup_parent.starts_with("/docker/") => dir.to_string(),
        _ => DEFAULT_CGROUP_DIR.to_string(),
    }
}

/// Record the log driver in the container config
///
/// Only `max-file`/`max-size` (json-file) and `tag`/`syslog-facility`
/// (syslog) have a target equivalent. Any other driver falls back to
/// json-file without a log file.
fn apply_log_config(common: &mut CommonConfig, log: Option<&LogConfig>, base_path: &Path) {
    let driver = log.map(|l| l.driver.as_str()).unwrap_or("default");
    let opt = |key: &str| log.and_then(|l| l.opt(key)).map(str::to_string);
    let annotations = &mut common.config.annotations;

    match driver {
        LOG_DRIVER_JSON_FILE => {
            common.log_driver = LOG_DRIVER_JSON_FILE.to_string();
            common.log_path = base_path.join("console.log").display().to_string();
            annotations.insert("log.console.driver".into(), LOG_DRIVER_JSON_FILE.into());
            annotations.insert("log.console.file".into(), common.log_path.clone());
            annotations.insert(
                "log.console.filerotate".into(),
                opt("max-file").unwrap_or_else(|| DEFAULT_LOG_ROTATE.to_string()),
            );
            annotations.insert(
                "log.console.filesize".into(),
                opt("max-size").unwrap_or_else(|| DEFAULT_LOG_SIZE.to_string()),
            );
        }
        LOG_DRIVER_SYSLOG => {
            common.log_driver = LOG_DRIVER_SYSLOG.to_string();
            annotations.insert("log.console.driver".into(), LOG_DRIVER_SYSLOG.into());
            if let Some(tag) = opt("tag") {
                annotations.insert("log.console.tag".into(), tag);
            }
            if let Some(facility) = opt("syslog-facility") {
                annotations.insert("log.console.facility".into(), facility);
            }
        }
        _ => {
            common.log_driver = LOG_DRIVER_JSON_FILE.to_string();
            common.log_path = DEFAULT_LOG_PATH.to_string();
            annotations.insert("log.console.driver".into(), LOG_DRIVER_JSON_FILE.into());
            annotations.insert("log.console.file".into(), DEFAULT_LOG_PATH.into());
            annotations.insert("log.console.filerotate".into(), DEFAULT_LOG_ROTATE.into());
            annotations.insert("log.console.filesize".into(), DEFAULT_LOG_SIZE.into());
        }
    }
}

fn to_local(time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    time.with_timezone(&Local).fixed_offset()
}

/// Build the target container config from the source one
///
/// `BaseFs` is left empty; the storage driver fills it in once the new
/// root filesystem exists.
pub fn transform_v2_config(docker: DockerV2Config, ctx: &V2Context<'_>) -> IsuladV2Config {
    let config = docker.config.unwrap_or_default();
    let image = strip_image_digest(&config.image);

    let mut common = CommonConfig {
        path: docker.path,
        args: docker.args,
        config,
        created: docker.created,
        has_been_manually_stopped: docker.has_been_manually_stopped,
        has_been_started_before: docker.has_been_started_before,
        image,
        image_type: "oci".to_string(),
        log_path: docker.log_path,
        mount_points: docker.mount_points.unwrap_or_default(),
        name: docker.name,
        restart_count: docker.restart_count,
        id: docker.id,
        mount_label: docker.mount_label,
        process_label: docker.process_label,
        seccomp_profile: docker.seccomp_profile,
        no_new_privileges: docker.no_new_privileges,
        origin_hostname_path: docker.hostname_path,
        origin_hosts_path: docker.hosts_path,
        origin_resolv_conf_path: docker.resolv_conf_path,
        ..Default::default()
    };

    let annotations = &mut common.config.annotations;
    if ctx.host.oom_score_adj != 0 {
        annotations.insert("proc.oom_score_adj".into(), ctx.host.oom_score_adj.to_string());
    }
    if ctx.host.files_limit != 0 {
        annotations.insert("files.limit".into(), ctx.host.files_limit.to_string());
    }
    apply_log_config(&mut common, ctx.log_config, ctx.base_path);
    let dir = cgroup_dir(&docker.cgroup_parent, &common.id);
    common.config.annotations.insert(ANNOTATION_CGROUP_DIR.into(), dir);

    common.hosts_path = ctx.base_path.join(HOSTS).display().to_string();
    common.hostname_path = ctx.base_path.join(HOSTNAME).display().to_string();
    common.resolv_conf_path = ctx.base_path.join(RESOLV_CONF).display().to_string();
    common.shm_path = ctx.base_path.join("mounts/shm").display().to_string();
    common
        .config
        .annotations
        .insert("rootfs.mount".into(), ROOTFS_MOUNT.into());

    common.created = common.created.map(to_local);
    common.name = common
        .name
        .strip_prefix('/')
        .unwrap_or(&common.name)
        .to_string();

    let mut state = docker.state.unwrap_or_default();
    state.paused = false;
    state.running = false;
    state.started_at = state.started_at.map(to_local);
    state.finished_at = Some(ctx.now.fixed_offset());

    IsuladV2Config {
        common,
        image: docker.image_id,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerConfig, ContainerState};
    use std::collections::BTreeMap;

    const ID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn log(driver: &str, opts: &[(&str, &str)]) -> LogConfig {
        LogConfig {
            driver: driver.to_string(),
            config: Some(
                opts.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }

    fn docker() -> DockerV2Config {
        DockerV2Config {
            id: ID.to_string(),
            name: "/web".to_string(),
            image_id: "sha256:feed".to_string(),
            cgroup_parent: format!("/kubepods/pod1/{}", ID),
            hostname_path: "/var/lib/docker/containers/x/hostname".to_string(),
            hosts_path: "/var/lib/docker/containers/x/hosts".to_string(),
            resolv_conf_path: "/var/lib/docker/containers/x/resolv.conf".to_string(),
            config: Some(ContainerConfig {
                image: "busybox:latest".to_string(),
                ..Default::default()
            }),
            state: Some(ContainerState {
                running: true,
                paused: true,
                pid: 42,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_image_digest() {
        assert_eq!(strip_image_digest("busybox:latest"), "busybox:latest");
        assert_eq!(strip_image_digest("registry.io/lib/app@0123abcd"), "registry.io/lib/app");
        assert_eq!(strip_image_digest("busybox@sha256:0123"), "busybox");
        assert_eq!(strip_image_digest(""), "");
    }

    #[test]
    fn test_cgroup_dir() {
        assert_eq!(cgroup_dir(&format!("/docker/{}", ID), ID), DEFAULT_CGROUP_DIR);
        assert_eq!(cgroup_dir("/custom", ID), DEFAULT_CGROUP_DIR);
        assert_eq!(cgroup_dir("", ID), DEFAULT_CGROUP_DIR);
        assert_eq!(cgroup_dir(&format!("/kubepods/pod1/{}", ID), ID), "/kubepods/pod1");
    }

    #[test]
    fn test_json_file_log_driver() {
        let mut common = CommonConfig::default();
        let log = log("json-file", &[("max-file", "3")]);
        apply_log_config(&mut common, Some(&log), Path::new("/b/abc"));

        let a = &common.config.annotations;
        assert_eq!(common.log_driver, "json-file");
        assert_eq!(common.log_path, "/b/abc/console.log");
        assert_eq!(a["log.console.file"], "/b/abc/console.log");
        assert_eq!(a["log.console.filerotate"], "3");
        assert_eq!(a["log.console.filesize"], DEFAULT_LOG_SIZE);
    }

    #[test]
    fn test_syslog_log_driver_keeps_log_path() {
        let mut common = CommonConfig {
            log_path: "/old.log".to_string(),
            ..Default::default()
        };
        let log = log("syslog", &[("tag", "web"), ("syslog-address", "udp://x")]);
        apply_log_config(&mut common, Some(&log), Path::new("/b/abc"));

        let a = &common.config.annotations;
        assert_eq!(common.log_driver, "syslog");
        assert_eq!(common.log_path, "/old.log");
        assert_eq!(a["log.console.tag"], "web");
        assert!(!a.contains_key("log.console.facility"));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_unknown_log_driver_falls_back() {
        for log in [None, Some(log("journald", &[]))] {
            let mut common = CommonConfig::default();
            apply_log_config(&mut common, log.as_ref(), Path::new("/b/abc"));
            assert_eq!(common.log_driver, "json-file");
            assert_eq!(common.log_path, "none");
            assert_eq!(common.config.annotations["log.console.file"], "none");
            assert_eq!(common.config.annotations["log.console.filerotate"], "7");
        }
    }

    #[test]
    fn test_transform_v2_config() {
        let host = IsuladHostConfig {
            oom_score_adj: 500,
            ..Default::default()
        };
        let now = Local::now();
        let ctx = V2Context {
            base_path: Path::new("/var/lib/isulad/engines/lcr/abc"),
            host: &host,
            log_config: None,
            now,
        };

        let v2 = transform_v2_config(docker(), &ctx);
        let common = &v2.common;
        let a = &common.config.annotations;

        assert_eq!(common.name, "web");
        assert_eq!(common.image, "busybox:latest");
        assert_eq!(common.image_type, "oci");
        assert_eq!(v2.image, "sha256:feed");
        assert_eq!(a["proc.oom_score_adj"], "500");
        assert!(!a.contains_key("files.limit"));
        assert_eq!(a["cgroup.dir"], "/kubepods/pod1");
        assert_eq!(a["rootfs.mount"], ROOTFS_MOUNT);
        assert_eq!(common.hosts_path, "/var/lib/isulad/engines/lcr/abc/hosts");
        assert_eq!(common.shm_path, "/var/lib/isulad/engines/lcr/abc/mounts/shm");
        assert_eq!(
            common.origin_network_file(HOSTS).unwrap(),
            Path::new("/var/lib/docker/containers/x/hosts")
        );
        assert!(common.base_fs.is_empty());

        assert!(!v2.state.running);
        assert!(!v2.state.paused);
        assert_eq!(v2.state.pid, 42);
        assert_eq!(v2.state.finished_at, Some(now.fixed_offset()));
    }

    #[test]
    fn test_timestamps_keep_their_instant() {
        let created = DateTime::parse_from_rfc3339("2020-04-24T08:00:00.5+00:00").unwrap();
        let mut source = docker();
        source.created = Some(created);
        let host = IsuladHostConfig::default();
        let ctx = V2Context {
            base_path: Path::new("/b"),
            host: &host,
            log_config: None,
            now: Local::now(),
        };

        let v2 = transform_v2_config(source, &ctx);
        assert_eq!(v2.common.created, Some(created));
        assert_eq!(
            v2.common.created.unwrap().offset(),
            created.with_timezone(&Local).offset()
        );
    }
}
