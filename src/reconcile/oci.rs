// src/reconcile/oci.rs

//! Runtime spec rewrite

use std::path::Path;

use super::{ANNOTATION_CGROUP_DIR, DEFAULT_CGROUP_DIR};
use crate::target::shm_options;
use crate::types::oci::{OciDeviceCgroup, OciNamespace, OciRoot};
use crate::types::{CommonConfig, IsuladHostConfig, OciSpec, is_full_container_id};

/// Character devices every unprivileged container needs for ptys
/// (`/dev/ptmx` and the `/dev/pts/*` range)
const PTY_DEVICES: [(i64, i64); 2] = [(5, 2), (136, -1)];

/// Id of the container a `container:<id>` namespace mode points at
fn shared_container(mode: &str) -> Option<&str> {
    match mode.split_once(':') {
        Some(("container", id)) if is_full_container_id(id) => Some(id),
        _ => None,
    }
}

/// Path of a namespace in the target spec
///
/// Namespaces shared with another container are referenced by that
/// container's id; every other path is dropped.
fn namespace_path(ns: &OciNamespace, host: &IsuladHostConfig) -> String {
    let mode = match ns.ns_type.as_str() {
        "ipc" => &host.ipc_mode,
        "pid" => &host.pid_mode,
        "network" => &host.network_mode,
        _ => return String::new(),
    };
    shared_container(mode).unwrap_or_default().to_string()
}

/// Allow the pty devices unless a rule for the same numbers exists
fn add_pty_devices(rules: &mut Vec<OciDeviceCgroup>) {
    for (major, minor) in PTY_DEVICES {
        let present = rules
            .iter()
            .any(|r| r.major == Some(major) && r.minor == Some(minor));
        if !present {
            rules.push(OciDeviceCgroup {
                allow: true,
                dev_type: "c".to_string(),
                major: Some(major),
                minor: Some(minor),
                access: "rwm".to_string(),
            });
        }
    }
}

/// Point the source runtime spec at the target bundle
///
/// `container` must already carry the new root filesystem in `base_fs`.
/// Returns the root path the source runtime used.
pub fn reconcile_oci_spec(
    spec: &mut OciSpec,
    container: &CommonConfig,
    host: &IsuladHostConfig,
) -> String {
    for (k, v) in &container.config.annotations {
        spec.annotations.insert(k.clone(), v.clone());
    }

    let root = spec.root.get_or_insert_with(OciRoot::default);
    let old_root = std::mem::replace(&mut root.path, container.base_fs.clone());

    let cgroup_dir = spec
        .annotations
        .entry(ANNOTATION_CGROUP_DIR.to_string())
        .or_insert_with(|| DEFAULT_CGROUP_DIR.to_string())
        .clone();

    let linux = spec.linux.get_or_insert_with(Default::default);
    linux.cgroups_path = Path::new(&cgroup_dir)
        .join(&container.id)
        .display()
        .to_string();

    for ns in &mut linux.namespaces {
        ns.path = namespace_path(ns, host);
    }

    if !host.privileged {
        let resources = linux.resources.get_or_insert_with(Default::default);
        add_pty_devices(&mut resources.devices);
    }

    for mount in &mut spec.mounts {
        let source = match mount.destination.as_str() {
            "/etc/hostname" => &container.hostname_path,
            "/etc/resolv.conf" => &container.resolv_conf_path,
            "/etc/hosts" => &container.hosts_path,
            "/dev/shm" => {
                mount
                    .options
                    .extend(shm_options(host.shm_size).split(',').map(str::to_string));
                &container.shm_path
            }
            _ => continue,
        };
        mount.source = source.clone();
    }

    // lxc cannot create device nodes whose path contains ':'
    linux.devices.retain(|d| !d.path.contains(':'));

    old_root
}
