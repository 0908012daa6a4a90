// src/types/oci.rs

//! OCI runtime spec (`config.json`)
//!
//! Only the parts the transformation rewrites are typed. Every other key is
//! carried through `extra` so the rewritten spec keeps the process, hooks,
//! seccomp profile and the rest exactly as the source runtime had them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// OCI runtime spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<OciRoot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<OciMount>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<OciLinux>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI root filesystem config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciRoot {
    pub path: String,
    #[serde(default, skip_serializing_if = "crate::types::is_false")]
    pub readonly: bool,
}

/// OCI mount config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciMount {
    pub destination: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub mount_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI Linux-specific config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciLinux {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cgroups_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<OciNamespace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<OciDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<OciResources>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI namespace config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciNamespace {
    #[serde(rename = "type")]
    pub ns_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Device node created inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciDevice {
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OCI resource limits; only the device cgroup is rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<OciDeviceCgroup>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Device cgroup rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciDeviceCgroup {
    pub allow: bool,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub dev_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_survive() {
        let data = r#"{
            "ociVersion": "1.0.1",
            "process": {"terminal": false, "cwd": "/"},
            "root": {"path": "/var/lib/docker/overlay2/abc/merged"},
            "hostname": "web",
            "linux": {
                "cgroupsPath": "/docker/abc",
                "namespaces": [{"type": "pid"}, {"type": "network", "path": "/proc/1/ns/net"}],
                "resources": {"devices": [{"allow": false, "access": "rwm"}], "memory": {"limit": 1024}},
                "seccomp": {"defaultAction": "SCMP_ACT_ERRNO"}
            }
        }"#;
        let spec: OciSpec = serde_json::from_str(data).unwrap();
        let linux = spec.linux.as_ref().unwrap();
        assert_eq!(linux.cgroups_path, "/docker/abc");
        assert_eq!(linux.namespaces[1].path, "/proc/1/ns/net");
        assert!(linux.extra.contains_key("seccomp"));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["ociVersion"], "1.0.1");
        assert_eq!(value["hostname"], "web");
        assert_eq!(value["linux"]["resources"]["memory"]["limit"], 1024);
        assert!(value["linux"]["namespaces"][0].get("path").is_none());
    }

    #[test]
    fn test_mount_keeps_id_mappings() {
        let data = r#"{
            "destination": "/data",
            "type": "bind",
            "source": "/srv/data",
            "options": ["rbind"],
            "uidMappings": [{"containerID": 0, "hostID": 100000, "size": 65536}],
            "gidMappings": [{"containerID": 0, "hostID": 100000, "size": 65536}]
        }"#;
        let mount: OciMount = serde_json::from_str(data).unwrap();
        assert_eq!(mount.source, "/srv/data");
        assert_eq!(mount.extra.len(), 2);

        let value = serde_json::to_value(&mount).unwrap();
        assert_eq!(value["uidMappings"][0]["hostID"], 100000);
        assert_eq!(value["gidMappings"][0]["size"], 65536);
        assert_eq!(value["type"], "bind");
    }
}
