// src/reconcile/host.rs

//! Host config rewrite

use tracing::info;

use crate::types::IsuladHostConfig;

/// Adapt a source host config to the target engine
///
/// The target has no `unless-stopped` restart policy and does not allow
/// sharing another container's user namespace.
pub fn reconcile_host_config(host: &mut IsuladHostConfig, runtime: &str) {
    host.runtime = runtime.to_string();

    if let Some(policy) = host.restart_policy.as_mut()
        && policy.name == "unless-stopped"
    {
        info!("isulad not support unless-stopped policy, transform to always");
        policy.name = "always".to_string();
    }

    if !host.userns_mode.is_empty() {
        info!(
            "isulad not allowed share user namespace {}, replace to nil",
            host.userns_mode
        );
        host.userns_mode.clear();
    }
}
