// src/transaction/mod.rs

//! All-or-nothing semantics for one container transformation
//!
//! A transformation is a fixed sequence of side-effecting steps. After each
//! step whose effect must be undone on failure, a compensating action is
//! registered with the container's [`RollbackLedger`]. If a later step fails,
//! or the operator interrupts the run, the ledger undoes the completed steps
//! in reverse order.
//!
//! # Transformation Lifecycle
//!
//! ```text
//! PAUSED -> BUNDLE_PREPARED -> HOSTCONFIG -> CONFIG_V2 -> SHM -> NETWORK_FILES -> OCI_CONFIG -> RW_LAYER -> FINALIZED
//!               |                               |          |
//!           remove bundle              remove rootfs    umount shm       (compensations, run LIFO)
//! ```

mod rollback;

pub use rollback::{RollbackLedger, StepGuard};

use std::fmt;

/// Transformation state machine phases
///
/// Each state is reached when the step of the same name has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformState {
    /// Source container processes are suspended
    Paused,
    /// Target bundle directory exists
    BundlePrepared,
    /// Target hostconfig.json written
    HostConfigWritten,
    /// Target rootfs allocated and config.v2.json written
    V2ConfigWritten,
    /// Shared memory tmpfs mounted
    ShmPrepared,
    /// hostname, hosts and resolv.conf copied into the bundle
    NetworkFilesCopied,
    /// Target config.json written
    OciConfigWritten,
    /// Writable layer content replicated into the new rootfs
    RwLayerMigrated,
    /// Container registered with the target runtime
    Finalized,
}

impl TransformState {
    /// Every state, in the order a transformation passes through them
    pub const ALL: [TransformState; 9] = [
        Self::Paused,
        Self::BundlePrepared,
        Self::HostConfigWritten,
        Self::V2ConfigWritten,
        Self::ShmPrepared,
        Self::NetworkFilesCopied,
        Self::OciConfigWritten,
        Self::RwLayerMigrated,
        Self::Finalized,
    ];

    /// Name of the step that leads into this state, used in error messages
    pub fn step(&self) -> &'static str {
        match self {
            Self::Paused => "pause container",
            Self::BundlePrepared => "prepare bundle dir",
            Self::HostConfigWritten => "transform hostconfig",
            Self::V2ConfigWritten => "transform configV2",
            Self::ShmPrepared => "prepare share shm",
            Self::NetworkFilesCopied => "copy network files",
            Self::OciConfigWritten => "transform oci spec",
            Self::RwLayerMigrated => "transform RWLayer",
            Self::Finalized => "register runtime",
        }
    }

    /// Returns true if completing this step registers a compensation
    pub fn is_compensated(&self) -> bool {
        matches!(
            self,
            Self::BundlePrepared | Self::V2ConfigWritten | Self::ShmPrepared
        )
    }
}

impl fmt::Display for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        let mut sorted = TransformState::ALL;
        sorted.sort();
        assert_eq!(sorted, TransformState::ALL);
        assert!(TransformState::Paused < TransformState::Finalized);
    }

    #[test]
    fn test_compensated_states() {
        let compensated: Vec<_> = TransformState::ALL
            .iter()
            .filter(|s| s.is_compensated())
            .collect();
        assert_eq!(
            compensated,
            vec![
                &TransformState::BundlePrepared,
                &TransformState::V2ConfigWritten,
                &TransformState::ShmPrepared
            ]
        );
    }
}
