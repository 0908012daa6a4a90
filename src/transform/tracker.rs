// src/transform/tracker.rs

//! Container discovery and claim tracking
//!
//! Candidates are the containers the source engine is currently running:
//! one directory per full container ID under its runtime state root. Each
//! candidate can be claimed exactly once per process; the claim is what
//! stops two requests for the same container (say `abc` and `abc1`) from
//! transforming it twice.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::is_full_container_id;

/// Claim status of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    /// No known container matches
    NotFound,
    /// Already claimed by an earlier request in this process
    AlreadyTransformed,
    /// Unclaimed; returned to the caller that wins the claim
    NeedsTransform,
}

/// Claim map of all candidate containers
#[derive(Debug, Default)]
pub struct ContainerTracker {
    containers: Mutex<BTreeMap<String, TransformStatus>>,
}

impl ContainerTracker {
    /// Create a tracker from a known set of container IDs
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let containers = ids
            .into_iter()
            .map(|id| (id.into(), TransformStatus::NeedsTransform))
            .collect();
        Self {
            containers: Mutex::new(containers),
        }
    }

    /// Enumerate running containers from the source runtime state directory
    ///
    /// Only directories named by a full container ID are candidates. Failing
    /// to list the directory is fatal.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            Error::InitError(format!(
                "init docker container store failed: {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && is_full_container_id(&name) {
                ids.push(name);
            } else {
                debug!("Skipping {} in container state dir", name);
            }
        }

        debug!("Found {} running containers in {}", ids.len(), dir.display());
        Ok(Self::new(ids))
    }

    /// All known container IDs, sorted
    pub fn ids(&self) -> Vec<String> {
        self.containers.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.containers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.lock().is_empty()
    }

    /// Resolve an ID or unique prefix and claim it
    ///
    /// Returns the full ID with the status seen *before* the claim. Empty,
    /// unknown and ambiguous prefixes resolve to `("", NotFound)` and leave
    /// the map untouched.
    pub fn claim(&self, prefix: &str) -> (String, TransformStatus) {
        if prefix.is_empty() {
            return (String::new(), TransformStatus::NotFound);
        }

        let mut containers = self.containers.lock();
        let mut matches = containers
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(id, _)| id.clone());

        let Some(full_id) = matches.next() else {
            return (String::new(), TransformStatus::NotFound);
        };
        if matches.next().is_some() {
            warn!("container ID prefix {} matches more than one container", prefix);
            return (String::new(), TransformStatus::NotFound);
        }
        drop(matches);

        Self::claim_locked(&mut containers, full_id)
    }

    /// Claim a full container ID without prefix resolution
    pub fn claim_exact(&self, id: &str) -> (String, TransformStatus) {
        let mut containers = self.containers.lock();
        if !containers.contains_key(id) {
            return (String::new(), TransformStatus::NotFound);
        }
        Self::claim_locked(&mut containers, id.to_string())
    }

    fn claim_locked(
        containers: &mut BTreeMap<String, TransformStatus>,
        id: String,
    ) -> (String, TransformStatus) {
        match containers.get_mut(&id) {
            Some(status) => {
                let previous = *status;
                if previous == TransformStatus::NeedsTransform {
                    *status = TransformStatus::AlreadyTransformed;
                }
                (id, previous)
            }
            None => (String::new(), TransformStatus::NotFound),
        }
    }

    /// Current status of a full ID, without claiming it
    pub fn status(&self, id: &str) -> TransformStatus {
        self.containers
            .lock()
            .get(id)
            .copied()
            .unwrap_or(TransformStatus::NotFound)
    }
}
