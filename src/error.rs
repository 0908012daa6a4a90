// src/error.rs

//! Error types for container transformation

use std::path::PathBuf;

/// Result type alias for transformation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transforming a container
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Ambient Errors
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Startup failure; nothing has been transformed yet
    #[error("initialization failed: {0}")]
    InitError(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // =========================================================================
    // Filesystem Errors
    // =========================================================================
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    /// Source config file failed the size/type check
    #[error("invalid file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("mount error: {0}")]
    Mount(String),

    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("docker daemon error: {0}")]
    SourceEngine(String),

    /// Pause was refused because the container is already paused
    #[error("container {0} is already paused")]
    AlreadyPaused(String),

    #[error("image service error: {0}")]
    ImageService(String),

    #[error("runtime registration failed: {0}")]
    Runtime(String),

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A pipeline step failed; `step` names the step
    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns true if this error (or the error a step wraps) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Attach the failing pipeline step to an error
pub trait ResultExt<T> {
    fn step(self, step: &'static str) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn step(self, step: &'static str) -> Result<T> {
        self.map_err(|e| Error::Step {
            step,
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_message_chains_source() {
        let err: Result<()> = Err(Error::NotFound("hostconfig.json".to_string()));
        let err = err.step("transform hostconfig").unwrap_err();
        assert_eq!(
            err.to_string(),
            "transform hostconfig: not found: hostconfig.json"
        );
    }

    #[test]
    fn test_is_cancelled_through_step() {
        let err: Result<()> = Err(Error::Cancelled("prepare shm".to_string()));
        let err = err.step("prepare share shm").unwrap_err();
        assert!(err.is_cancelled());
        assert!(!Error::Runtime("x".into()).is_cancelled());
    }
}
