// src/target/runtime.rs

//! Registration of a finished bundle with the low-level runtime
//!
//! The runtime generates its own files (container config, hook list,
//! seccomp profile) from the OCI spec in the bundle directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Creates the runtime's view of a container from its OCI spec
#[async_trait]
pub trait RuntimeRegistrar: Send + Sync {
    /// Register `id` under `runtime_path` from the serialized spec
    async fn create(&self, id: &str, runtime_path: &Path, spec: &[u8]) -> Result<()>;
}

/// Registrar backed by an external helper program
///
/// ```text
/// <helper> create --name <id> --lcrpath /var/lib/isulad/engines/lcr < config.json
/// ```
pub struct ExecRegistrar {
    program: PathBuf,
}

impl ExecRegistrar {
    /// Locate the helper on `PATH` (or use it as given if it is a path)
    pub fn new(program: &Path) -> Result<Self> {
        let program = which::which(program).map_err(|e| {
            Error::InitError(format!(
                "runtime helper {} not found: {}",
                program.display(),
                e
            ))
        })?;
        Ok(Self { program })
    }
}

#[async_trait]
impl RuntimeRegistrar for ExecRegistrar {
    async fn create(&self, id: &str, runtime_path: &Path, spec: &[u8]) -> Result<()> {
        if spec.is_empty() {
            return Err(Error::Runtime("empty runtime spec".to_string()));
        }
        debug!(
            "{} create --name {} --lcrpath {}",
            self.program.display(),
            id,
            runtime_path.display()
        );

        let mut child = Command::new(&self.program)
            .arg("create")
            .arg("--name")
            .arg(id)
            .arg("--lcrpath")
            .arg(runtime_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Runtime(format!("run {}: {}", self.program.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(spec).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Runtime(format!(
                "lcr create failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Remembers every registration
    #[derive(Default)]
    pub struct RecordingRegistrar {
        pub created: Mutex<Vec<(String, PathBuf, serde_json::Value)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl RuntimeRegistrar for RecordingRegistrar {
        async fn create(&self, id: &str, runtime_path: &Path, spec: &[u8]) -> Result<()> {
            if self.fail {
                return Err(Error::Runtime("lcr create failed".to_string()));
            }
            let spec = serde_json::from_slice(spec)?;
            self.created
                .lock()
                .push((id.to_string(), runtime_path.to_path_buf(), spec));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_helper(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("lcr-helper");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_spec_is_fed_on_stdin() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("received");
        let helper = write_helper(
            temp.path(),
            &format!("echo \"$3 $5\" > {0}; cat >> {0}", out.display()),
        );
        let registrar = ExecRegistrar::new(&helper).unwrap();

        registrar
            .create("abc", Path::new("/var/lib/isulad/engines/lcr"), b"{\"ociVersion\":\"1.0.1\"}")
            .await
            .unwrap();

        let received = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            received,
            "abc /var/lib/isulad/engines/lcr\n{\"ociVersion\":\"1.0.1\"}"
        );
    }

    #[tokio::test]
    async fn test_helper_failure() {
        let temp = TempDir::new().unwrap();
        let helper = write_helper(temp.path(), "cat > /dev/null; echo 'bad spec' >&2; exit 1");
        let registrar = ExecRegistrar::new(&helper).unwrap();

        let err = registrar
            .create("abc", temp.path(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(ref m) if m.contains("bad spec")));
    }

    #[test]
    fn test_missing_helper() {
        assert!(matches!(
            ExecRegistrar::new(Path::new("/nonexistent/lcr-helper")),
            Err(Error::InitError(_))
        ));
    }
}
