// src/source/docker.rs

//! Docker daemon client
//!
//! Speaks plain HTTP over the daemon's Unix socket. Requests are sent as
//! HTTP/1.0 so the daemon answers with an unchunked body and closes the
//! connection when it is done.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use super::SourceEngine;
use crate::error::{Error, Result};
use crate::types::ContainerChange;

/// Error body returned by the daemon
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// HTTP response from the daemon
struct HttpResponse {
    status_code: u16,
    body: String,
}

impl HttpResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Message of an error response, falling back to the raw body
    fn error_message(&self) -> String {
        match serde_json::from_str::<ApiError>(&self.body) {
            Ok(e) => e.message,
            Err(_) => format!("status {}: {}", self.status_code, self.body.trim()),
        }
    }
}

/// Client for the source daemon's API socket
pub struct DockerClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DockerClient {
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect and check that the daemon answers
    pub async fn connect<P: AsRef<Path>>(socket_path: P) -> Result<Self> {
        let client = Self::new(socket_path);
        client.ping().await?;
        Ok(client)
    }

    pub async fn ping(&self) -> Result<()> {
        let response = self.request("GET", "/_ping").await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(Error::SourceEngine(format!(
                "ping docker daemon: {}",
                response.error_message()
            )))
        }
    }

    async fn request(&self, method: &str, path: &str) -> Result<HttpResponse> {
        debug!("docker {} {}", method, path);

        let exchange = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            let request = format!(
                "{} {} HTTP/1.0\r\n\
                 Host: docker\r\n\
                 Content-Length: 0\r\n\
                 \r\n",
                method, path
            );
            stream.write_all(request.as_bytes()).await?;

            let mut raw = Vec::new();
            stream.read_to_end(&mut raw).await?;
            Ok::<_, std::io::Error>(raw)
        };

        let raw = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                Error::SourceEngine(format!(
                    "docker {} {} timed out after {:?}",
                    method, path, self.timeout
                ))
            })?
            .map_err(|e| {
                Error::SourceEngine(format!(
                    "connect docker daemon at {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;

        parse_http_response(&String::from_utf8_lossy(&raw))
    }
}

fn parse_http_response(response: &str) -> Result<HttpResponse> {
    let (head, body) = response
        .split_once("\r\n\r\n")
        .unwrap_or((response, ""));

    let status_code = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::SourceEngine("malformed response from docker daemon".to_string()))?;

    Ok(HttpResponse {
        status_code,
        body: body.to_string(),
    })
}

#[async_trait]
impl SourceEngine for DockerClient {
    async fn pause(&self, id: &str) -> Result<()> {
        let response = self
            .request("POST", &format!("/containers/{}/pause", id))
            .await?;
        if response.is_success() {
            return Ok(());
        }

        let message = response.error_message();
        if message.contains("already paused") {
            Err(Error::AlreadyPaused(id.to_string()))
        } else {
            Err(Error::SourceEngine(message))
        }
    }

    async fn changes(&self, id: &str) -> Result<Vec<ContainerChange>> {
        let response = self
            .request("GET", &format!("/containers/{}/changes", id))
            .await?;
        if !response.is_success() {
            return Err(Error::SourceEngine(response.error_message()));
        }

        // an unchanged container is reported as `null`
        let changes: Option<Vec<ContainerChange>> = serde_json::from_str(&response.body)?;
        Ok(changes.unwrap_or_default())
    }
}
