// src/cli.rs
//! CLI definitions for crossdock
//!
//! Kept in sync with `build_cli()` in build.rs, which renders the man page.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    DEFAULT_DOCKER_GRAPH, DEFAULT_DOCKER_SOCKET, DEFAULT_DOCKER_STATE, DockerConfig, HelperConfig,
};

#[derive(Parser, Debug)]
#[command(name = "crossdock")]
#[command(author = "Crossdock Contributors")]
#[command(version)]
#[command(about = "Migrate paused Docker containers to iSulad in place", long_about = None)]
pub struct Cli {
    /// Log file path
    #[arg(long, value_name = "PATH", default_value = "/var/log/crossdock/transform.log")]
    pub log: PathBuf,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        value_parser = ["debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// iSulad daemon configuration file
    #[arg(long, value_name = "PATH", default_value = "/etc/isulad/daemon.json")]
    pub isulad_config_file: PathBuf,

    /// Docker graph root
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DOCKER_GRAPH)]
    pub docker_graph: PathBuf,

    /// Docker execution state root
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DOCKER_STATE)]
    pub docker_state: PathBuf,

    /// Docker daemon socket
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DOCKER_SOCKET)]
    pub docker_socket: PathBuf,

    /// Program driving the iSulad image store
    #[arg(long, value_name = "PATH", default_value = "isulad-img-helper")]
    pub image_helper: PathBuf,

    /// Program registering containers with the lcr runtime
    #[arg(long, value_name = "PATH", default_value = "lcr-create-helper")]
    pub runtime_helper: PathBuf,

    /// Transform every running Docker container
    #[arg(short, long, conflicts_with = "ids")]
    pub all: bool,

    /// Container IDs or unique ID prefixes
    #[arg(num_args = 1.., required_unless_present = "all")]
    pub ids: Vec<String>,
}

impl Cli {
    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            graph: self.docker_graph.clone(),
            state: self.docker_state.clone(),
            socket: self.docker_socket.clone(),
        }
    }

    pub fn helper_config(&self) -> HelperConfig {
        HelperConfig {
            image_helper: self.image_helper.clone(),
            runtime_helper: self.runtime_helper.clone(),
        }
    }
}
