// src/main.rs

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::stat::{Mode, umask};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crossdock::cli::Cli;
use crossdock::config::{DaemonConfig, TransformConfig};
use crossdock::logging;
use crossdock::transform::{Transformer, cancel_on_signals};

/// Exit code when initialization fails before any container is touched
const EXIT_INIT_FAILED: u8 = 1;
/// Exit code when at least one container failed to transform
const EXIT_TRANSFORM_FAILED: u8 = 2;

/// Load configuration and connect to every collaborator
async fn init(cli: &Cli) -> Result<Transformer> {
    let isulad = DaemonConfig::load(&cli.isulad_config_file).with_context(|| {
        format!(
            "failed to load isulad config {}",
            cli.isulad_config_file.display()
        )
    })?;
    let config = TransformConfig::new(cli.docker_config(), isulad, cli.helper_config());
    Ok(Transformer::init(&config).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    umask(Mode::from_bits_truncate(0o022));

    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log, &cli.log_level);

    let transformer = match init(&cli).await {
        Ok(t) => t,
        Err(e) => {
            error!("transform init failed: {:#}", e);
            eprintln!("transform init failed: {:#}", e);
            return ExitCode::from(EXIT_INIT_FAILED);
        }
    };

    let cancel = CancellationToken::new();
    if let Err(e) = cancel_on_signals(cancel.clone()) {
        error!("failed to install signal handlers: {}", e);
        eprintln!("failed to install signal handlers: {}", e);
        return ExitCode::from(EXIT_INIT_FAILED);
    }

    let mut results = transformer.transform(cli.ids.clone(), cli.all, cancel);
    let mut failed = false;
    while let Some(result) = results.recv().await {
        if result.ok {
            info!("{}", result);
            println!("{}", result);
        } else {
            error!("{}", result);
            eprintln!("{}", result);
            failed = true;
        }
    }

    if failed {
        eprintln!("The transformation has been completed, but at least one failed");
        return ExitCode::from(EXIT_TRANSFORM_FAILED);
    }
    ExitCode::SUCCESS
}
