//! oVirt ImageIO Volume Populator
//!
//! Fills PersistentVolumeClaims with disks stored on an oVirt engine.
//!
//! The same binary runs in two modes:
//! - `--mode=controller` watches claims whose `dataSourceRef` names an
//!   `OvirtImageIOPopulator` and launches one worker pod per claim.
//! - `--mode=populate` runs in that worker pod and downloads the disk with
//!   `ovirt-img`.

mod cluster;
mod config;
mod controller;
mod error;
mod pod;
mod populate;
mod reconciler;
mod test_utils;
mod watcher;

use clap::Parser;
use config::{Cli, Config};
use controller::Controller;
use crate::error::ControllerError;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls stack needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ControllerError> {
    match Config::try_from(cli)? {
        Config::Controller(config) => {
            info!("Starting oVirt ImageIO populator controller");
            let controller = Controller::new(config).await?;
            controller.run().await
        }
        Config::Populate(config) => {
            info!("Starting oVirt ImageIO populate");
            populate::run(config).await
        }
    }
}
