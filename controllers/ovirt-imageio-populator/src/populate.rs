//! Populate mode: runs inside the worker pod.

use crate::config::PopulateConfig;
use crate::error::ControllerError;
use populator::{CredentialSource, KubeSecretSource, Populator, ProcessRunner};
use std::sync::Arc;
use tracing::info;

/// Copies the engine disk into the destination, once.
///
/// The cluster client is only built for secret-backed credentials.
pub async fn run(config: PopulateConfig) -> Result<(), ControllerError> {
    let mut populator = Populator::new(Arc::new(ProcessRunner)).with_tool(config.transfer_tool);

    if let CredentialSource::SecretRef { .. } = &config.request.credentials {
        populator = populator.with_secret_source(Arc::new(KubeSecretSource::in_cluster()?));
    }

    populator.populate(&config.request).await?;
    info!("Population of {} finished", config.request.destination_path);
    Ok(())
}
