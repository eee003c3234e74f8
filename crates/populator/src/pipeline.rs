//! Populate-mode pipeline
//!
//! Resolve credentials, write the credential files, run the transfer. Each step
//! runs once, in order, and the first error stops the run.

use crate::connection::PopulationRequest;
use crate::credentials::{resolve_connection, SecretSource};
use crate::error::PopulatorError;
use crate::materialize::CredentialFiles;
use crate::transfer::{run_transfer, CommandOutput, CommandRunner, DEFAULT_TRANSFER_TOOL};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs one population request end to end.
pub struct Populator {
    runner: Arc<dyn CommandRunner>,
    secrets: Option<Arc<dyn SecretSource>>,
    files: CredentialFiles,
    tool: String,
}

impl Populator {
    /// Pipeline with default credential files and `ovirt-img`, without secret access
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            secrets: None,
            files: CredentialFiles::default(),
            tool: DEFAULT_TRANSFER_TOOL.to_string(),
        }
    }

    /// Source for secret-backed credentials
    pub fn with_secret_source(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Where the password and CA files are written
    pub fn with_credential_files(mut self, files: CredentialFiles) -> Self {
        self.files = files;
        self
    }

    /// Transfer tool to invoke
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Populates `request.destination_path` from the engine disk.
    pub async fn populate(&self, request: &PopulationRequest) -> Result<CommandOutput, PopulatorError> {
        info!(
            "Populating {} from disk {} on {}",
            request.destination_path, request.disk_id, request.engine_url
        );

        let connection = resolve_connection(request, self.secrets.as_deref()).await?;

        let empty = connection.empty_fields();
        if !empty.is_empty() {
            warn!("Engine connection has empty fields: {}", empty.join(", "));
        }

        self.files.write(&connection.password, &connection.ca_certificate).await?;

        run_transfer(
            self.runner.as_ref(),
            &self.tool,
            &connection,
            &request.destination_path,
            &self.files,
        )
        .await
    }
}

impl fmt::Debug for Populator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Populator")
            .field("secrets", &self.secrets.is_some())
            .field("files", &self.files)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}
