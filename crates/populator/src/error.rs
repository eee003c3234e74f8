//! Populate pipeline errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building worker arguments or populating a volume
#[derive(Debug, Error)]
pub enum PopulatorError {
    /// In-cluster configuration could not be loaded (service account token, env)
    #[error("Failed to load in-cluster config: {0}")]
    InClusterConfig(#[from] kube::config::InClusterError),

    /// Kubernetes client could not be constructed
    #[error("Failed to build Kubernetes client: {0}")]
    ClientBuild(#[source] kube::Error),

    /// Credential Secret could not be read
    #[error("Failed to get secret {namespace}/{name}: {source}")]
    SecretFetch {
        namespace: String,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Request references a Secret but no secret source was configured
    #[error("Credentials reference secret {0} but no secret source is configured")]
    MissingSecretSource(String),

    /// Custom resource could not be decoded into the expected schema
    #[error("Failed to decode OvirtImageIOPopulator: {0}")]
    Decode(String),

    /// Credential file could not be created or written
    #[error("Failed to write {}: {source}", .path.display())]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transfer tool could not be started
    #[error("Failed to run {program}: {source}")]
    TransferSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transfer tool exited unsuccessfully
    #[error("{program} exited with {}", describe_exit(.exit_code))]
    TransferFailed {
        program: String,
        exit_code: Option<i32>,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl PopulatorError {
    /// Decode errors are the only ones a controller should treat as recoverable.
    pub fn is_decode(&self) -> bool {
        matches!(self, PopulatorError::Decode(_))
    }
}
