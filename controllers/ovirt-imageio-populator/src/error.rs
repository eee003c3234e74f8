//! Binary-level error types.
//!
//! Wraps the pipeline and Kubernetes errors so `main` has a single place to
//! decide the exit status.

use kube::Error as KubeError;
use populator::PopulatorError;
use thiserror::Error;

/// Errors that can occur in either mode of the populator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Populate pipeline or argument building error
    #[error("{0}")]
    Populator(#[from] PopulatorError),

    /// Kubeconfig could not be read or applied
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No usable cluster configuration was found
    #[error("Failed to infer Kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object with the same name already exists (HTTP 409)
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
