//! oVirt ImageIO Populate Pipeline
//!
//! Everything a worker pod needs to copy an oVirt disk into a volume, plus the
//! controller-side builder for the worker's command line.
//!
//! The pipeline runs once per worker process:
//!
//! 1. resolve engine credentials ([`credentials`])
//! 2. write the password and CA certificate to disk ([`materialize`])
//! 3. run `ovirt-img download-disk` into the destination ([`transfer`])
//!
//! The destination itself is chosen on the controller side by [`target`] and
//! arrives in the worker's arguments, built by [`args`].
//!
//! # Example
//!
//! ```no_run
//! use populator::{CredentialSource, PopulationRequest, Populator, ProcessRunner};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), populator::PopulatorError> {
//! let request = PopulationRequest {
//!     engine_url: "https://engine.example/ovirt-engine/api".to_string(),
//!     disk_id: "abc-123".to_string(),
//!     destination_path: "/mnt/disk.img".to_string(),
//!     credentials: CredentialSource::Inline {
//!         user: "admin@internal".to_string(),
//!         password: "secret".to_string(),
//!         ca: "-----BEGIN CERTIFICATE-----\n...".to_string(),
//!     },
//! };
//!
//! Populator::new(Arc::new(ProcessRunner)).populate(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod args;
#[cfg(test)]
mod args_test;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod materialize;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod pipeline;
pub mod target;
pub mod transfer;

pub use args::{decode_populator, PodArgsBuilder};
pub use connection::{CredentialSource, EngineConnection, PopulationRequest};
pub use credentials::{resolve_connection, KubeSecretSource, SecretSource};
pub use error::PopulatorError;
pub use materialize::CredentialFiles;
pub use pipeline::Populator;
pub use target::{destination_path, DEVICE_PATH, DISK_IMAGE_NAME, MOUNT_PATH};
pub use transfer::{download_disk_args, CommandOutput, CommandRunner, ProcessRunner, DEFAULT_TRANSFER_TOOL};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCommandRunner, MockSecretSource};
