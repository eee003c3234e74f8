//! Worker pod arguments
//!
//! Translates an `OvirtImageIOPopulator` into the command line of the worker
//! pod that runs this binary in populate mode.

use crate::error::PopulatorError;
use crate::target::destination_path;
use crds::{CredentialMode, EngineCredentials, OvirtImageIOPopulator, KIND};
use kube::api::DynamicObject;

/// Builds worker arguments for one credential mode.
///
/// Holds no mutable state, so one builder can serve any number of
/// concurrent reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodArgsBuilder {
    credential_mode: CredentialMode,
    namespace: String,
}

impl PodArgsBuilder {
    /// `namespace` is where secret-mode workers look up the credential Secret
    pub fn new(credential_mode: CredentialMode, namespace: impl Into<String>) -> Self {
        Self {
            credential_mode,
            namespace: namespace.into(),
        }
    }

    /// Credential mode this builder decodes resources with
    pub fn credential_mode(&self) -> CredentialMode {
        self.credential_mode
    }

    /// Arguments for the populate-mode worker of `object`.
    ///
    /// Returns [`PopulatorError::Decode`] when the object does not match the
    /// CRD schema or lacks the credential fields of the configured mode.
    pub fn populator_pod_args(&self, raw_block: bool, object: &DynamicObject) -> Result<Vec<String>, PopulatorError> {
        let populator = decode_populator(object)?;
        let spec = &populator.spec;
        let credentials = spec
            .credentials(self.credential_mode)
            .map_err(|e| PopulatorError::Decode(e.to_string()))?;

        let mut args = vec![
            "--mode=populate".to_string(),
            format!("--file-name={}", destination_path(raw_block)),
        ];

        match &credentials {
            EngineCredentials::SecretRef { secret_name } => {
                args.push(format!("--secret-name={secret_name}"));
            }
            EngineCredentials::Inline { user, password, ca } => {
                args.push(format!("--engine-user={user}"));
                args.push(format!("--engine-password={password}"));
                args.push(format!("--ca={ca}"));
            }
        }

        args.push(format!("--disk-id={}", spec.disk_id));
        args.push(format!("--engine-url={}", spec.engine_url));

        if matches!(credentials, EngineCredentials::SecretRef { .. }) {
            args.push(format!("--namespace={}", self.namespace));
        }

        Ok(args)
    }
}

/// Decodes a dynamic object into the typed CRD.
pub fn decode_populator(object: &DynamicObject) -> Result<OvirtImageIOPopulator, PopulatorError> {
    if let Some(types) = &object.types {
        if types.kind != KIND {
            return Err(PopulatorError::Decode(format!("expected kind {KIND}, got {}", types.kind)));
        }
    }

    let value = serde_json::to_value(object).map_err(|e| PopulatorError::Decode(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| PopulatorError::Decode(e.to_string()))
}
