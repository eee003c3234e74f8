//! OvirtImageIOPopulator CRD
//!
//! Declares a disk on an oVirt engine whose contents should populate a
//! PersistentVolumeClaim that references this resource via `dataSourceRef`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// API group of the populator CRD
pub const GROUP: &str = "forklift.konveyor.io";

/// API version of the populator CRD
pub const VERSION: &str = "v1beta1";

/// Kind of the populator CRD
pub const KIND: &str = "OvirtImageIOPopulator";

/// Plural resource name of the populator CRD
pub const PLURAL: &str = "ovirtimageiopopulators";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "forklift.konveyor.io",
    version = "v1beta1",
    kind = "OvirtImageIOPopulator",
    plural = "ovirtimageiopopulators",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OvirtImageIOPopulatorSpec {
    /// oVirt engine API URL (e.g. https://engine.example/ovirt-engine/api)
    pub engine_url: String,

    /// ID of the source disk on the engine
    pub disk_id: String,

    /// Name of a Secret holding `user`, `password` and `cacert`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_secret_name: Option<String>,

    /// Engine user name (inline credentials)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_user: Option<String>,

    /// Engine password (inline credentials)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_password: Option<String>,

    /// PEM CA certificate of the engine (inline credentials)
    #[serde(rename = "engineCA", default, skip_serializing_if = "Option::is_none")]
    pub engine_ca: Option<String>,
}

/// Which schema variant of the CRD the controller serves.
///
/// `Inline` keeps engine credentials in the custom resource itself and hands
/// them to worker pods on the command line, which exposes them to anyone who
/// can read the resource or the pod spec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialMode {
    /// `spec.engineSecretName` references a Secret
    #[default]
    Secret,

    /// `spec.engineUser`, `spec.enginePassword` and `spec.engineCA` carry literals
    Inline,
}

impl CredentialMode {
    /// Namespace the controller runs in when none is given on the command line
    pub fn default_namespace(self) -> &'static str {
        match self {
            CredentialMode::Secret => "ovirt-imageio-populator",
            CredentialMode::Inline => "konveyor-forklift",
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialMode::Secret => f.write_str("secret"),
            CredentialMode::Inline => f.write_str("inline"),
        }
    }
}

impl FromStr for CredentialMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secret" => Ok(CredentialMode::Secret),
            "inline" => Ok(CredentialMode::Inline),
            other => Err(format!("unknown credential mode '{other}' (expected 'secret' or 'inline')")),
        }
    }
}

/// Engine credentials carried by an `OvirtImageIOPopulator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCredentials {
    /// Credentials live in a Secret in the controller namespace
    SecretRef {
        /// Name of the Secret
        secret_name: String,
    },

    /// Credentials are embedded in the resource
    Inline {
        /// Engine user name
        user: String,
        /// Engine password
        password: String,
        /// PEM CA certificate
        ca: String,
    },
}

/// Errors raised when a spec does not match the configured schema variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// A field required by the credential mode is absent
    #[error("spec.{field} is required in {mode} credential mode")]
    MissingField {
        /// Credential mode in effect
        mode: CredentialMode,
        /// Missing field, as named in the CRD schema
        field: &'static str,
    },
}

impl OvirtImageIOPopulatorSpec {
    /// Extracts the credentials for the given schema variant.
    pub fn credentials(&self, mode: CredentialMode) -> Result<EngineCredentials, SpecError> {
        let require = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or(SpecError::MissingField { mode, field })
        };

        match mode {
            CredentialMode::Secret => Ok(EngineCredentials::SecretRef {
                secret_name: require(&self.engine_secret_name, "engineSecretName")?,
            }),
            CredentialMode::Inline => Ok(EngineCredentials::Inline {
                user: require(&self.engine_user, "engineUser")?,
                password: require(&self.engine_password, "enginePassword")?,
                ca: require(&self.engine_ca, "engineCA")?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_spec() -> OvirtImageIOPopulatorSpec {
        OvirtImageIOPopulatorSpec {
            engine_url: "https://engine.example/ovirt-engine/api".to_string(),
            disk_id: "abc-123".to_string(),
            engine_secret_name: Some("ovirt-creds".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_spec_uses_crd_field_names() {
        let spec = OvirtImageIOPopulatorSpec {
            engine_user: Some("admin@internal".to_string()),
            engine_password: Some("secret".to_string()),
            engine_ca: Some("PEM".to_string()),
            ..secret_spec()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["engineUrl"], "https://engine.example/ovirt-engine/api");
        assert_eq!(value["diskId"], "abc-123");
        assert_eq!(value["engineSecretName"], "ovirt-creds");
        assert_eq!(value["engineUser"], "admin@internal");
        assert_eq!(value["enginePassword"], "secret");
        assert_eq!(value["engineCA"], "PEM");
    }

    #[test]
    fn test_secret_mode_credentials() {
        let creds = secret_spec().credentials(CredentialMode::Secret).unwrap();
        assert_eq!(
            creds,
            EngineCredentials::SecretRef {
                secret_name: "ovirt-creds".to_string()
            }
        );
    }

    #[test]
    fn test_inline_mode_requires_every_field() {
        let spec = OvirtImageIOPopulatorSpec {
            engine_user: Some("admin@internal".to_string()),
            engine_password: Some("secret".to_string()),
            ..secret_spec()
        };

        let err = spec.credentials(CredentialMode::Inline).unwrap_err();
        assert_eq!(
            err,
            SpecError::MissingField {
                mode: CredentialMode::Inline,
                field: "engineCA"
            }
        );
    }

    #[test]
    fn test_secret_mode_rejects_inline_only_spec() {
        let spec = OvirtImageIOPopulatorSpec {
            engine_secret_name: None,
            engine_user: Some("admin@internal".to_string()),
            engine_password: Some("secret".to_string()),
            engine_ca: Some("PEM".to_string()),
            ..secret_spec()
        };

        assert!(spec.credentials(CredentialMode::Secret).is_err());
        assert!(matches!(
            spec.credentials(CredentialMode::Inline),
            Ok(EngineCredentials::Inline { .. })
        ));
    }

    #[test]
    fn test_credential_mode_parsing() {
        assert_eq!("secret".parse::<CredentialMode>(), Ok(CredentialMode::Secret));
        assert_eq!("inline".parse::<CredentialMode>(), Ok(CredentialMode::Inline));
        assert!("literal".parse::<CredentialMode>().is_err());
        assert_eq!(CredentialMode::default(), CredentialMode::Secret);
        assert_eq!(CredentialMode::Secret.default_namespace(), "ovirt-imageio-populator");
        assert_eq!(CredentialMode::Inline.default_namespace(), "konveyor-forklift");
    }
}
