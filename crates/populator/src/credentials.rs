//! Credential resolution
//!
//! Turns a [`CredentialSource`] into an [`EngineConnection`]. Secret-backed
//! credentials are read once through a [`SecretSource`]; inline credentials are
//! copied as-is.

use crate::connection::{CredentialSource, EngineConnection, PopulationRequest};
use crate::error::PopulatorError;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Secret key holding the engine user name
pub const USER_KEY: &str = "user";

/// Secret key holding the engine password
pub const PASSWORD_KEY: &str = "password";

/// Secret key holding the engine CA certificate
pub const CA_CERT_KEY: &str = "cacert";

/// Read access to Secret data.
///
/// Implemented against the cluster API by [`KubeSecretSource`] and in memory
/// by `MockSecretSource` for tests.
#[async_trait::async_trait]
pub trait SecretSource: Send + Sync {
    /// Returns the raw `data` map of a Secret
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, PopulatorError>;
}

/// Reads Secrets through the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretSource {
    client: Client,
}

impl KubeSecretSource {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the pod's service account.
    pub fn in_cluster() -> Result<Self, PopulatorError> {
        let config = kube::Config::incluster()?;
        let client = Client::try_from(config).map_err(PopulatorError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl SecretSource for KubeSecretSource {
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, PopulatorError> {
        debug!("Fetching secret {}/{}", namespace, name);

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await.map_err(|e| PopulatorError::SecretFetch {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source: Box::new(e),
        })?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

/// Resolves the engine connection for a population request.
///
/// `secrets` is only consulted for [`CredentialSource::SecretRef`]; inline
/// requests never touch the cluster.
pub async fn resolve_connection(
    request: &PopulationRequest,
    secrets: Option<&dyn SecretSource>,
) -> Result<EngineConnection, PopulatorError> {
    let (username, password, ca_certificate) = match &request.credentials {
        CredentialSource::SecretRef { name, namespace } => {
            let source = secrets.ok_or_else(|| PopulatorError::MissingSecretSource(format!("{namespace}/{name}")))?;
            let data = source.secret_data(namespace, name).await?;
            info!("Loaded engine credentials from secret {}/{}", namespace, name);

            let field = |key: &str| match data.get(key) {
                Some(bytes) => bytes.clone(),
                None => {
                    warn!("Secret {}/{} has no '{}' key", namespace, name, key);
                    Vec::new()
                }
            };

            // The user name ends up on the command line; the rest goes to files untouched
            let username = String::from_utf8(field(USER_KEY)).map_err(|e| {
                PopulatorError::Decode(format!("secret {namespace}/{name}: '{USER_KEY}' is not valid UTF-8: {e}"))
            })?;
            (username, field(PASSWORD_KEY), field(CA_CERT_KEY))
        }
        CredentialSource::Inline { user, password, ca } => {
            (user.clone(), password.clone().into_bytes(), ca.clone().into_bytes())
        }
    };

    Ok(EngineConnection {
        url: request.engine_url.clone(),
        username,
        password,
        ca_certificate,
        disk_id: request.disk_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSecretSource;

    fn request(credentials: CredentialSource) -> PopulationRequest {
        PopulationRequest {
            engine_url: "https://engine.example/ovirt-engine/api".to_string(),
            disk_id: "abc-123".to_string(),
            destination_path: "/mnt/disk.img".to_string(),
            credentials,
        }
    }

    fn secret_ref() -> CredentialSource {
        CredentialSource::SecretRef {
            name: "ovirt-creds".to_string(),
            namespace: "ovirt-imageio-populator".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_from_secret() {
        let secrets = MockSecretSource::new();
        secrets.add_secret(
            "ovirt-imageio-populator",
            "ovirt-creds",
            &[("user", "admin@internal"), ("password", "hunter2"), ("cacert", "PEM DATA")],
        );

        let connection = resolve_connection(&request(secret_ref()), Some(&secrets)).await.unwrap();

        assert_eq!(connection.url, "https://engine.example/ovirt-engine/api");
        assert_eq!(connection.username, "admin@internal");
        assert_eq!(connection.password, b"hunter2");
        assert_eq!(connection.ca_certificate, b"PEM DATA");
        assert_eq!(connection.disk_id, "abc-123");
        assert_eq!(
            secrets.fetches(),
            vec![("ovirt-imageio-populator".to_string(), "ovirt-creds".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_secret_keys_resolve_to_empty_values() {
        let secrets = MockSecretSource::new();
        secrets.add_secret("ovirt-imageio-populator", "ovirt-creds", &[("user", "admin@internal")]);

        let connection = resolve_connection(&request(secret_ref()), Some(&secrets)).await.unwrap();

        assert_eq!(connection.username, "admin@internal");
        assert_eq!(connection.empty_fields(), vec!["password", "ca_certificate"]);
    }

    #[tokio::test]
    async fn test_secret_bytes_are_kept_verbatim() {
        let secrets = MockSecretSource::new();
        secrets.add_secret_bytes(
            "ovirt-imageio-populator",
            "ovirt-creds",
            &[
                ("user", &b"admin@internal"[..]),
                ("password", &[0xff, 0xfe][..]),
                ("cacert", &b"PEM\r\n\x00"[..]),
            ],
        );

        let connection = resolve_connection(&request(secret_ref()), Some(&secrets)).await.unwrap();

        assert_eq!(connection.password, vec![0xff, 0xfe]);
        assert_eq!(connection.ca_certificate, b"PEM\r\n\x00".to_vec());
    }

    #[tokio::test]
    async fn test_non_utf8_user_is_rejected() {
        let secrets = MockSecretSource::new();
        secrets.add_secret_bytes("ovirt-imageio-populator", "ovirt-creds", &[("user", &[0xc3, 0x28][..])]);

        let err = resolve_connection(&request(secret_ref()), Some(&secrets)).await.unwrap_err();

        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_secret_not_found_is_an_error() {
        let secrets = MockSecretSource::new();

        let err = resolve_connection(&request(secret_ref()), Some(&secrets)).await.unwrap_err();

        assert!(matches!(err, PopulatorError::SecretFetch { ref name, .. } if name == "ovirt-creds"));
    }

    #[tokio::test]
    async fn test_secret_ref_without_source_is_an_error() {
        let err = resolve_connection(&request(secret_ref()), None).await.unwrap_err();
        assert!(matches!(err, PopulatorError::MissingSecretSource(_)));
    }

    #[tokio::test]
    async fn test_inline_credentials_skip_the_cluster() {
        let secrets = MockSecretSource::new();
        let inline = CredentialSource::Inline {
            user: "admin@internal".to_string(),
            password: "hunter2".to_string(),
            ca: "PEM DATA".to_string(),
        };

        let connection = resolve_connection(&request(inline), Some(&secrets)).await.unwrap();

        assert_eq!(connection.username, "admin@internal");
        assert_eq!(connection.password, b"hunter2");
        assert_eq!(connection.ca_certificate, b"PEM DATA");
        assert!(secrets.fetches().is_empty());
    }
}
