//! Engine connection and population request models

use std::fmt;

/// Everything needed to authenticate to the engine and locate the source disk.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConnection {
    /// Engine API URL
    pub url: String,
    /// Engine user name
    pub username: String,
    /// Engine password, exactly as stored
    pub password: Vec<u8>,
    /// PEM CA certificate used to verify the engine, exactly as stored
    pub ca_certificate: Vec<u8>,
    /// ID of the source disk
    pub disk_id: String,
}

impl EngineConnection {
    /// Names of credential fields that are empty.
    ///
    /// Empty values are not rejected; `ovirt-img` is left to fail on them.
    pub fn empty_fields(&self) -> Vec<&'static str> {
        [
            ("url", self.url.is_empty()),
            ("username", self.username.is_empty()),
            ("password", self.password.is_empty()),
            ("ca_certificate", self.ca_certificate.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect()
    }
}

impl fmt::Debug for EngineConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConnection")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_certificate", &format_args!("<{} bytes>", self.ca_certificate.len()))
            .field("disk_id", &self.disk_id)
            .finish()
    }
}

/// Where the worker gets its engine credentials from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read `user`, `password` and `cacert` from a Secret
    SecretRef {
        /// Secret name
        name: String,
        /// Secret namespace
        namespace: String,
    },

    /// Literal credentials passed on the command line
    Inline {
        /// Engine user name
        user: String,
        /// Engine password
        password: String,
        /// PEM CA certificate
        ca: String,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::SecretRef { name, namespace } => f
                .debug_struct("SecretRef")
                .field("name", name)
                .field("namespace", namespace)
                .finish(),
            CredentialSource::Inline { user, .. } => f
                .debug_struct("Inline")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

/// Parameters of one populate-mode run, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationRequest {
    /// Engine API URL
    pub engine_url: String,
    /// ID of the source disk
    pub disk_id: String,
    /// Block device or image file to write
    pub destination_path: String,
    /// Credential origin
    pub credentials: CredentialSource,
}
