//! Credential files for `ovirt-img`
//!
//! `ovirt-img` only accepts the password and CA certificate as file paths, so
//! both are written to fixed locations before the transfer starts. The files
//! are left in place: each worker pod runs exactly one transfer and is thrown
//! away afterwards.

use crate::error::PopulatorError;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Default location of the engine password file
pub const PASSWORD_FILE: &str = "/tmp/ovirt.pass";

/// Default location of the engine CA certificate file
pub const CA_FILE: &str = "/tmp/ca.pem";

/// Paths of the two credential files handed to `ovirt-img`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFiles {
    /// Password file
    pub password: PathBuf,
    /// CA certificate file
    pub ca: PathBuf,
}

impl Default for CredentialFiles {
    fn default() -> Self {
        Self {
            password: PathBuf::from(PASSWORD_FILE),
            ca: PathBuf::from(CA_FILE),
        }
    }
}

impl CredentialFiles {
    /// Same file names as the defaults, placed under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            password: dir.join("ovirt.pass"),
            ca: dir.join("ca.pem"),
        }
    }

    /// Writes both files, replacing any previous content.
    ///
    /// A failed write is reported like a failed create: a truncated password
    /// or certificate would otherwise surface as an opaque engine error.
    pub async fn write(&self, password: &[u8], ca_certificate: &[u8]) -> Result<(), PopulatorError> {
        write_file(&self.password, password).await?;
        write_file(&self.ca, ca_certificate).await?;
        debug!(
            "Wrote credential files {} and {}",
            self.password.display(),
            self.ca.display()
        );
        Ok(())
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), PopulatorError> {
    let io_err = |source| PopulatorError::CredentialFile {
        path: path.to_path_buf(),
        source,
    };

    // Dropped on every return path, which closes the handle.
    let mut file = File::create(path).await.map_err(io_err)?;
    file.write_all(contents).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let files = CredentialFiles::default();
        assert_eq!(files.password, PathBuf::from("/tmp/ovirt.pass"));
        assert_eq!(files.ca, PathBuf::from("/tmp/ca.pem"));
    }

    #[tokio::test]
    async fn test_write_stores_exact_contents() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles::in_dir(dir.path());
        let ca = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

        files.write("p@ss wörd\n".as_bytes(), ca.as_bytes()).await.unwrap();

        assert_eq!(std::fs::read(&files.password).unwrap(), "p@ss wörd\n".as_bytes());
        assert_eq!(std::fs::read(&files.ca).unwrap(), ca.as_bytes());
    }

    #[tokio::test]
    async fn test_write_keeps_non_utf8_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles::in_dir(dir.path());

        files.write(&[0xff, 0xfe], &[0x00, 0x80]).await.unwrap();

        assert_eq!(std::fs::read(&files.password).unwrap(), vec![0xff, 0xfe]);
        assert_eq!(std::fs::read(&files.ca).unwrap(), vec![0x00, 0x80]);
    }

    #[tokio::test]
    async fn test_write_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles::in_dir(dir.path());

        files.write(b"a-much-longer-old-password", b"old ca").await.unwrap();
        files.write(b"new", b"").await.unwrap();

        assert_eq!(std::fs::read_to_string(&files.password).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(&files.ca).unwrap(), "");
    }

    #[tokio::test]
    async fn test_unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles::in_dir(&dir.path().join("missing"));

        let err = files.write(b"secret", b"ca").await.unwrap_err();

        match err {
            PopulatorError::CredentialFile { path, .. } => assert_eq!(path, files.password),
            other => panic!("unexpected error: {other}"),
        }
    }
}
