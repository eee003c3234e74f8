//! Command line and runtime configuration.
//!
//! The command line is parsed once into [`Cli`] and converted into a typed
//! [`Config`] for the selected mode; nothing reads flags after that.

use crate::error::ControllerError;
use clap::{Parser, ValueEnum};
use crds::CredentialMode;
use populator::{CredentialSource, PopulationRequest, DEFAULT_TRANSFER_TOOL};
use std::path::PathBuf;

/// Process mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Watch claims and launch worker pods
    Controller,
    /// Copy one disk into a volume (worker pod)
    Populate,
}

/// oVirt ImageIO volume populator
#[derive(Debug, Parser)]
#[command(name = "ovirt-imageio-populator", version, about, long_about = None)]
pub struct Cli {
    /// Mode to run in
    #[arg(long, value_enum)]
    pub mode: Mode,

    // Populate args
    /// ovirt-engine url (https://engine.fqdn/ovirt-engine/api)
    #[arg(long)]
    pub engine_url: Option<String>,

    /// Secret containing oVirt credentials
    #[arg(long)]
    pub secret_name: Option<String>,

    /// ovirt-engine disk id
    #[arg(long)]
    pub disk_id: Option<String>,

    /// File or block device to populate
    #[arg(long)]
    pub file_name: Option<String>,

    /// oVirt user name (inline credentials)
    #[arg(long)]
    pub engine_user: Option<String>,

    /// oVirt password (inline credentials)
    #[arg(long)]
    pub engine_password: Option<String>,

    /// oVirt engine CA certificate in PEM form (inline credentials)
    #[arg(long)]
    pub ca: Option<String>,

    /// Transfer tool to run
    #[arg(long, default_value = DEFAULT_TRANSFER_TOOL)]
    pub transfer_tool: String,

    // Controller args
    /// Path to a kubeconfig. Only required if out-of-cluster.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Address of the Kubernetes API server. Overrides any value in kubeconfig.
    #[arg(long)]
    pub master: Option<String>,

    /// Image to use for populating
    #[arg(long)]
    pub image_name: Option<String>,

    /// Where credentials are read from in OvirtImageIOPopulator resources (secret, inline)
    #[arg(long, default_value_t = CredentialMode::Secret)]
    pub credential_mode: CredentialMode,

    /// Namespace to watch for claims (all namespaces if unset)
    #[arg(long)]
    pub watch_namespace: Option<String>,

    // Metrics args
    /// TCP address for the diagnostics server (accepted for compatibility, not served)
    #[arg(long)]
    pub http_endpoint: Option<String>,

    /// HTTP path for metrics (accepted for compatibility, not served)
    #[arg(long, default_value = "/metrics")]
    pub metrics_path: String,

    // Other args
    /// Namespace of the controller, its worker pods and the credential Secret
    #[arg(long)]
    pub namespace: Option<String>,
}

/// Controller mode settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub kubeconfig: Option<PathBuf>,
    pub master: Option<String>,
    pub image_name: String,
    pub credential_mode: CredentialMode,
    pub namespace: String,
    pub watch_namespace: Option<String>,
    pub http_endpoint: Option<String>,
    pub metrics_path: String,
}

/// Populate mode settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateConfig {
    pub request: PopulationRequest,
    pub transfer_tool: String,
}

/// Validated settings for the selected mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Config {
    Controller(ControllerConfig),
    Populate(PopulateConfig),
}

fn required(value: Option<String>, flag: &str) -> Result<String, ControllerError> {
    value.ok_or_else(|| ControllerError::InvalidConfig(format!("--{flag} is required")))
}

impl TryFrom<Cli> for Config {
    type Error = ControllerError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        match cli.mode {
            Mode::Controller => Ok(Config::Controller(ControllerConfig {
                image_name: required(cli.image_name, "image-name")?,
                namespace: cli
                    .namespace
                    .unwrap_or_else(|| cli.credential_mode.default_namespace().to_string()),
                kubeconfig: cli.kubeconfig,
                master: cli.master,
                credential_mode: cli.credential_mode,
                watch_namespace: cli.watch_namespace,
                http_endpoint: cli.http_endpoint,
                metrics_path: cli.metrics_path,
            })),
            Mode::Populate => {
                let credentials = match (cli.secret_name, cli.engine_user, cli.engine_password, cli.ca) {
                    (Some(name), None, None, None) => CredentialSource::SecretRef {
                        name,
                        namespace: cli
                            .namespace
                            .unwrap_or_else(|| CredentialMode::Secret.default_namespace().to_string()),
                    },
                    (None, Some(user), Some(password), Some(ca)) => CredentialSource::Inline { user, password, ca },
                    (None, None, None, None) => {
                        return Err(ControllerError::InvalidConfig(
                            "either --secret-name or --engine-user, --engine-password and --ca is required".to_string(),
                        ));
                    }
                    (Some(_), ..) => {
                        return Err(ControllerError::InvalidConfig(
                            "--secret-name cannot be combined with inline credentials".to_string(),
                        ));
                    }
                    _ => {
                        return Err(ControllerError::InvalidConfig(
                            "--engine-user, --engine-password and --ca must be given together".to_string(),
                        ));
                    }
                };

                Ok(Config::Populate(PopulateConfig {
                    request: PopulationRequest {
                        engine_url: required(cli.engine_url, "engine-url")?,
                        disk_id: required(cli.disk_id, "disk-id")?,
                        destination_path: required(cli.file_name, "file-name")?,
                        credentials,
                    },
                    transfer_tool: cli.transfer_tool,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, ControllerError> {
        let cli = Cli::try_parse_from(std::iter::once("ovirt-imageio-populator").chain(args.iter().copied()))
            .map_err(|e| ControllerError::InvalidConfig(e.to_string()))?;
        Config::try_from(cli)
    }

    #[test]
    fn test_populate_with_secret() {
        let config = parse(&[
            "--mode=populate",
            "--file-name=/mnt/disk.img",
            "--secret-name=ovirt-creds",
            "--disk-id=abc-123",
            "--engine-url=https://engine.example/ovirt-engine/api",
            "--namespace=ovirt-imageio-populator",
        ])
        .unwrap();

        assert_eq!(
            config,
            Config::Populate(PopulateConfig {
                request: PopulationRequest {
                    engine_url: "https://engine.example/ovirt-engine/api".to_string(),
                    disk_id: "abc-123".to_string(),
                    destination_path: "/mnt/disk.img".to_string(),
                    credentials: CredentialSource::SecretRef {
                        name: "ovirt-creds".to_string(),
                        namespace: "ovirt-imageio-populator".to_string(),
                    },
                },
                transfer_tool: "ovirt-img".to_string(),
            })
        );
    }

    #[test]
    fn test_populate_accepts_builder_output() {
        let object_args = [
            "--mode=populate",
            "--file-name=/dev/block",
            "--engine-user=admin@internal",
            "--engine-password=hunter2",
            "--ca=-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----",
            "--disk-id=abc-123",
            "--engine-url=https://engine.example/ovirt-engine/api",
        ];

        let Config::Populate(config) = parse(&object_args).unwrap() else {
            panic!("expected populate config");
        };
        assert_eq!(config.request.destination_path, "/dev/block");
        assert_eq!(
            config.request.credentials,
            CredentialSource::Inline {
                user: "admin@internal".to_string(),
                password: "hunter2".to_string(),
                ca: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".to_string(),
            }
        );
    }

    #[test]
    fn test_populate_secret_namespace_defaults() {
        let Config::Populate(config) = parse(&[
            "--mode=populate",
            "--file-name=/mnt/disk.img",
            "--secret-name=ovirt-creds",
            "--disk-id=abc-123",
            "--engine-url=https://engine.example",
        ])
        .unwrap() else {
            panic!("expected populate config");
        };

        assert!(matches!(
            config.request.credentials,
            CredentialSource::SecretRef { ref namespace, .. } if namespace == "ovirt-imageio-populator"
        ));
    }

    #[test]
    fn test_populate_credential_flag_combinations() {
        let base = ["--mode=populate", "--file-name=/dev/block", "--disk-id=abc", "--engine-url=https://e"];

        let none = parse(&base);
        assert!(matches!(none, Err(ControllerError::InvalidConfig(_))));

        let both = parse(&[&base[..], &["--secret-name=s", "--engine-user=u", "--engine-password=p", "--ca=c"][..]].concat());
        assert!(matches!(both, Err(ControllerError::InvalidConfig(_))));

        let partial = parse(&[&base[..], &["--engine-user=u", "--ca=c"][..]].concat());
        assert!(matches!(partial, Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_populate_requires_disk_id() {
        let err = parse(&[
            "--mode=populate",
            "--file-name=/dev/block",
            "--secret-name=s",
            "--engine-url=https://e",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("--disk-id"));
    }

    #[test]
    fn test_controller_defaults() {
        let config = parse(&["--mode=controller", "--image-name=quay.io/kubev2v/ovirt-populator:latest"]).unwrap();

        assert_eq!(
            config,
            Config::Controller(ControllerConfig {
                kubeconfig: None,
                master: None,
                image_name: "quay.io/kubev2v/ovirt-populator:latest".to_string(),
                credential_mode: CredentialMode::Secret,
                namespace: "ovirt-imageio-populator".to_string(),
                watch_namespace: None,
                http_endpoint: None,
                metrics_path: "/metrics".to_string(),
            })
        );
    }

    #[test]
    fn test_controller_inline_mode_namespace_default() {
        let Config::Controller(config) = parse(&["--mode=controller", "--image-name=img", "--credential-mode=inline"]).unwrap()
        else {
            panic!("expected controller config");
        };
        assert_eq!(config.credential_mode, CredentialMode::Inline);
        assert_eq!(config.namespace, "konveyor-forklift");
    }

    #[test]
    fn test_controller_requires_image() {
        assert!(matches!(parse(&["--mode=controller"]), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(parse(&["--mode=migrate"]).is_err());
        assert!(parse(&["--mode=controller", "--image-name=img", "--credential-mode=literal"]).is_err());
    }
}
