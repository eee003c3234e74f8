//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the reconciler and the watchers together for controller mode.

use crate::cluster::KubeClusterClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::CredentialMode;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use populator::PodArgsBuilder;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for worker pod management.
pub struct Controller {
    claim_watcher: JoinHandle<Result<(), ControllerError>>,
    pod_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing oVirt ImageIO populator controller");

        if config.credential_mode == CredentialMode::Inline {
            warn!(
                "Inline credential mode: engine passwords are read from OvirtImageIOPopulator resources \
                 and passed to worker pods on the command line"
            );
        }
        if let Some(endpoint) = &config.http_endpoint {
            warn!(
                "Diagnostics server is not provided; ignoring --http-endpoint={} --metrics-path={}",
                endpoint, config.metrics_path
            );
        }

        let kube_client = build_client(&config).await?;

        let claim_api: Api<PersistentVolumeClaim> = match config.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        // Worker pods and prime claims live next to the controller
        let pod_api: Api<Pod> = Api::namespaced(kube_client.clone(), &config.namespace);

        let reconciler = Reconciler::new(
            Arc::new(KubeClusterClient::new(kube_client)),
            PodArgsBuilder::new(config.credential_mode, config.namespace.clone()),
            config.image_name.clone(),
            config.namespace.clone(),
        );

        // Create watchers - use Arc to share reconciler
        let reconciler_arc = Arc::new(reconciler);

        let claim_watcher_instance = Watcher::new(reconciler_arc.clone(), claim_api.clone(), pod_api.clone());
        let pod_watcher_instance = Watcher::new(reconciler_arc, claim_api, pod_api);

        // Start watchers in background tasks
        let claim_watcher = tokio::spawn(async move { claim_watcher_instance.watch_claims().await });
        let pod_watcher = tokio::spawn(async move { pod_watcher_instance.watch_worker_pods().await });

        info!("Configuration:");
        info!("  Image: {}", config.image_name);
        info!("  Credential mode: {}", config.credential_mode);
        info!("  Namespace: {}", config.namespace);
        info!("  Watching: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));

        Ok(Self {
            claim_watcher,
            pod_watcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("oVirt ImageIO populator controller running");

        // Watchers run forever; either one returning ends the controller
        tokio::select! {
            result = &mut self.claim_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Claim watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Claim watcher error: {}", e)))?;
            }
            result = &mut self.pod_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Worker pod watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Worker pod watcher error: {}", e)))?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                self.claim_watcher.abort();
                self.pod_watcher.abort();
            }
        }

        Ok(())
    }
}

/// Builds a client from `--kubeconfig` (or the inferred config) and `--master`.
async fn build_client(config: &ControllerConfig) -> Result<Client, ControllerError> {
    let mut kube_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };

    if let Some(master) = &config.master {
        kube_config.cluster_url = master
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("Invalid --master {master}: {e}")))?;
    }

    Ok(Client::try_from(kube_config)?)
}
