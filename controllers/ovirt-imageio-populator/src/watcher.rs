//! Kubernetes resource watchers.
//!
//! This module handles watching claims and worker pods and triggering
//! reconciliation.

use crate::error::ControllerError;
use crate::pod::worker_selector;
use crate::reconciler::Reconciler;
use futures::TryStreamExt;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::Api;
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    claim_api: Api<PersistentVolumeClaim>,
    pod_api: Api<Pod>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, claim_api: Api<PersistentVolumeClaim>, pod_api: Api<Pod>) -> Self {
        Self {
            reconciler,
            claim_api,
            pod_api,
        }
    }

    /// Starts watching PersistentVolumeClaim resources.
    pub async fn watch_claims(&self) -> Result<(), ControllerError> {
        info!("Starting PersistentVolumeClaim watcher");

        let mut stream = Box::pin(watcher(self.claim_api.clone(), watcher::Config::default()));

        while let Some(event) = stream.try_next().await
            .map_err(|e| ControllerError::Watch(format!("Watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(claim) | watcher::Event::InitApply(claim) => {
                    let name = claim.metadata.name.as_deref()
                        .unwrap_or("<unknown>");

                    match self.reconciler.reconcile_claim(&claim).await {
                        Ok(outcome) => debug!("Claim {}: {:?}", name, outcome),
                        Err(e) => error!("Failed to reconcile claim {}: {}", name, e),
                    }
                }
                watcher::Event::Delete(claim) => {
                    let name = claim.metadata.name.as_deref()
                        .unwrap_or("<unknown>");
                    debug!("Claim deleted: {}", name);
                }
                watcher::Event::Init => {
                    debug!("PersistentVolumeClaim watcher initialized");
                }
                watcher::Event::InitDone => {
                    info!("PersistentVolumeClaim watcher initialization complete");
                }
            }
        }

        Ok(())
    }

    /// Starts watching worker pods in the controller namespace.
    pub async fn watch_worker_pods(&self) -> Result<(), ControllerError> {
        info!("Starting worker pod watcher");

        let config = watcher::Config::default().labels(&worker_selector());
        let mut stream = Box::pin(watcher(self.pod_api.clone(), config));

        while let Some(event) = stream.try_next().await
            .map_err(|e| ControllerError::Watch(format!("Watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(pod) | watcher::Event::InitApply(pod) => {
                    let name = pod.metadata.name.as_deref()
                        .unwrap_or("<unknown>");

                    if let Err(e) = self.reconciler.reconcile_worker_pod(&pod).await {
                        warn!("Failed to reconcile worker pod {}: {}", name, e);
                    }
                }
                watcher::Event::Delete(pod) => {
                    let name = pod.metadata.name.as_deref()
                        .unwrap_or("<unknown>");
                    debug!("Worker pod deleted: {}", name);

                    // A replacement may have been refused while this one was terminating
                    if let Err(e) = self.reconciler.reconcile_worker_pod(&pod).await {
                        warn!("Failed to reconcile claim of deleted worker pod {}: {}", name, e);
                    }
                }
                watcher::Event::Init => {
                    debug!("Worker pod watcher initialized");
                }
                watcher::Event::InitDone => {
                    debug!("Worker pod watcher initialization complete");
                }
            }
        }

        Ok(())
    }
}
