//! Reconciliation logic for claims populated from oVirt disks.
//!
//! Per `PersistentVolumeClaim` this module creates the prime claim and the
//! worker pod in the controller namespace, replaces a failed worker, hands the
//! populated volume to the claim once the worker succeeded, and cleans up after
//! the claim is bound.

use crate::cluster::ClusterClient;
use crate::error::ControllerError;
use crate::pod::{
    build_prime_claim, build_worker_pod, prime_claim_name, worker_pod_name, ClaimRef, CLAIM_ANNOTATION,
    CLAIM_NAMESPACE_ANNOTATION, SELECTED_NODE_ANNOTATION,
};
use crds::{GROUP, KIND};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use populator::PodArgsBuilder;
use std::sync::Arc;
use tracing::{debug, info, warn};

const WAIT_FOR_FIRST_CONSUMER: &str = "WaitForFirstConsumer";

/// Result of reconciling one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Claim is not populated from an OvirtImageIOPopulator
    Ignored,
    /// Claim is bound; leftovers removed
    AlreadyPopulated,
    /// Claim uses `WaitForFirstConsumer` storage and no node was selected yet
    WaitingForConsumer,
    /// Worker pod created
    Launched,
    /// Failed worker pod replaced by a new one
    Respawned,
    /// Worker pod pending, running or still terminating
    InProgress,
    /// Worker pod succeeded; volume handed to the claim
    Completed,
    /// Referenced OvirtImageIOPopulator does not exist (yet)
    SourceMissing,
    /// Referenced OvirtImageIOPopulator does not decode; left for a later edit
    InvalidSource,
}

/// Reconciles claims and their worker pods.
pub struct Reconciler {
    cluster: Arc<dyn ClusterClient>,
    args: PodArgsBuilder,
    image: String,
    namespace: String,
}

impl Reconciler {
    /// Creates a new reconciler; worker pods and prime claims go to `namespace`.
    pub fn new(cluster: Arc<dyn ClusterClient>, args: PodArgsBuilder, image: String, namespace: String) -> Self {
        Self {
            cluster,
            args,
            image,
            namespace,
        }
    }

    /// Reconciles a PersistentVolumeClaim.
    ///
    /// This method:
    /// 1. Ignores claims whose `dataSourceRef` is not an OvirtImageIOPopulator
    /// 2. Cleans up the worker pod and prime claim once the claim is bound
    /// 3. Tracks the claim's worker pod, replacing it if it failed
    /// 4. Rebinds the prime claim's volume to the claim when the worker succeeded
    /// 5. Launches a worker pod when there is none
    pub async fn reconcile_claim(&self, claim: &PersistentVolumeClaim) -> Result<ReconcileOutcome, ControllerError> {
        let Some(source) = claim.spec.as_ref().and_then(|spec| spec.data_source_ref.as_ref()) else {
            return Ok(ReconcileOutcome::Ignored);
        };
        if source.api_group.as_deref() != Some(GROUP) || source.kind != KIND {
            return Ok(ReconcileOutcome::Ignored);
        }

        let name = claim.metadata.name.as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig("PersistentVolumeClaim missing name".to_string()))?;
        let namespace = claim.metadata.namespace.as_deref()
            .unwrap_or("default");
        let uid = claim.metadata.uid.as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("PersistentVolumeClaim {namespace}/{name} missing uid")))?;
        let claim_ref = ClaimRef { name, namespace, uid };

        let bound = claim.spec.as_ref()
            .and_then(|spec| spec.volume_name.as_deref())
            .is_some_and(|volume| !volume.is_empty());
        if bound {
            self.clean_up(&claim_ref).await?;
            return Ok(ReconcileOutcome::AlreadyPopulated);
        }

        let pod_name = worker_pod_name(uid);
        let Some(pod) = self.cluster.get_pod(&self.namespace, &pod_name).await? else {
            return self.launch(claim, &claim_ref, ReconcileOutcome::Launched).await;
        };

        if pod.metadata.deletion_timestamp.is_some() {
            debug!("Worker pod {}/{} is terminating", self.namespace, pod_name);
            return Ok(ReconcileOutcome::InProgress);
        }

        match pod_phase(&pod) {
            "Succeeded" => self.rebind(claim, &claim_ref).await,
            "Failed" => {
                warn!("Worker pod {}/{} failed, launching a new one", self.namespace, pod_name);
                self.cluster.delete_pod(&self.namespace, &pod_name).await?;
                self.launch(claim, &claim_ref, ReconcileOutcome::Respawned).await
            }
            phase => {
                debug!("Worker pod {}/{} is {}", self.namespace, pod_name, phase);
                Ok(ReconcileOutcome::InProgress)
            }
        }
    }

    /// Reconciles the claim a worker pod belongs to.
    ///
    /// Called for updates and deletions alike: a deleted worker is what lets a
    /// failed population start over.
    pub async fn reconcile_worker_pod(&self, pod: &Pod) -> Result<ReconcileOutcome, ControllerError> {
        let annotations = pod.metadata.annotations.as_ref();
        let Some(claim_name) = annotations.and_then(|annotations| annotations.get(CLAIM_ANNOTATION)) else {
            return Ok(ReconcileOutcome::Ignored);
        };
        let namespace = annotations
            .and_then(|annotations| annotations.get(CLAIM_NAMESPACE_ANNOTATION))
            .map(String::as_str)
            .or(pod.metadata.namespace.as_deref())
            .unwrap_or("default");

        match self.cluster.get_claim(namespace, claim_name).await? {
            Some(claim) => self.reconcile_claim(&claim).await,
            None => {
                debug!("Claim {}/{} of worker pod no longer exists", namespace, claim_name);
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn launch(
        &self,
        claim: &PersistentVolumeClaim,
        claim_ref: &ClaimRef<'_>,
        outcome: ReconcileOutcome,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let Some(spec) = claim.spec.as_ref() else {
            return Ok(ReconcileOutcome::Ignored);
        };
        let Some(source) = spec.data_source_ref.as_ref() else {
            return Ok(ReconcileOutcome::Ignored);
        };
        let source_namespace = source.namespace.as_deref().unwrap_or(claim_ref.namespace);

        let Some(object) = self.cluster.get_populator(source_namespace, &source.name).await? else {
            warn!(
                "OvirtImageIOPopulator {}/{} referenced by claim {}/{} not found",
                source_namespace, source.name, claim_ref.namespace, claim_ref.name
            );
            return Ok(ReconcileOutcome::SourceMissing);
        };

        let raw_block = spec.volume_mode.as_deref() == Some("Block");

        let args = match self.args.populator_pod_args(raw_block, &object) {
            Ok(args) => args,
            Err(e) if e.is_decode() => {
                warn!(
                    "Skipping claim {}/{}: {}",
                    claim_ref.namespace, claim_ref.name, e
                );
                return Ok(ReconcileOutcome::InvalidSource);
            }
            Err(e) => return Err(e.into()),
        };

        let selected_node = claim.metadata.annotations.as_ref()
            .and_then(|annotations| annotations.get(SELECTED_NODE_ANNOTATION))
            .map(String::as_str);
        if selected_node.is_none() && self.waits_for_consumer(spec.storage_class_name.as_deref()).await? {
            debug!(
                "Claim {}/{} waits for a consumer before provisioning",
                claim_ref.namespace, claim_ref.name
            );
            return Ok(ReconcileOutcome::WaitingForConsumer);
        }

        let prime_name = prime_claim_name(claim_ref.uid);
        if self.cluster.get_claim(&self.namespace, &prime_name).await?.is_none() {
            let prime = build_prime_claim(claim, claim_ref, &self.namespace, selected_node);
            match self.cluster.create_claim(&self.namespace, &prime).await {
                Ok(()) => info!("Created prime claim {}/{}", self.namespace, prime_name),
                Err(ControllerError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let pod = build_worker_pod(claim_ref, &self.namespace, &self.image, args, raw_block, selected_node);
        match self.cluster.create_pod(&self.namespace, &pod).await {
            Ok(()) => {}
            Err(ControllerError::AlreadyExists(what)) => {
                debug!("{} still present, waiting for it to go away", what);
                return Ok(ReconcileOutcome::InProgress);
            }
            Err(e) => return Err(e),
        }
        info!(
            "Launched worker pod {}/{} for claim {}/{} (raw block: {})",
            self.namespace,
            worker_pod_name(claim_ref.uid),
            claim_ref.namespace,
            claim_ref.name,
            raw_block
        );

        Ok(outcome)
    }

    async fn waits_for_consumer(&self, storage_class: Option<&str>) -> Result<bool, ControllerError> {
        let Some(storage_class) = storage_class else {
            return Ok(false);
        };
        Ok(self.cluster.get_storage_class(storage_class).await?
            .and_then(|class| class.volume_binding_mode)
            .is_some_and(|mode| mode == WAIT_FOR_FIRST_CONSUMER))
    }

    /// Points the prime claim's volume at the claim; the binder does the rest.
    async fn rebind(
        &self,
        claim: &PersistentVolumeClaim,
        claim_ref: &ClaimRef<'_>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let prime_name = prime_claim_name(claim_ref.uid);
        let volume_name = self.cluster.get_claim(&self.namespace, &prime_name).await?
            .and_then(|prime| prime.spec)
            .and_then(|spec| spec.volume_name)
            .filter(|volume| !volume.is_empty());
        let Some(volume_name) = volume_name else {
            warn!("Prime claim {}/{} has no volume to hand over", self.namespace, prime_name);
            return Ok(ReconcileOutcome::InProgress);
        };

        let Some(volume) = self.cluster.get_volume(&volume_name).await? else {
            warn!("Volume {} of prime claim {}/{} not found", volume_name, self.namespace, prime_name);
            return Ok(ReconcileOutcome::InProgress);
        };

        let rebound = volume.spec.as_ref()
            .and_then(|spec| spec.claim_ref.as_ref())
            .and_then(|reference| reference.uid.as_deref())
            == Some(claim_ref.uid);
        if !rebound {
            let resource_version = claim.metadata.resource_version.as_deref().unwrap_or_default();
            self.cluster.bind_volume(&volume_name, claim_ref, resource_version).await?;
            info!(
                "Population of claim {}/{} completed, volume {} handed over",
                claim_ref.namespace, claim_ref.name, volume_name
            );
        }

        Ok(ReconcileOutcome::Completed)
    }

    async fn clean_up(&self, claim_ref: &ClaimRef<'_>) -> Result<(), ControllerError> {
        let pod_name = worker_pod_name(claim_ref.uid);
        let pod = self.cluster.get_pod(&self.namespace, &pod_name).await?;
        if pod.is_some_and(|pod| pod.metadata.deletion_timestamp.is_none()) {
            self.cluster.delete_pod(&self.namespace, &pod_name).await?;
        }

        let prime_name = prime_claim_name(claim_ref.uid);
        let prime = self.cluster.get_claim(&self.namespace, &prime_name).await?;
        if prime.is_some_and(|prime| prime.metadata.deletion_timestamp.is_none()) {
            self.cluster.delete_claim(&self.namespace, &prime_name).await?;
            debug!("Removed prime claim {}/{}", self.namespace, prime_name);
        }

        Ok(())
    }
}

fn pod_phase(pod: &Pod) -> &str {
    pod.status.as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or("Pending")
}
