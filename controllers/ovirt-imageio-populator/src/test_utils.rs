//! Test utilities for unit testing the reconciler
//!
//! This module provides an in-memory cluster and helpers for creating test
//! claims, populators, volumes and pods.

#[cfg(test)]
use crate::cluster::ClusterClient;
#[cfg(test)]
use crate::error::ControllerError;
#[cfg(test)]
use crate::pod::ClaimRef;
#[cfg(test)]
use crds::{GROUP, KIND, PLURAL, VERSION};
#[cfg(test)]
use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeSpec, Pod,
    PodStatus, TypedObjectReference,
};
#[cfg(test)]
use k8s_openapi::api::storage::v1::StorageClass;
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
#[cfg(test)]
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
#[cfg(test)]
use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::sync::Mutex;

/// Namespace the reconciler under test runs in
#[cfg(test)]
pub const CONTROLLER_NAMESPACE: &str = "ovirt-imageio-populator";

/// In-memory [`ClusterClient`]
///
/// With `graceful_delete` set, deleted pods stay visible with a
/// `deletionTimestamp` until [`FakeCluster::finish_deletion`] is called, the
/// way a pod bound to a node behaves.
#[cfg(test)]
#[derive(Default)]
pub struct FakeCluster {
    pub graceful_delete: bool,
    pub populators: Mutex<HashMap<(String, String), DynamicObject>>,
    pub claims: Mutex<HashMap<(String, String), PersistentVolumeClaim>>,
    pub pods: Mutex<HashMap<(String, String), Pod>>,
    pub storage_classes: Mutex<HashMap<String, StorageClass>>,
    pub volumes: Mutex<HashMap<String, PersistentVolume>>,
    pub created: Mutex<Vec<Pod>>,
    pub created_claims: Mutex<Vec<PersistentVolumeClaim>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub deleted_claims: Mutex<Vec<(String, String)>>,
    pub bound: Mutex<Vec<(String, String, String)>>,
}

#[cfg(test)]
fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

#[cfg(test)]
fn deletion_timestamp() -> Time {
    serde_json::from_value(serde_json::json!("2026-10-16T08:00:00Z")).unwrap()
}

#[cfg(test)]
impl FakeCluster {
    pub fn with_graceful_delete() -> Self {
        Self {
            graceful_delete: true,
            ..Default::default()
        }
    }

    pub fn add_populator(&self, namespace: &str, name: &str, spec: serde_json::Value) {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        let resource = ApiResource::from_gvk_with_plural(&gvk, PLURAL);
        let object = DynamicObject::new(name, &resource)
            .within(namespace)
            .data(serde_json::json!({ "spec": spec }));
        self.populators.lock().unwrap().insert(key(namespace, name), object);
    }

    pub fn add_claim(&self, claim: PersistentVolumeClaim) {
        let namespace = claim.metadata.namespace.clone().unwrap_or_default();
        let name = claim.metadata.name.clone().unwrap_or_default();
        self.claims.lock().unwrap().insert((namespace, name), claim);
    }

    pub fn add_pod(&self, pod: Pod) {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods.lock().unwrap().insert((namespace, name), pod);
    }

    pub fn add_storage_class(&self, name: &str, binding_mode: &str) {
        let class = StorageClass {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            provisioner: "csi.example.com".to_string(),
            volume_binding_mode: Some(binding_mode.to_string()),
            ..Default::default()
        };
        self.storage_classes.lock().unwrap().insert(name.to_string(), class);
    }

    /// Adds a volume bound to `claim_namespace/claim_name` with `claim_uid`
    pub fn add_volume(&self, name: &str, claim_namespace: &str, claim_name: &str, claim_uid: &str) {
        let volume = PersistentVolume {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                claim_ref: Some(ObjectReference {
                    namespace: Some(claim_namespace.to_string()),
                    name: Some(claim_name.to_string()),
                    uid: Some(claim_uid.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        };
        self.volumes.lock().unwrap().insert(name.to_string(), volume);
    }

    /// Removes a gracefully deleted pod for good
    pub fn finish_deletion(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods.lock().unwrap().remove(&key(namespace, name))
    }

    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn created(&self) -> Vec<Pod> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_claims(&self) -> Vec<PersistentVolumeClaim> {
        self.created_claims.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deleted_claims(&self) -> Vec<(String, String)> {
        self.deleted_claims.lock().unwrap().clone()
    }

    pub fn bound(&self) -> Vec<(String, String, String)> {
        self.bound.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl ClusterClient for FakeCluster {
    async fn get_populator(&self, namespace: &str, name: &str) -> Result<Option<DynamicObject>, ControllerError> {
        Ok(self.populators.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ControllerError> {
        Ok(self.claims.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn create_claim(&self, namespace: &str, claim: &PersistentVolumeClaim) -> Result<(), ControllerError> {
        let name = claim.metadata.name.clone().unwrap_or_default();
        let mut claims = self.claims.lock().unwrap();
        if claims.contains_key(&key(namespace, &name)) {
            return Err(ControllerError::AlreadyExists(format!("claim {namespace}/{name}")));
        }
        claims.insert(key(namespace, &name), claim.clone());
        self.created_claims.lock().unwrap().push(claim.clone());
        Ok(())
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        self.claims.lock().unwrap().remove(&key(namespace, name));
        self.deleted_claims.lock().unwrap().push(key(namespace, name));
        Ok(())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError> {
        Ok(self.pods.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<(), ControllerError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let mut pods = self.pods.lock().unwrap();
        if pods.contains_key(&key(namespace, &name)) {
            return Err(ControllerError::AlreadyExists(format!("pod {namespace}/{name}")));
        }
        pods.insert(key(namespace, &name), pod.clone());
        self.created.lock().unwrap().push(pod.clone());
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let mut pods = self.pods.lock().unwrap();
        if self.graceful_delete {
            if let Some(pod) = pods.get_mut(&key(namespace, name)) {
                pod.metadata.deletion_timestamp = Some(deletion_timestamp());
            }
        } else {
            pods.remove(&key(namespace, name));
        }
        self.deleted.lock().unwrap().push(key(namespace, name));
        Ok(())
    }

    async fn get_storage_class(&self, name: &str) -> Result<Option<StorageClass>, ControllerError> {
        Ok(self.storage_classes.lock().unwrap().get(name).cloned())
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>, ControllerError> {
        Ok(self.volumes.lock().unwrap().get(name).cloned())
    }

    async fn bind_volume(&self, volume: &str, claim: &ClaimRef<'_>, _resource_version: &str) -> Result<(), ControllerError> {
        if let Some(spec) = self.volumes.lock().unwrap().get_mut(volume).and_then(|pv| pv.spec.as_mut()) {
            spec.claim_ref = Some(ObjectReference {
                namespace: Some(claim.namespace.to_string()),
                name: Some(claim.name.to_string()),
                uid: Some(claim.uid.to_string()),
                ..Default::default()
            });
        }
        self.bound.lock().unwrap().push((
            volume.to_string(),
            claim.namespace.to_string(),
            claim.name.to_string(),
        ));
        Ok(())
    }
}

/// Helper to create a test claim referencing an OvirtImageIOPopulator
#[cfg(test)]
pub fn create_test_claim(name: &str, namespace: &str, source_name: &str, volume_mode: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            resource_version: Some("42".to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            volume_mode: volume_mode.map(str::to_string),
            data_source_ref: Some(TypedObjectReference {
                api_group: Some(GROUP.to_string()),
                kind: KIND.to_string(),
                name: source_name.to_string(),
                namespace: None,
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// Helper to set the claim's storage class
#[cfg(test)]
pub fn with_storage_class(mut claim: PersistentVolumeClaim, storage_class: &str) -> PersistentVolumeClaim {
    if let Some(spec) = claim.spec.as_mut() {
        spec.storage_class_name = Some(storage_class.to_string());
    }
    claim
}

/// Helper to bind a claim to a volume
#[cfg(test)]
pub fn with_volume(mut claim: PersistentVolumeClaim, volume: &str) -> PersistentVolumeClaim {
    if let Some(spec) = claim.spec.as_mut() {
        spec.volume_name = Some(volume.to_string());
    }
    claim
}

/// Helper to add an annotation
#[cfg(test)]
pub fn with_annotation(mut claim: PersistentVolumeClaim, name: &str, value: &str) -> PersistentVolumeClaim {
    claim.metadata.annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(name.to_string(), value.to_string());
    claim
}

/// Helper to set a pod's phase
#[cfg(test)]
pub fn with_phase(mut pod: Pod, phase: &str) -> Pod {
    pod.status = Some(PodStatus {
        phase: Some(phase.to_string()),
        ..Default::default()
    });
    pod
}

/// Spec of a secret-mode OvirtImageIOPopulator
#[cfg(test)]
pub fn secret_populator_spec() -> serde_json::Value {
    serde_json::json!({
        "engineUrl": "https://engine.example/ovirt-engine/api",
        "diskId": "abc-123",
        "engineSecretName": "ovirt-creds",
    })
}
