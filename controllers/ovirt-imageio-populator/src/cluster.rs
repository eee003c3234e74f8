//! Cluster access used by the reconciler.
//!
//! The reconciler only talks to the cluster through [`ClusterClient`], so tests
//! can swap in an in-memory fake.

use crate::error::ControllerError;
use crate::pod::ClaimRef;
use crds::{GROUP, KIND, PLURAL, VERSION};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Cluster operations needed to launch and track worker pods
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get an OvirtImageIOPopulator as an untyped object
    async fn get_populator(&self, namespace: &str, name: &str) -> Result<Option<DynamicObject>, ControllerError>;

    /// Get a claim
    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ControllerError>;

    /// Create a claim; [`ControllerError::AlreadyExists`] if the name is taken
    async fn create_claim(&self, namespace: &str, claim: &PersistentVolumeClaim) -> Result<(), ControllerError>;

    /// Delete a claim; a missing claim is not an error
    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;

    /// Get a pod
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError>;

    /// Create a pod; [`ControllerError::AlreadyExists`] if the name is taken
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<(), ControllerError>;

    /// Delete a pod; a missing pod is not an error
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;

    /// Get a StorageClass
    async fn get_storage_class(&self, name: &str) -> Result<Option<StorageClass>, ControllerError>;

    /// Get a PersistentVolume
    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>, ControllerError>;

    /// Point a PersistentVolume's `claimRef` at `claim`
    async fn bind_volume(&self, volume: &str, claim: &ClaimRef<'_>, resource_version: &str) -> Result<(), ControllerError>;
}

/// [`ClusterClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    populator_resource: ApiResource,
}

impl KubeClusterClient {
    /// Creates a new cluster client.
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        Self {
            client,
            populator_resource: ApiResource::from_gvk_with_plural(&gvk, PLURAL),
        }
    }
}

fn created<T>(result: Result<T, kube::Error>, what: String) -> Result<(), ControllerError> {
    match result {
        Ok(_) => {
            debug!("Created {}", what);
            Ok(())
        }
        Err(kube::Error::Api(response)) if response.code == 409 => Err(ControllerError::AlreadyExists(what)),
        Err(e) => Err(e.into()),
    }
}

fn deleted<T>(result: Result<T, kube::Error>, what: String) -> Result<(), ControllerError> {
    match result {
        Ok(_) => {
            debug!("Deleted {}", what);
            Ok(())
        }
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_populator(&self, namespace: &str, name: &str) -> Result<Option<DynamicObject>, ControllerError> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &self.populator_resource);
        Ok(api.get_opt(name).await?)
    }

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, ControllerError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_claim(&self, namespace: &str, claim: &PersistentVolumeClaim) -> Result<(), ControllerError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let name = claim.metadata.name.as_deref().unwrap_or("<unknown>");
        created(api.create(&PostParams::default(), claim).await, format!("claim {namespace}/{name}"))
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        deleted(api.delete(name, &DeleteParams::background()).await, format!("claim {namespace}/{name}"))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<(), ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let name = pod.metadata.name.as_deref().unwrap_or("<unknown>");
        created(api.create(&PostParams::default(), pod).await, format!("pod {namespace}/{name}"))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        deleted(api.delete(name, &DeleteParams::background()).await, format!("pod {namespace}/{name}"))
    }

    async fn get_storage_class(&self, name: &str) -> Result<Option<StorageClass>, ControllerError> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>, ControllerError> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn bind_volume(&self, volume: &str, claim: &ClaimRef<'_>, resource_version: &str) -> Result<(), ControllerError> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        let patch = json!({
            "spec": {
                "claimRef": {
                    "apiVersion": "v1",
                    "kind": "PersistentVolumeClaim",
                    "namespace": claim.namespace,
                    "name": claim.name,
                    "uid": claim.uid,
                    "resourceVersion": resource_version,
                }
            }
        });
        api.patch(volume, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        debug!("Bound volume {} to claim {}/{}", volume, claim.namespace, claim.name);
        Ok(())
    }
}
