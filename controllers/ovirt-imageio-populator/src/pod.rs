//! Worker pod and prime claim construction.
//!
//! A claim whose `dataSourceRef` names an OvirtImageIOPopulator is left
//! unbound by the storage provisioner. The controller provisions storage
//! through a "prime" copy of the claim in its own namespace, fills it from a
//! worker pod, then hands the resulting volume over to the original claim.

use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    Volume, VolumeDevice, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use populator::target::mount_dir;
use populator::DEVICE_PATH;
use std::collections::BTreeMap;

/// Label selecting worker pods and prime claims of this populator
pub const POPULATOR_LABEL: &str = "forklift.konveyor.io/populator";

/// Value of [`POPULATOR_LABEL`]
pub const POPULATOR_LABEL_VALUE: &str = "ovirt-imageio";

/// Annotation on a worker pod naming the claim it populates
pub const CLAIM_ANNOTATION: &str = "forklift.konveyor.io/claim";

/// Annotation on a worker pod naming the namespace of that claim
pub const CLAIM_NAMESPACE_ANNOTATION: &str = "forklift.konveyor.io/claim-namespace";

/// Node chosen by the scheduler for a `WaitForFirstConsumer` claim
pub const SELECTED_NODE_ANNOTATION: &str = "volume.kubernetes.io/selected-node";

const CONTAINER_NAME: &str = "populate";
const VOLUME_NAME: &str = "target";

/// Worker pod name for a claim UID
pub fn worker_pod_name(claim_uid: &str) -> String {
    format!("populate-{claim_uid}")
}

/// Prime claim name for a claim UID
pub fn prime_claim_name(claim_uid: &str) -> String {
    format!("prime-{claim_uid}")
}

/// Label selector matching every worker pod
pub fn worker_selector() -> String {
    format!("{POPULATOR_LABEL}={POPULATOR_LABEL_VALUE}")
}

fn populator_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(POPULATOR_LABEL.to_string(), POPULATOR_LABEL_VALUE.to_string())])
}

/// Identity of the claim being populated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRef<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub uid: &'a str,
}

/// Builds the prime claim for `claim` in `namespace`.
///
/// Same storage request as the original, without `dataSourceRef`, so the
/// provisioner handles it like any other claim.
pub fn build_prime_claim(
    claim: &PersistentVolumeClaim,
    claim_ref: &ClaimRef<'_>,
    namespace: &str,
    selected_node: Option<&str>,
) -> PersistentVolumeClaim {
    let spec = claim.spec.clone().unwrap_or_default();

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(prime_claim_name(claim_ref.uid)),
            namespace: Some(namespace.to_string()),
            labels: Some(populator_labels()),
            annotations: selected_node
                .map(|node| BTreeMap::from([(SELECTED_NODE_ANNOTATION.to_string(), node.to_string())])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: spec.access_modes,
            resources: spec.resources,
            storage_class_name: spec.storage_class_name,
            volume_mode: spec.volume_mode,
            ..Default::default()
        }),
        status: None,
    }
}

/// Builds the worker pod for `claim_ref` in `namespace`.
///
/// The prime claim is attached as a raw device at `/dev/block` or mounted at
/// `/mnt`, matching the `--file-name` the arguments were built with.
pub fn build_worker_pod(
    claim_ref: &ClaimRef<'_>,
    namespace: &str,
    image: &str,
    args: Vec<String>,
    raw_block: bool,
    node_name: Option<&str>,
) -> Pod {
    let mut container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        args: Some(args),
        ..Default::default()
    };

    if raw_block {
        container.volume_devices = Some(vec![VolumeDevice {
            name: VOLUME_NAME.to_string(),
            device_path: DEVICE_PATH.to_string(),
        }]);
    } else {
        container.volume_mounts = Some(vec![VolumeMount {
            name: VOLUME_NAME.to_string(),
            mount_path: mount_dir().to_string(),
            ..Default::default()
        }]);
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(worker_pod_name(claim_ref.uid)),
            namespace: Some(namespace.to_string()),
            labels: Some(populator_labels()),
            annotations: Some(BTreeMap::from([
                (CLAIM_ANNOTATION.to_string(), claim_ref.name.to_string()),
                (CLAIM_NAMESPACE_ANNOTATION.to_string(), claim_ref.namespace.to_string()),
            ])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            node_name: node_name.map(str::to_string),
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: VOLUME_NAME.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: prime_claim_name(claim_ref.uid),
                    read_only: None,
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
