//! Unit tests for the worker argument builder

#[cfg(test)]
mod tests {
    use crate::args::{decode_populator, PodArgsBuilder};
    use crate::error::PopulatorError;
    use crds::{CredentialMode, GROUP, KIND, PLURAL, VERSION};
    use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
    use serde_json::json;

    const ENGINE_URL: &str = "https://engine.example/ovirt-engine/api";

    fn populator_object(spec: serde_json::Value) -> DynamicObject {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        let resource = ApiResource::from_gvk_with_plural(&gvk, PLURAL);
        DynamicObject::new("rhel9-disk", &resource)
            .within("vm-imports")
            .data(json!({ "spec": spec }))
    }

    fn secret_object() -> DynamicObject {
        populator_object(json!({
            "engineUrl": ENGINE_URL,
            "diskId": "abc-123",
            "engineSecretName": "ovirt-creds",
        }))
    }

    fn secret_builder() -> PodArgsBuilder {
        PodArgsBuilder::new(CredentialMode::Secret, "ovirt-imageio-populator")
    }

    #[test]
    fn test_secret_resource_filesystem_volume() {
        let args = secret_builder().populator_pod_args(false, &secret_object()).unwrap();

        assert_eq!(
            args,
            vec![
                "--mode=populate",
                "--file-name=/mnt/disk.img",
                "--secret-name=ovirt-creds",
                "--disk-id=abc-123",
                "--engine-url=https://engine.example/ovirt-engine/api",
                "--namespace=ovirt-imageio-populator",
            ]
        );
    }

    #[test]
    fn test_secret_resource_block_volume() {
        let args = secret_builder().populator_pod_args(true, &secret_object()).unwrap();

        assert!(args.contains(&"--file-name=/dev/block".to_string()));
        assert!(!args.iter().any(|arg| arg.contains("/mnt/")));
        assert!(args.contains(&"--mode=populate".to_string()));
        assert!(args.contains(&"--secret-name=ovirt-creds".to_string()));
    }

    #[test]
    fn test_exactly_one_destination() {
        for raw_block in [true, false] {
            let args = secret_builder().populator_pod_args(raw_block, &secret_object()).unwrap();
            let destinations = args.iter().filter(|arg| arg.starts_with("--file-name=")).count();
            assert_eq!(destinations, 1, "raw_block={raw_block}");
        }
    }

    #[test]
    fn test_namespace_follows_builder() {
        let builder = PodArgsBuilder::new(CredentialMode::Secret, "custom-ns");
        let args = builder.populator_pod_args(false, &secret_object()).unwrap();
        assert_eq!(args.last().map(String::as_str), Some("--namespace=custom-ns"));
    }

    #[test]
    fn test_inline_resource() {
        let object = populator_object(json!({
            "engineUrl": ENGINE_URL,
            "diskId": "abc-123",
            "engineUser": "admin@internal",
            "enginePassword": "hunter2",
            "engineCA": "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----",
        }));
        let builder = PodArgsBuilder::new(CredentialMode::Inline, "konveyor-forklift");

        let args = builder.populator_pod_args(false, &object).unwrap();

        assert_eq!(
            args,
            vec![
                "--mode=populate",
                "--file-name=/mnt/disk.img",
                "--engine-user=admin@internal",
                "--engine-password=hunter2",
                "--ca=-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----",
                "--disk-id=abc-123",
                "--engine-url=https://engine.example/ovirt-engine/api",
            ]
        );
    }

    #[test]
    fn test_mode_mismatch_is_a_decode_error() {
        let builder = PodArgsBuilder::new(CredentialMode::Inline, "konveyor-forklift");
        let err = builder.populator_pod_args(false, &secret_object()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_malformed_objects_are_decode_errors() {
        let malformed = [
            populator_object(json!({ "diskId": "abc-123", "engineSecretName": "ovirt-creds" })),
            populator_object(json!({ "engineUrl": ENGINE_URL, "engineSecretName": "ovirt-creds" })),
            populator_object(json!({ "engineUrl": ENGINE_URL, "diskId": 42, "engineSecretName": "ovirt-creds" })),
            populator_object(json!({ "engineUrl": ENGINE_URL, "diskId": "abc-123", "engineSecretName": ["a"] })),
            populator_object(json!({ "engineUrl": ENGINE_URL, "diskId": "abc-123" })),
            populator_object(json!("not-an-object")),
        ];

        for object in &malformed {
            match secret_builder().populator_pod_args(false, object) {
                Err(PopulatorError::Decode(_)) => {}
                other => panic!("expected decode error for {:?}, got {:?}", object.data, other),
            }
        }
    }

    #[test]
    fn test_object_without_spec_is_a_decode_error() {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        let resource = ApiResource::from_gvk_with_plural(&gvk, PLURAL);
        let object = DynamicObject::new("empty", &resource);

        assert!(secret_builder().populator_pod_args(false, &object).unwrap_err().is_decode());
    }

    #[test]
    fn test_wrong_kind_is_a_decode_error() {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, "OpenstackVolumePopulator");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "openstackvolumepopulators");
        let object = DynamicObject::new("other", &resource).data(json!({
            "spec": { "engineUrl": ENGINE_URL, "diskId": "abc-123", "engineSecretName": "ovirt-creds" }
        }));

        assert!(decode_populator(&object).unwrap_err().is_decode());
    }

    #[test]
    fn test_decode_keeps_metadata() {
        let populator = decode_populator(&secret_object()).unwrap();
        assert_eq!(populator.metadata.name.as_deref(), Some("rhel9-disk"));
        assert_eq!(populator.metadata.namespace.as_deref(), Some("vm-imports"));
        assert_eq!(populator.spec.disk_id, "abc-123");
    }
}
