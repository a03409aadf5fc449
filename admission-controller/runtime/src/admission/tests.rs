use super::*;
use crate::{
    core::{ReadyGate, Typed},
    index::{Cache, Caches},
    k8s::{Seed, Shoot},
    plugins::{seed::SeedValidator, vpa::VpaEnabledByDefault},
};
use serde_json::{json, Value};
use std::time::Duration;

fn request(operation: &str, kind: &str, object: Value, old_object: Value) -> AdmissionRequest {
    let (group, version, resource) = match kind {
        "Shoot" => ("core.gardener.cloud", "v1beta1", "shoots"),
        "Seed" => ("core.gardener.cloud", "v1beta1", "seeds"),
        _ => ("", "v1", "pods"),
    };
    let name = object
        .get("metadata")
        .or_else(|| old_object.get("metadata"))
        .and_then(|meta| meta.get("name"))
        .cloned()
        .unwrap_or_else(|| json!("a"));
    let review: AdmissionReview = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "4d5ae2a3-7b6e-4c33-9a7e-5c1f2a0b9e10",
            "kind": {"group": group, "version": version, "kind": kind},
            "resource": {"group": group, "version": version, "resource": resource},
            "name": name,
            "namespace": "garden-dev",
            "operation": operation,
            "userInfo": {"username": "alice", "uid": "1", "groups": ["devs"]},
            "object": object,
            "oldObject": old_object,
            "dryRun": false,
        }
    }))
    .expect("review must decode");
    review.try_into().expect("review must carry a request")
}

fn shoot() -> Value {
    json!({
        "apiVersion": "core.gardener.cloud/v1beta1",
        "kind": "Shoot",
        "metadata": {"name": "a", "namespace": "garden-dev"},
        "spec": {
            "cloudProfile": {"kind": "CloudProfile", "name": "aws"},
            "kubernetes": {"version": "1.33.0"},
            "provider": {
                "type": "aws",
                "workers": [{
                    "name": "worker",
                    "machine": {"type": "m5.large"},
                    "minimum": 1,
                    "maximum": 2,
                }],
            },
            "region": "eu-west-1",
            "unknownField": {"kept": true},
        },
    })
}

fn seed() -> Value {
    json!({
        "apiVersion": "core.gardener.cloud/v1beta1",
        "kind": "Seed",
        "metadata": {"name": "aws"},
        "spec": {"provider": {"type": "aws", "region": "eu-west-1"}},
    })
}

fn vpa_admission() -> Admission {
    Admission::new(
        Pipeline::builder()
            .mutate(VpaEnabledByDefault::new(ReadyGate::default()))
            .build(),
    )
}

fn seed_admission(caches: &Caches, timeout: Duration) -> Admission {
    Admission::new(
        Pipeline::builder()
            .validate(SeedValidator::new(ReadyGate::new(timeout), caches))
            .build(),
    )
}

#[tokio::test]
async fn unsupported_kinds_are_allowed() {
    let pod = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "a"}});
    let req = request("CREATE", "Pod", pod, Value::Null);
    let rsp = vpa_admission().admit(req).await;
    assert!(rsp.allowed);
    let rsp = serde_json::to_value(&rsp).unwrap();
    assert!(rsp.get("patch").is_none(), "{rsp}");
}

#[tokio::test]
async fn mutations_are_returned_as_patches() {
    let req = request("CREATE", "Shoot", shoot(), Value::Null);
    let rsp = vpa_admission().admit(req).await;
    assert!(rsp.allowed);
    let rsp = serde_json::to_value(&rsp).unwrap();
    assert!(rsp.get("patch").is_some(), "{rsp}");
    assert_eq!(rsp["patchType"], "JSONPatch");
}

#[tokio::test]
async fn unchanged_objects_are_admitted_without_patch() {
    let mut object = shoot();
    object["spec"]["kubernetes"]["verticalPodAutoscaler"] = json!({"enabled": false});
    let req = request("CREATE", "Shoot", object, Value::Null);
    let rsp = vpa_admission().admit(req).await;
    assert!(rsp.allowed);
    let rsp = serde_json::to_value(&rsp).unwrap();
    assert!(rsp.get("patch").is_none(), "{rsp}");
}

#[tokio::test]
async fn rejections_carry_code_and_reason() {
    let mut hosted = serde_json::from_value::<Shoot>(shoot()).unwrap();
    hosted.spec.seed_name = Some("aws".into());
    let caches = Caches {
        shoots: Cache::synced_with([hosted]),
        ..Default::default()
    };
    let req = request("DELETE", "Seed", Value::Null, seed());
    let rsp = seed_admission(&caches, Duration::from_secs(1))
        .admit(req)
        .await;
    assert!(!rsp.allowed);
    assert_eq!(rsp.result.code, 403);
    assert_eq!(rsp.result.reason, "Forbidden");
    assert!(rsp.result.message.contains("garden-dev/a"), "{}", rsp.result.message);
}

#[tokio::test]
async fn unsynced_caches_are_retryable() {
    let caches = Caches::default();
    let req = request("DELETE", "Seed", Value::Null, seed());
    let rsp = seed_admission(&caches, Duration::from_millis(10))
        .admit(req)
        .await;
    assert!(!rsp.allowed);
    assert_eq!(rsp.result.code, 429);
    assert_eq!(rsp.result.reason, "NotReady");
}

#[tokio::test]
async fn undecodable_objects_are_bad_requests() {
    let mut object = shoot();
    object["spec"]["provider"]["workers"] = json!("not a list");
    let req = request("CREATE", "Shoot", object, Value::Null);
    let rsp = vpa_admission().admit(req).await;
    assert!(!rsp.allowed);
    assert_eq!(rsp.result.code, 400);
}

#[test]
fn patches_only_touch_modelled_fields() {
    let decoder = Decoder::new();
    let before = decoder.decode(Kind::Shoot, shoot()).unwrap();
    let mut after = before.clone();
    Shoot::from_object_mut(&mut after)
        .unwrap()
        .spec
        .kubernetes
        .vertical_pod_autoscaler = Some(Default::default());

    let patch = serde_json::to_value(patch(Some(&before), Some(&after)).unwrap()).unwrap();
    assert_eq!(
        patch,
        json!([{
            "op": "add",
            "path": "/spec/kubernetes/verticalPodAutoscaler",
            "value": {"enabled": false},
        }])
    );
}

#[test]
fn maps_user_info() {
    let req = request("UPDATE", "Seed", seed(), seed());
    let attrs = vpa_admission().attributes(Kind::Seed, req).unwrap();
    assert_eq!(attrs.operation, Operation::Update);
    assert_eq!(attrs.user.name, "alice");
    assert_eq!(attrs.user.groups, vec!["devs"]);
    assert!(attrs.object::<Seed>().is_ok());
    assert!(attrs.old_object::<Seed>().unwrap().is_some());
}
