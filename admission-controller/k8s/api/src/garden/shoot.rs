use super::{BindingRef, CloudProfileReference};
use crate::constants;
use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of a tenant-managed cluster.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Shoot",
    namespaced,
    status = "ShootStatus",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addons: Option<Addons>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile: Option<CloudProfileReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_binding_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
    #[serde(default)]
    pub kubernetes: Kubernetes,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_binding_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Addons {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_ingress: Option<NginxIngress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NginxIngress {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<DnsProvider>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kubernetes {
    #[serde(default)]
    pub version: String,
    #[serde(
        default,
        rename = "kubeAPIServer",
        skip_serializing_if = "Option::is_none"
    )]
    pub kube_api_server: Option<KubeApiServerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_pod_autoscaler: Option<VerticalPodAutoscaler>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KubeApiServerConfig {
    #[serde(
        default,
        rename = "oidcConfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub oidc_config: Option<OidcConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_authentication: Option<OidcClientAuthentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,
    #[serde(default, rename = "issuerURL", skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_claims: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_algs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcClientAuthentication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_config: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerticalPodAutoscaler {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Provider {
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<Worker>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Worker {
    pub name: String,
    #[serde(default)]
    pub machine: Machine,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default)]
    pub maximum: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Machine {
    #[serde(default, rename = "type")]
    pub type_: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, rename = "size")]
    pub volume_size: crate::Quantity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(default, rename = "technicalID", skip_serializing_if = "String::is_empty")]
    pub technical_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub state: LastOperationState,
    #[serde(rename = "type", default)]
    pub type_: LastOperationType,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum LastOperationType {
    Create,
    Reconcile,
    Delete,
    Migrate,
    Restore,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum LastOperationState {
    Processing,
    Succeeded,
    Error,
    Failed,
    Pending,
    Aborted,
    #[default]
    #[serde(other)]
    Unknown,
}

// === impl Shoot ===

impl Shoot {
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// The binding that links this Shoot to its credentials and quotas, if any.
    pub fn binding(&self) -> Option<BindingRef> {
        if let Some(name) = self.spec.secret_binding_name.as_deref() {
            return Some(BindingRef::Secret(name.to_string()));
        }
        self.spec
            .credentials_binding_name
            .as_deref()
            .map(|name| BindingRef::Credentials(name.to_string()))
    }

    /// The referenced cloud profile. The legacy `cloudProfileName` field refers to a
    /// cluster-scoped CloudProfile.
    pub fn cloud_profile_ref(&self) -> Option<CloudProfileReference> {
        if let Some(reference) = self.spec.cloud_profile.clone() {
            return Some(reference);
        }
        self.spec
            .cloud_profile_name
            .as_ref()
            .map(|name| CloudProfileReference {
                kind: constants::KIND_CLOUD_PROFILE.to_string(),
                name: name.clone(),
            })
    }

    pub fn seed_name(&self) -> Option<&str> {
        self.spec.seed_name.as_deref()
    }

    pub fn status_seed_name(&self) -> Option<&str> {
        self.status.as_ref()?.seed_name.as_deref()
    }

    /// Returns true if the Shoot is, or was before a migration, assigned to the named Seed.
    pub fn is_assigned_to(&self, seed: &str) -> bool {
        self.seed_name() == Some(seed) || self.status_seed_name() == Some(seed)
    }

    pub fn dns_domain(&self) -> Option<&str> {
        self.spec.dns.as_ref()?.domain.as_deref()
    }

    pub fn is_workerless(&self) -> bool {
        self.spec.provider.workers.is_empty()
    }

    pub fn nginx_ingress_enabled(&self) -> bool {
        self.spec
            .addons
            .as_ref()
            .and_then(|a| a.nginx_ingress.as_ref())
            .map(|n| n.enabled)
            .unwrap_or(false)
    }

    pub fn oidc_config(&self) -> Option<&OidcConfig> {
        self.spec
            .kubernetes
            .kube_api_server
            .as_ref()?
            .oidc_config
            .as_ref()
    }

    pub fn technical_id(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.technical_id.as_str())
            .unwrap_or_default()
    }

    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref()?.last_operation.as_ref()
    }

    /// The explicit expiration time, if the annotation is set and well formed.
    pub fn expiration_timestamp(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.annotations()
            .get(constants::ANNOTATION_SHOOT_EXPIRATION_TIMESTAMP)
            .map(|ts| DateTime::parse_from_rfc3339(ts).map(|t| t.with_timezone(&Utc)))
    }
}

// === impl LastOperation ===

impl LastOperation {
    /// Returns true if the Shoot's deletion flow ran to completion.
    pub fn is_completed_deletion(&self) -> bool {
        self.type_ == LastOperationType::Delete
            && self.state == LastOperationState::Succeeded
            && self.progress == 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_shoot() {
        let shoot: Shoot = serde_json::from_value(serde_json::json!({
            "apiVersion": "core.gardener.cloud/v1beta1",
            "kind": "Shoot",
            "metadata": {"name": "my-shoot", "namespace": "garden-dev"},
            "spec": {
                "cloudProfileName": "aws",
                "secretBindingName": "my-secret",
                "provider": {
                    "type": "aws",
                    "workers": [{
                        "name": "pool",
                        "machine": {"type": "m5.large", "image": {"name": "gardenlinux"}},
                        "minimum": 1,
                        "maximum": 3,
                        "volume": {"type": "gp3", "size": "50Gi"},
                    }],
                },
                "kubernetes": {
                    "version": "1.31.1",
                    "kubeAPIServer": {"oidcConfig": {"issuerURL": "https://issuer"}},
                },
            },
            "status": {
                "technicalID": "shoot--dev--my-shoot",
                "lastOperation": {"type": "Delete", "state": "Succeeded", "progress": 100},
            },
        }))
        .unwrap();

        assert_eq!(shoot.binding(), Some(BindingRef::Secret("my-secret".into())));
        assert_eq!(
            shoot.cloud_profile_ref(),
            Some(CloudProfileReference {
                kind: "CloudProfile".into(),
                name: "aws".into(),
            })
        );
        assert_eq!(shoot.spec.provider.workers[0].maximum, 3);
        assert_eq!(
            shoot.oidc_config().and_then(|c| c.issuer_url.as_deref()),
            Some("https://issuer")
        );
        assert_eq!(shoot.technical_id(), "shoot--dev--my-shoot");
        assert!(shoot.last_operation().unwrap().is_completed_deletion());
    }

    #[test]
    fn unknown_operation_values_decode() {
        let op: LastOperation = serde_json::from_value(serde_json::json!({
            "type": "Hibernate",
            "state": "Sleeping",
            "progress": 100,
        }))
        .unwrap();
        assert_eq!(op.type_, LastOperationType::Unknown);
        assert_eq!(op.state, LastOperationState::Unknown);
        assert!(!op.is_completed_deletion());
    }
}
