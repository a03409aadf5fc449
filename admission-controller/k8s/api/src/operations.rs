//! Types of the `operations.gardener.cloud` API group.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A short-lived SSH jump host into a Shoot's worker network.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "operations.gardener.cloud",
    version = "v1beta1",
    kind = "Bastion",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    #[serde(default)]
    pub shoot_ref: LocalObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    #[serde(default, rename = "sshPublicKey", skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<BastionIngressPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BastionIngressPolicy {
    pub ip_block: IpBlock,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IpBlock {
    pub cidr: String,
}
