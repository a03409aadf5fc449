use crate::{constants, Quantity};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource ceiling shared by all Shoots in its scope.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Quota",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_lifetime_days: Option<i32>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Quantity>,
    #[serde(default)]
    pub scope: QuotaScope,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaScope {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl Quota {
    pub fn is_project_scoped(&self) -> bool {
        self.spec.scope.kind == constants::QUOTA_SCOPE_PROJECT
    }
}
