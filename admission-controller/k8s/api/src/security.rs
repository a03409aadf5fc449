//! Types of the `security.gardener.cloud` API group.

use crate::garden::{BindingProvider, CredentialsReference, ObjectReference};
use kube::{core::ObjectMeta, CustomResource};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const GROUP: &str = "security.gardener.cloud";

/// Binds credentials (a Secret or a WorkloadIdentity), and optionally a set of Quotas,
/// to the Shoots of a namespace.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsBinding {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub credentials_ref: CredentialsReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotas: Option<Vec<ObjectReference>>,
    #[serde(default)]
    pub provider: BindingProvider,
}

/// A federated identity that workloads exchange for tokens of an external system.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "security.gardener.cloud",
    version = "v1alpha1",
    kind = "WorkloadIdentity",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadIdentitySpec {
    #[serde(default)]
    pub audiences: Vec<String>,
    #[serde(default)]
    pub target_system: TargetSystem,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TargetSystem {
    #[serde(default, rename = "type")]
    pub type_: String,
}

impl CredentialsBinding {
    pub fn quotas(&self) -> &[ObjectReference] {
        self.quotas.as_deref().unwrap_or_default()
    }
}

impl kube::Resource for CredentialsBinding {
    type DynamicType = ();
    type Scope = k8s_openapi::NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "CredentialsBinding".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        GROUP.into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v1alpha1".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "credentialsbindings".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
