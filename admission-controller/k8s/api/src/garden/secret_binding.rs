use super::{ObjectReference, SecretReference};
use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Binds a Secret, and optionally a set of Quotas, to the Shoots of a namespace.
///
/// Unlike most garden resources a SecretBinding has no `spec`, so the resource is
/// implemented by hand rather than derived.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBinding {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub secret_ref: SecretReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotas: Option<Vec<ObjectReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<BindingProvider>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BindingProvider {
    #[serde(default, rename = "type")]
    pub type_: String,
}

impl SecretBinding {
    pub fn quotas(&self) -> &[ObjectReference] {
        self.quotas.as_deref().unwrap_or_default()
    }
}

impl kube::Resource for SecretBinding {
    type DynamicType = ();
    type Scope = k8s_openapi::NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "SecretBinding".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        super::GROUP.into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v1beta1".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "secretbindings".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
