//! Types of the `core.gardener.cloud` API group.

pub mod cloud_profile;
pub mod project;
pub mod quota;
pub mod secret_binding;
pub mod seed;
pub mod shoot;

pub use self::{
    cloud_profile::{
        CloudProfile, CloudProfileSpec, NamespacedCloudProfile, NamespacedCloudProfileSpec,
        NamespacedCloudProfileStatus,
    },
    project::{Project, ProjectMember, ProjectSpec, Subject},
    quota::{Quota, QuotaSpec},
    secret_binding::{BindingProvider, SecretBinding},
    seed::{Seed, SeedSpec},
    shoot::{Shoot, ShootSpec, ShootStatus},
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const GROUP: &str = "core.gardener.cloud";

/// References a CloudProfile or a NamespacedCloudProfile in the Shoot's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CloudProfileReference {
    #[serde(default)]
    pub kind: String,
    pub name: String,
}

/// A typed reference to another object, as used for credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// References a Secret by name and namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SecretReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// References an object, e.g. a Quota, by name and optional namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ObjectReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Names the binding through which a Shoot gets its credentials and quotas.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindingRef {
    Secret(String),
    Credentials(String),
}

// === impl BindingRef ===

impl BindingRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Secret(name) | Self::Credentials(name) => name,
        }
    }
}

impl fmt::Display for BindingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(name) => write!(f, "SecretBinding {name}"),
            Self::Credentials(name) => write!(f, "CredentialsBinding {name}"),
        }
    }
}

// === impl CredentialsReference ===

impl CredentialsReference {
    pub fn secret(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: crate::constants::KIND_SECRET.to_string(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn workload_identity(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: format!("{}/v1alpha1", crate::security::GROUP),
            kind: crate::constants::KIND_WORKLOAD_IDENTITY.to_string(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for CredentialsReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// === impl ObjectReference ===

impl ObjectReference {
    /// Returns true if the reference names `name` in `ns`, where a reference without a
    /// namespace is relative to `default_ns`.
    pub fn refers_to(&self, ns: &str, name: &str, default_ns: &str) -> bool {
        self.name == name && self.namespace.as_deref().unwrap_or(default_ns) == ns
    }
}
