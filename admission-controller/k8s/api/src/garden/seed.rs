use super::{CredentialsReference, SecretReference};
use crate::constants;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A hosting cluster that runs the control planes of Shoots.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Seed",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SeedSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<SeedBackup>,
    #[serde(default)]
    pub provider: SeedProvider,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedBackup {
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_ref: Option<CredentialsReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SeedProvider {
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
}

// === impl Seed ===

impl Seed {
    pub fn zones(&self) -> BTreeSet<&str> {
        self.spec
            .provider
            .zones
            .iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn backup_credentials(&self) -> Option<CredentialsReference> {
        self.spec.backup.as_ref()?.credentials()
    }
}

// === impl SeedBackup ===

impl SeedBackup {
    /// The backup credentials. The legacy `secretRef` field is equivalent to a `Secret`
    /// credentials reference.
    pub fn credentials(&self) -> Option<CredentialsReference> {
        if let Some(reference) = self.credentials_ref.clone() {
            return Some(reference);
        }
        self.secret_ref
            .as_ref()
            .map(|s| CredentialsReference::secret(&s.name, &s.namespace))
    }

    pub fn is_secret(reference: &CredentialsReference) -> bool {
        reference.kind == constants::KIND_SECRET
    }
}
