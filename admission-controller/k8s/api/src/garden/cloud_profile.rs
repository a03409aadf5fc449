use super::CloudProfileReference;
use crate::Quantity;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Platform-managed catalog of versions, machine types and volume types for a provider.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "CloudProfile",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    #[serde(default)]
    pub kubernetes: KubernetesSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    #[serde(default)]
    pub machine_images: Vec<MachineImage>,
    #[serde(default)]
    pub machine_types: Vec<MachineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_types: Option<Vec<VolumeType>>,
}

/// A tenant-scoped override of a CloudProfile.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "NamespacedCloudProfile",
    namespaced,
    status = "NamespacedCloudProfileStatus",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfileSpec {
    #[serde(default)]
    pub parent: CloudProfileReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_images: Option<Vec<MachineImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_types: Option<Vec<MachineType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_types: Option<Vec<VolumeType>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfileStatus {
    /// The parent's spec merged with the namespaced overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile_spec: Option<CloudProfileSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KubernetesSettings {
    #[serde(default)]
    pub versions: Vec<ExpirableVersion>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirableVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes_total: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<String>,
    #[serde(default)]
    pub versions: Vec<MachineImageVersion>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageVersion {
    #[serde(flatten)]
    pub version: ExpirableVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architectures: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cri: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_version_constraint: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineType {
    pub name: String,
    #[serde(default)]
    pub cpu: Quantity,
    #[serde(default)]
    pub gpu: Quantity,
    #[serde(default)]
    pub memory: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<MachineTypeStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

/// Storage that is fixed to a machine type rather than attached as a volume.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTypeStorage {
    #[serde(default)]
    pub class: String,
    #[serde(default, rename = "size", skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<Quantity>,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Quantity>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeType {
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Quantity>,
}

// === impl CloudProfileSpec ===

impl CloudProfileSpec {
    pub fn machine_type(&self, name: &str) -> Option<&MachineType> {
        self.machine_types.iter().find(|m| m.name == name)
    }

    pub fn volume_type(&self, name: &str) -> Option<&VolumeType> {
        self.volume_types.iter().flatten().find(|v| v.name == name)
    }

    /// Applies a NamespacedCloudProfile's machine and volume types on top of this spec.
    /// Entries with the same name replace the parent's.
    pub fn merge_namespaced(&mut self, overrides: &NamespacedCloudProfileSpec) {
        for machine_type in overrides.machine_types.iter().flatten() {
            match self
                .machine_types
                .iter_mut()
                .find(|m| m.name == machine_type.name)
            {
                Some(existing) => *existing = machine_type.clone(),
                None => self.machine_types.push(machine_type.clone()),
            }
        }

        if let Some(volume_types) = overrides.volume_types.as_ref() {
            let existing = self.volume_types.get_or_insert_with(Vec::new);
            for volume_type in volume_types {
                match existing.iter_mut().find(|v| v.name == volume_type.name) {
                    Some(v) => *v = volume_type.clone(),
                    None => existing.push(volume_type.clone()),
                }
            }
        }

        if let Some(limits) = overrides.limits.as_ref() {
            self.limits = Some(limits.clone());
        }
    }
}

// === impl NamespacedCloudProfile ===

impl NamespacedCloudProfile {
    pub fn computed_spec(&self) -> Option<&CloudProfileSpec> {
        self.status.as_ref()?.cloud_profile_spec.as_ref()
    }
}
