use garden_admission_controller_core::Error;
use garden_admission_controller_k8s_api::{
    constants, garden::CloudProfileSpec, CloudProfile, CloudProfileReference,
    NamespacedCloudProfile, Shoot,
};
use garden_admission_controller_k8s_index::Cache;
use std::sync::Arc;

/// Resolves the effective cloud profile specs of Shoots.
#[derive(Clone, Debug)]
pub(crate) struct Profiles {
    cloud_profiles: Cache<CloudProfile>,
    namespaced: Cache<NamespacedCloudProfile>,
}

impl Profiles {
    pub(crate) fn new(
        cloud_profiles: Cache<CloudProfile>,
        namespaced: Cache<NamespacedCloudProfile>,
    ) -> Self {
        Self {
            cloud_profiles,
            namespaced,
        }
    }

    /// The spec the Shoot's machine and volume types are looked up in.
    ///
    /// A NamespacedCloudProfile contributes its computed spec when its controller has published
    /// one, and is otherwise merged onto its parent.
    pub(crate) fn spec_for(&self, shoot: &Shoot) -> Result<CloudProfileSpec, Error> {
        let reference = shoot.cloud_profile_ref().ok_or_else(|| {
            Error::invalid_field("spec.cloudProfile", "a cloud profile must be referenced")
        })?;
        let namespace = shoot.metadata.namespace.as_deref().unwrap_or_default();
        self.resolve(namespace, &reference)
    }

    fn resolve(
        &self,
        namespace: &str,
        reference: &CloudProfileReference,
    ) -> Result<CloudProfileSpec, Error> {
        match reference.kind.as_str() {
            "" | constants::KIND_CLOUD_PROFILE => Ok(self.parent(&reference.name)?.spec.clone()),
            constants::KIND_NAMESPACED_CLOUD_PROFILE => {
                let profile = self.namespaced.get(namespace, &reference.name).ok_or_else(|| {
                    Error::invalid_field(
                        "spec.cloudProfile.name",
                        format_args!(
                            "NamespacedCloudProfile {namespace}/{} not found",
                            reference.name
                        ),
                    )
                })?;
                if let Some(spec) = profile.computed_spec() {
                    return Ok(spec.clone());
                }
                let mut spec = self.parent(&profile.spec.parent.name)?.spec.clone();
                spec.merge_namespaced(&profile.spec);
                Ok(spec)
            }
            kind => Err(Error::invalid_field(
                "spec.cloudProfile.kind",
                format_args!("unsupported cloud profile kind {kind:?}"),
            )),
        }
    }

    /// Looks up a cluster-scoped CloudProfile.
    pub(crate) fn parent(&self, name: &str) -> Result<Arc<CloudProfile>, Error> {
        self.cloud_profiles.get_cluster(name).ok_or_else(|| {
            Error::invalid_field(
                "spec.cloudProfile.name",
                format_args!("CloudProfile {name} not found"),
            )
        })
    }
}
