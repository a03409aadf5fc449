use crate::WaitFor;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Mutate, Operation, Plugin, ReadyGate, Registration,
};
use garden_admission_controller_k8s_api::{
    Labels, OpenIDConnectPreset, ResourceExt, Shoot,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use std::{cmp::Reverse, sync::Arc};
use tracing::debug;

pub const NAME: &str = "OpenIDConnectPreset";

/// Copies the OIDC settings of the best matching preset in the Shoot's namespace into new
/// Shoots that do not configure OIDC themselves.
///
/// The preset with the highest weight wins; equal weights are decided by the smaller name.
pub struct OidcPreset {
    gate: ReadyGate,
    presets: Cache<OpenIDConnectPreset>,
}

impl OidcPreset {
    pub fn new(gate: ReadyGate, caches: &Caches) -> Self {
        Self {
            gate: gate.wait_for(&caches.oidc_presets),
            presets: caches.oidc_presets.clone(),
        }
    }

    fn select(&self, shoot: &Shoot) -> Option<Arc<OpenIDConnectPreset>> {
        let namespace = shoot.namespace().unwrap_or_default();
        let labels = Labels::from(shoot.metadata.labels.clone());
        self.presets
            .list_namespace(&namespace)
            .into_iter()
            .filter(|preset| {
                preset
                    .spec
                    .shoot_selector
                    .as_ref()
                    .map(|selector| selector.matches(&labels))
                    .unwrap_or(false)
            })
            .min_by_key(|preset| (Reverse(preset.spec.weight), preset.name_any()))
    }
}

impl Plugin for OidcPreset {
    fn registration(&self) -> Registration {
        Registration::new(NAME, &[Kind::Shoot], &[Operation::Create])
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Mutate for OidcPreset {
    async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error> {
        let shoot = attrs.object::<Shoot>()?;
        if shoot.oidc_config().is_some() {
            return Ok(());
        }
        let Some(preset) = self.select(shoot) else {
            return Ok(());
        };

        debug!(preset = %preset.name_any(), "Applying OIDC preset");
        let shoot = attrs.object_mut::<Shoot>()?;
        shoot
            .spec
            .kubernetes
            .kube_api_server
            .get_or_insert_with(Default::default)
            .oidc_config = Some(preset.spec.to_oidc_config());
        Ok(())
    }
}
