use crate::WaitFor;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Mutate, Operation, Plugin, ReadyGate, Registration,
};
use garden_admission_controller_k8s_api::{
    constants, Bastion as BastionObject, OwnerReference, Resource, ResourceExt, Shoot,
};
use garden_admission_controller_k8s_index::{Cache, Caches};

pub const NAME: &str = "Bastion";

/// Links new Bastions to the Shoot they give access to.
///
/// The Bastion inherits the Shoot's seed and provider type, is owned by the Shoot and records
/// its creator.
pub struct Bastion {
    gate: ReadyGate,
    shoots: Cache<Shoot>,
}

impl Bastion {
    pub fn new(gate: ReadyGate, caches: &Caches) -> Self {
        Self {
            gate: gate.wait_for(&caches.shoots),
            shoots: caches.shoots.clone(),
        }
    }
}

impl Plugin for Bastion {
    fn registration(&self) -> Registration {
        Registration::new(NAME, &[Kind::Bastion], &[Operation::Create])
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Mutate for Bastion {
    async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error> {
        let requester = attrs.user.name.clone();
        let namespace = attrs.namespace.clone();
        let bastion = attrs.object_mut::<BastionObject>()?;

        let shoot_name = bastion.spec.shoot_ref.name.as_str();
        if shoot_name.is_empty() {
            return Err(Error::invalid_field(
                "spec.shootRef.name",
                "a shoot must be referenced",
            ));
        }
        let shoot = self.shoots.get(&namespace, shoot_name).ok_or_else(|| {
            Error::invalid_field(
                "spec.shootRef.name",
                format_args!("shoot {namespace}/{shoot_name} not found"),
            )
        })?;
        if shoot.is_deleting() {
            return Err(Error::forbidden(
                "cannot create a bastion for a shoot that is being deleted",
            ));
        }
        let Some(seed_name) = shoot.seed_name() else {
            return Err(Error::forbidden(
                "cannot create a bastion for a shoot that is not yet scheduled to a seed",
            ));
        };

        bastion.spec.seed_name = Some(seed_name.to_string());
        bastion.spec.provider_type = Some(shoot.spec.provider.type_.clone());
        bastion.metadata.owner_references = Some(vec![OwnerReference {
            api_version: Shoot::api_version(&()).into_owned(),
            kind: Shoot::kind(&()).into_owned(),
            name: shoot.name_any(),
            uid: shoot.uid().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]);
        bastion
            .annotations_mut()
            .insert(constants::ANNOTATION_CREATED_BY.to_string(), requester);
        Ok(())
    }
}
