use crate::WaitFor;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Operation, Plugin, ReadyGate, Registration, Typed, Validate,
};
use garden_admission_controller_k8s_api::{
    constants, BindingRef, CredentialsBinding, Resource, ResourceExt, SecretBinding, Shoot,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use tracing::debug;

pub const NAME: &str = "FinalizerRemoval";

/// Guards the removal of the `gardener` finalizer.
///
/// A binding keeps the finalizer while Shoots still reference it. A Shoot keeps it until its
/// deletion flow has completed, unless it was never provisioned.
pub struct FinalizerRemoval {
    gate: ReadyGate,
    shoots: Cache<Shoot>,
}

impl FinalizerRemoval {
    pub fn new(gate: ReadyGate, caches: &Caches) -> Self {
        Self {
            gate: gate.wait_for(&caches.shoots),
            shoots: caches.shoots.clone(),
        }
    }

    /// Names the Shoots in the namespace that reference the binding, sorted.
    fn referencing_shoots(&self, namespace: &str, binding: &BindingRef) -> Vec<String> {
        let mut names = self
            .shoots
            .list_namespace(namespace)
            .into_iter()
            .filter(|shoot| shoot.binding().as_ref() == Some(binding))
            .map(|shoot| shoot.name_any())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    fn check_binding(&self, attrs: &Attributes, binding: BindingRef) -> Result<(), Error> {
        let shoots = self.referencing_shoots(&attrs.namespace, &binding);
        if shoots.is_empty() {
            return Ok(());
        }
        Err(Error::forbidden(format_args!(
            "finalizer {:?} cannot be removed from {binding} because it is still referenced by \
             shoots: {}",
            constants::GARDENER_FINALIZER,
            shoots.join(", ")
        )))
    }
}

impl Plugin for FinalizerRemoval {
    fn registration(&self) -> Registration {
        Registration::new(
            NAME,
            &[Kind::Shoot, Kind::SecretBinding, Kind::CredentialsBinding],
            &[Operation::Update],
        )
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Validate for FinalizerRemoval {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error> {
        match attrs.kind {
            Kind::SecretBinding if removes_finalizer::<SecretBinding>(attrs)? => {
                self.check_binding(attrs, BindingRef::Secret(attrs.name.clone()))
            }
            Kind::CredentialsBinding if removes_finalizer::<CredentialsBinding>(attrs)? => {
                self.check_binding(attrs, BindingRef::Credentials(attrs.name.clone()))
            }
            Kind::Shoot if removes_finalizer::<Shoot>(attrs)? => {
                check_shoot(attrs.require_old_object::<Shoot>()?)
            }
            _ => Ok(()),
        }
    }
}

/// Returns true if the update drops the `gardener` finalizer.
fn removes_finalizer<T: Typed + Resource>(attrs: &Attributes) -> Result<bool, Error> {
    let has = |obj: &T| {
        obj.finalizers()
            .iter()
            .any(|f| f == constants::GARDENER_FINALIZER)
    };
    let old = attrs.require_old_object::<T>()?;
    let new = attrs.object::<T>()?;
    let removed = has(old) && !has(new);
    if removed {
        debug!(kind = attrs.kind.as_str(), name = %attrs.name, "Finalizer removal requested");
    }
    Ok(removed)
}

/// A Shoot may drop its finalizer if it was never provisioned or its deletion succeeded.
fn check_shoot(shoot: &Shoot) -> Result<(), Error> {
    if shoot.technical_id().is_empty() {
        return Ok(());
    }
    if shoot
        .last_operation()
        .is_some_and(|op| op.is_completed_deletion())
    {
        return Ok(());
    }
    Err(Error::forbidden(format_args!(
        "finalizer {:?} cannot be removed from shoot {} because its deletion has not completed",
        constants::GARDENER_FINALIZER,
        shoot.name_any()
    )))
}
