//! Enforces the Quotas referenced by a Shoot's binding.
//!
//! A Shoot is charged the maximum of every worker pool it declares. Its charge, plus the charge
//! of every other Shoot in the quota's scope, must stay within each of the quota's metrics.
//! Quotas may also bound how far a Shoot's expiration can be pushed out.

mod usage;


pub use self::usage::Usage;
use crate::{cloud_profile::Profiles, Clock, WaitFor};
use chrono::TimeDelta;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Operation, Plugin, ReadyGate, Registration, Validate,
};
use garden_admission_controller_k8s_api::{
    constants, BindingRef, CredentialsBinding, ObjectReference, Quota, ResourceExt,
    SecretBinding, Shoot,
};
use garden_admission_controller_k8s_index::{Cache, Caches};
use std::sync::Arc;
use tracing::debug;

pub const NAME: &str = "ShootQuotaValidator";

pub struct QuotaValidator {
    gate: ReadyGate,
    shoots: Cache<Shoot>,
    quotas: Cache<Quota>,
    secret_bindings: Cache<SecretBinding>,
    credentials_bindings: Cache<CredentialsBinding>,
    profiles: Profiles,
    now: Clock,
}

// === impl QuotaValidator ===

impl QuotaValidator {
    pub fn new(gate: ReadyGate, caches: &Caches, now: Clock) -> Self {
        Self {
            gate: gate
                .wait_for(&caches.shoots)
                .wait_for(&caches.quotas)
                .wait_for(&caches.secret_bindings)
                .wait_for(&caches.credentials_bindings)
                .wait_for(&caches.cloud_profiles)
                .wait_for(&caches.namespaced_cloud_profiles),
            shoots: caches.shoots.clone(),
            quotas: caches.quotas.clone(),
            secret_bindings: caches.secret_bindings.clone(),
            credentials_bindings: caches.credentials_bindings.clone(),
            profiles: Profiles::new(
                caches.cloud_profiles.clone(),
                caches.namespaced_cloud_profiles.clone(),
            ),
            now,
        }
    }

    /// The quota references of a binding, each paired with the namespace it is relative to.
    fn binding_quotas(
        &self,
        namespace: &str,
        binding: &BindingRef,
    ) -> Option<Vec<ObjectReference>> {
        match binding {
            BindingRef::Secret(name) => self
                .secret_bindings
                .get(namespace, name)
                .map(|b| b.quotas().to_vec()),
            BindingRef::Credentials(name) => self
                .credentials_bindings
                .get(namespace, name)
                .map(|b| b.quotas().to_vec()),
        }
    }

    fn quotas_of(&self, shoot: &Shoot, binding: &BindingRef) -> Result<Vec<Arc<Quota>>, Error> {
        let namespace = shoot.namespace().unwrap_or_default();
        let references = self.binding_quotas(&namespace, binding).ok_or_else(|| {
            let field = match binding {
                BindingRef::Secret(_) => "spec.secretBindingName",
                BindingRef::Credentials(_) => "spec.credentialsBindingName",
            };
            Error::invalid_field(field, format_args!("{binding} not found"))
        })?;

        references
            .iter()
            .map(|reference| {
                let quota_ns = reference.namespace.as_deref().unwrap_or(&namespace);
                self.quotas.get(quota_ns, &reference.name).ok_or_else(|| {
                    Error::invalid(format_args!(
                        "quota {quota_ns}/{} referenced by {binding} not found",
                        reference.name
                    ))
                })
            })
            .collect()
    }

    /// Returns true if the Shoot's binding references the quota.
    fn is_bound_to(&self, shoot: &Shoot, quota: &Quota) -> bool {
        let Some(binding) = shoot.binding() else {
            return false;
        };
        let namespace = shoot.namespace().unwrap_or_default();
        let quota_ns = quota.namespace().unwrap_or_default();
        self.binding_quotas(&namespace, &binding)
            .map(|refs| {
                refs.iter()
                    .any(|r| r.refers_to(&quota_ns, &quota.name_any(), &namespace))
            })
            .unwrap_or(false)
    }

    /// The charge of all other live Shoots in the quota's scope.
    fn used_by_others(&self, shoot: &Shoot, quota: &Quota) -> Result<Usage, Error> {
        let namespace = shoot.namespace().unwrap_or_default();
        let name = shoot.name_any();
        let candidates = if quota.is_project_scoped() {
            self.shoots.list_namespace(&namespace)
        } else {
            self.shoots.list()
        };

        let mut used = Usage::default();
        for other in candidates {
            let other_ns = other.namespace().unwrap_or_default();
            if other.is_deleting() || (other_ns == namespace && other.name_any() == name) {
                continue;
            }
            if !quota.is_project_scoped() && !self.is_bound_to(&other, quota) {
                continue;
            }
            let usage = self
                .profiles
                .spec_for(&other)
                .and_then(|profile| Usage::of(&other, &profile))
                .map_err(|error| {
                    Error::internal(anyhow::anyhow!(
                        "failed to compute the resources of shoot {other_ns}/{}: {error}",
                        other.name_any()
                    ))
                })?;
            used += &usage;
        }
        Ok(used)
    }

    fn check_quota(&self, shoot: &Shoot, required: &Usage, quota: &Quota) -> Result<(), Error> {
        let used = self.used_by_others(shoot, quota)?;
        let mut exceeded = Vec::new();
        for (metric, limit) in &quota.spec.metrics {
            let limit = limit.amount().map_err(|error| {
                Error::internal(anyhow::anyhow!(
                    "quota {} has an invalid {metric} limit: {error}",
                    quota.name_any()
                ))
            })?;
            let total = used.get(metric) + required.get(metric);
            debug!(quota = %quota.name_any(), %metric, %total, %limit, "Checking quota");
            if total > limit {
                exceeded.push(metric.as_str());
            }
        }

        if !exceeded.is_empty() {
            return Err(Error::forbidden(format_args!(
                "quota limits exceeded. Unable to allocate further {}",
                exceeded.join(", ")
            )));
        }
        Ok(())
    }

    /// An expiration that is pushed out may not exceed the smallest cluster lifetime of the
    /// quotas, counted from now.
    fn check_lifetime(
        &self,
        shoot: &Shoot,
        old: &Shoot,
        quotas: &[Arc<Quota>],
    ) -> Result<(), Error> {
        let Some(days) = quotas
            .iter()
            .filter_map(|q| q.spec.cluster_lifetime_days)
            .min()
        else {
            return Ok(());
        };
        // A lifetime beyond the representable time range never bounds the expiration.
        let Some(lifetime) = TimeDelta::try_days(i64::from(days)) else {
            return Ok(());
        };

        let requested = match shoot.expiration_timestamp() {
            None => return Ok(()),
            Some(Ok(ts)) => ts,
            Some(Err(error)) => {
                return Err(Error::invalid_field(
                    format!(
                        "metadata.annotations[{}]",
                        constants::ANNOTATION_SHOOT_EXPIRATION_TIMESTAMP
                    ),
                    format_args!("invalid timestamp: {error}"),
                ))
            }
        };
        let previous = match old.expiration_timestamp() {
            Some(Ok(ts)) => Some(ts),
            _ => old
                .metadata
                .creation_timestamp
                .as_ref()
                .and_then(|created| created.0.checked_add_signed(lifetime)),
        };

        let extended = previous.map(|previous| requested > previous).unwrap_or(true);
        let Some(latest) = (self.now)().checked_add_signed(lifetime) else {
            return Ok(());
        };
        if extended && requested > latest {
            return Err(Error::forbidden(format_args!(
                "requested shoot expiration time is too late. The lifetime can only be extended \
                 by {days} day(s)"
            )));
        }
        Ok(())
    }
}

impl Plugin for QuotaValidator {
    fn registration(&self) -> Registration {
        Registration::new(
            NAME,
            &[Kind::Shoot],
            &[Operation::Create, Operation::Update],
        )
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Validate for QuotaValidator {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error> {
        if !attrs.subresource.is_empty() {
            return Ok(());
        }
        let shoot = attrs.object::<Shoot>()?;
        if shoot.is_deleting() {
            return Ok(());
        }
        let Some(binding) = shoot.binding() else {
            return Ok(());
        };
        let quotas = self.quotas_of(shoot, &binding)?;
        if quotas.is_empty() {
            return Ok(());
        }

        let old = attrs.old_object::<Shoot>()?;
        if let Some(old) = old {
            self.check_lifetime(shoot, old, &quotas)?;
            if !needs_verification(old, shoot) {
                return Ok(());
            }
        }

        let profile = self.profiles.spec_for(shoot)?;
        let required = Usage::of(shoot, &profile)?;
        for quota in &quotas {
            self.check_quota(shoot, &required, quota)?;
        }
        Ok(())
    }
}

/// Returns true if an update may raise the Shoot's charge: a worker pool was added or changed
/// its machine type, maximum or volume, or the nginx-ingress addon was switched on.
pub fn needs_verification(old: &Shoot, new: &Shoot) -> bool {
    if !old.nginx_ingress_enabled() && new.nginx_ingress_enabled() {
        return true;
    }

    new.spec.provider.workers.iter().any(|worker| {
        match old.spec.provider.workers.iter().find(|w| w.name == worker.name) {
            None => true,
            Some(previous) => {
                previous.machine.type_ != worker.machine.type_
                    || previous.maximum != worker.maximum
                    || previous.volume != worker.volume
            }
        }
    })
}
