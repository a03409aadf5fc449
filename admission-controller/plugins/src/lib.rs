//! Garden Admission Plugins
//!
//! Every plugin is a leaf: plugins never call each other and only share the read-model
//! [`Caches`] and the authorization oracle. [`pipeline`] assembles the enabled plugins into the
//! two-phase [`Pipeline`]:
//!
//! | Plugin                       | Phase    | Resources                                    |
//! |------------------------------|----------|----------------------------------------------|
//! | `ShootDNS`                   | mutate   | Shoot (main resource and `binding`)          |
//! | `ShootVPAEnabledByDefault`   | mutate   | Shoot                                        |
//! | `OpenIDConnectPreset`        | mutate   | Shoot                                        |
//! | `Bastion`                    | mutate   | Bastion                                      |
//! | `ShootQuotaValidator`        | validate | Shoot                                        |
//! | `SeedValidator`              | validate | Seed                                         |
//! | `ResourceReferenceManager`   | validate | Seed                                         |
//! | `CustomVerbAuthorizer`       | validate | Project, NamespacedCloudProfile              |
//! | `FinalizerRemoval`           | validate | Shoot, SecretBinding, CredentialsBinding     |

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod bastion;
mod cloud_profile;
pub mod custom_verb;
pub mod dns;
pub mod finalizer;
pub mod oidc_preset;
pub mod quota;
pub mod resource_reference;
pub mod seed;
pub mod vpa;

#[cfg(test)]
mod test_util;

use chrono::{DateTime, Utc};
use garden_admission_controller_core::{Pipeline, ReadyGate, SharedAuthorizer};
use garden_admission_controller_k8s_index::{Cache, Caches};
use std::time::Duration;

/// Names of all plugins, in registration order.
pub const PLUGINS: &[&str] = &[
    dns::NAME,
    vpa::NAME,
    oidc_preset::NAME,
    bastion::NAME,
    quota::NAME,
    seed::NAME,
    resource_reference::NAME,
    custom_verb::NAME,
    finalizer::NAME,
];

#[derive(Clone, Debug)]
pub struct Config {
    /// The namespace holding the default-domain secrets.
    pub garden_namespace: String,

    /// How long a request waits for a plugin's caches to sync.
    pub ready_timeout: Duration,

    /// Names of plugins that are not registered.
    pub disabled: Vec<String>,
}

/// Returns the current time. Replaced in tests.
pub type Clock = fn() -> DateTime<Utc>;

/// Builds the admission pipeline from all enabled plugins.
pub fn pipeline(config: &Config, caches: &Caches, authorizer: SharedAuthorizer) -> Pipeline {
    let gate = || ReadyGate::new(config.ready_timeout);
    Pipeline::builder()
        .disable(config.disabled.iter().cloned())
        .mutate(dns::ShootDns::new(
            gate(),
            caches,
            config.garden_namespace.clone(),
        ))
        .mutate(vpa::VpaEnabledByDefault::new(gate()))
        .mutate(oidc_preset::OidcPreset::new(gate(), caches))
        .mutate(bastion::Bastion::new(gate(), caches))
        .validate(quota::QuotaValidator::new(gate(), caches, Utc::now))
        .validate(seed::SeedValidator::new(gate(), caches))
        .validate(resource_reference::ResourceReferenceManager::new(
            gate(),
            caches,
            authorizer.clone(),
        ))
        .validate(custom_verb::CustomVerbAuthorizer::new(
            gate(),
            caches,
            authorizer,
        ))
        .validate(finalizer::FinalizerRemoval::new(gate(), caches))
        .build()
}

/// Adds a cache's sync signal to a plugin's ready gate.
trait WaitFor {
    fn wait_for<T>(self, cache: &Cache<T>) -> Self;
}

impl WaitFor for ReadyGate {
    fn wait_for<T>(self, cache: &Cache<T>) -> Self {
        self.with_signal(cache.name(), cache.synced())
    }
}
