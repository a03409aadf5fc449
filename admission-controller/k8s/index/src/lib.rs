//! Garden Admission Controller Indexes
//!
//! Admission plugins resolve cross-object relationships, e.g. "which Shoots reference this
//! binding?", against in-memory read models of the garden API. Each read model is a
//! [`Cache`] of a single resource kind, fed by a watch through the `kubert::index` traits:
//!
//! - `apply` and `delete` keep the cache current as the watch observes changes;
//! - `reset` replaces the cache's contents when the watch (re)lists, and marks the cache as
//!   synced. Until then, plugins that depend on the cache refuse to admit requests.
//!
//! Caches are only eventually consistent with the API server: admission decisions made against
//! them may race with concurrent writes.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
pub mod metrics;


pub use self::cache::{Cache, Store};
use garden_admission_controller_k8s_api::{
    CloudProfile, CredentialsBinding, NamespacedCloudProfile, OpenIDConnectPreset, Project,
    Quota, Secret, SecretBinding, Shoot, WorkloadIdentity,
};

/// All read models the admission plugins may depend on.
///
/// Built once at startup and handed to each plugin, which picks the caches it needs. Only the
/// caches some enabled plugin depends on are fed by a watch.
#[derive(Clone, Debug, Default)]
pub struct Caches {
    pub cloud_profiles: Cache<CloudProfile>,
    pub credentials_bindings: Cache<CredentialsBinding>,
    pub namespaced_cloud_profiles: Cache<NamespacedCloudProfile>,
    pub oidc_presets: Cache<OpenIDConnectPreset>,
    pub projects: Cache<Project>,
    pub quotas: Cache<Quota>,
    pub secret_bindings: Cache<SecretBinding>,
    pub shoots: Cache<Shoot>,
    pub workload_identities: Cache<WorkloadIdentity>,

    /// Default-domain secrets of the garden namespace.
    pub default_domain_secrets: Cache<Secret>,
}
