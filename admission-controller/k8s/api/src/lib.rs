#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod garden;
pub mod labels;
pub mod operations;
pub mod quantity;
pub mod security;
pub mod settings;

pub use self::{
    garden::{
        BindingRef, CloudProfile, CloudProfileReference, CredentialsReference,
        NamespacedCloudProfile, ObjectReference, Project, Quota, SecretBinding, Seed, Shoot,
    },
    labels::Labels,
    operations::Bastion,
    quantity::{Amount, Quantity},
    security::{CredentialsBinding, WorkloadIdentity},
    settings::OpenIDConnectPreset,
};
pub use k8s_openapi::{
    api::core::v1::Secret,
    apimachinery::pkg::apis::meta::v1::{OwnerReference, Time},
};
pub use kube::{core::ObjectMeta, Resource, ResourceExt};
