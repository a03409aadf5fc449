//! Garden Admission Controller Runtime
//!
//! Hosts the admission [`Pipeline`](core::Pipeline): watches the resources enabled plugins read,
//! serves `AdmissionReview`s over HTTPS and answers authorization questions with
//! `SubjectAccessReview`s.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use garden_admission_controller_core as core;
pub use garden_admission_controller_k8s_api as k8s;
pub use garden_admission_controller_k8s_index as index;
pub use garden_admission_controller_plugins as plugins;

mod admission;
mod args;
mod authorizer;

pub use self::{admission::Admission, args::Args, authorizer::SubjectAccessReviewer};
