//! Garden Admission Controller Core
//!
//! The admission engine is a set of independent plugins, each registered for a set of resource
//! kinds and operations. For every request the [`Pipeline`] runs:
//!
//! 1. each applicable [`Mutate`] plugin, which may change the incoming object;
//! 2. each applicable [`Validate`] plugin, which sees the object as left by the mutators.
//!
//! The first error aborts the request. Before a plugin is invoked, its [`ReadyGate`] must report
//! that all caches the plugin reads have completed their initial sync; otherwise the request
//! fails with the retryable [`Error::NotReady`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod attributes;
pub mod authorizer;
mod error;
mod object;
mod pipeline;
mod plugin;
mod ready;

pub use self::{
    attributes::{Attributes, Operation, User},
    authorizer::{AuthorizationAttributes, Authorize, Decision, SharedAuthorizer},
    error::{Error, Rejection},
    object::{Decoder, Kind, Object, Typed},
    pipeline::{Builder, Pipeline},
    plugin::{Mutate, Plugin, Registration, Validate},
    ready::{ReadyGate, DEFAULT_READY_TIMEOUT},
};
