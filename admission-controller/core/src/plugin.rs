use crate::{
    attributes::{Attributes, Operation},
    object::Kind,
    ready::ReadyGate,
    Error,
};

/// Describes the requests a plugin is invoked for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub name: &'static str,
    pub kinds: &'static [Kind],
    pub operations: &'static [Operation],
}

pub trait Plugin: Send + Sync {
    fn registration(&self) -> Registration;

    /// The sync signals of the caches this plugin reads.
    fn ready_gate(&self) -> &ReadyGate;

    fn name(&self) -> &'static str {
        self.registration().name
    }

    fn handles(&self, kind: Kind, operation: Operation) -> bool {
        let Registration {
            kinds, operations, ..
        } = self.registration();
        kinds.contains(&kind) && operations.contains(&operation)
    }
}

/// A plugin that may change the incoming object.
#[async_trait::async_trait]
pub trait Mutate: Plugin {
    async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error>;
}

/// A plugin that accepts or rejects the (already mutated) incoming object.
#[async_trait::async_trait]
pub trait Validate: Plugin {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error>;
}

// === impl Registration ===

impl Registration {
    pub const fn new(
        name: &'static str,
        kinds: &'static [Kind],
        operations: &'static [Operation],
    ) -> Self {
        Self {
            name,
            kinds,
            operations,
        }
    }
}
