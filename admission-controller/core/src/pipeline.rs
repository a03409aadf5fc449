use crate::{
    attributes::Attributes,
    object::Kind,
    plugin::{Mutate, Validate},
    Error,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info};

/// Runs every applicable mutating plugin, then every applicable validating plugin.
///
/// Validators always observe the object as left by the mutators, regardless of the order in
/// which plugins were registered.
#[derive(Clone, Default)]
pub struct Pipeline {
    mutators: HashMap<Kind, Vec<Arc<dyn Mutate>>>,
    validators: HashMap<Kind, Vec<Arc<dyn Validate>>>,
}

#[derive(Default)]
pub struct Builder {
    mutators: Vec<Arc<dyn Mutate>>,
    validators: Vec<Arc<dyn Validate>>,
    disabled: HashSet<String>,
}

// === impl Pipeline ===

impl Pipeline {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns true if at least one plugin is registered for the kind.
    pub fn handles(&self, kind: Kind) -> bool {
        self.mutators.contains_key(&kind) || self.validators.contains_key(&kind)
    }

    /// Names all registered plugins, mutators first.
    pub fn plugins(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mutators = self.mutators.values().flatten().map(|p| p.name());
        let validators = self.validators.values().flatten().map(|p| p.name());
        for name in mutators.chain(validators) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Names the caches any registered plugin reads.
    pub fn caches(&self) -> BTreeSet<String> {
        let mutators = self.mutators.values().flatten().map(|p| p.ready_gate());
        let validators = self.validators.values().flatten().map(|p| p.ready_gate());
        mutators
            .chain(validators)
            .flat_map(|gate| gate.caches().map(String::from).collect::<Vec<_>>())
            .collect()
    }

    /// Admits a request, possibly mutating `attrs.object`.
    ///
    /// Returns whether the object was changed. The first plugin error aborts the request.
    pub async fn admit(&self, attrs: &mut Attributes) -> Result<bool, Error> {
        let before = attrs.object.clone();

        for plugin in self.mutators.get(&attrs.kind).into_iter().flatten() {
            if !plugin.handles(attrs.kind, attrs.operation) {
                continue;
            }
            let name = plugin.name();
            plugin.ready_gate().ensure(name).await?;
            debug!(plugin = %name, "Mutating");
            plugin
                .admit(attrs)
                .await
                .inspect_err(|error| Self::log_denied(name, attrs, error))?;
        }

        for plugin in self.validators.get(&attrs.kind).into_iter().flatten() {
            if !plugin.handles(attrs.kind, attrs.operation) {
                continue;
            }
            let name = plugin.name();
            plugin.ready_gate().ensure(name).await?;
            debug!(plugin = %name, "Validating");
            plugin
                .validate(attrs)
                .await
                .inspect_err(|error| Self::log_denied(name, attrs, error))?;
        }

        Ok(attrs.object != before)
    }

    fn log_denied(plugin: &str, attrs: &Attributes, error: &Error) {
        info!(
            %error,
            %plugin,
            kind = attrs.kind.as_str(),
            ns = %attrs.namespace,
            name = %attrs.name,
            operation = %attrs.operation,
            "Denied"
        );
    }
}

// === impl Builder ===

impl Builder {
    /// Skips plugins with the given names.
    pub fn disable(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.disabled.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn mutate(mut self, plugin: impl Mutate + 'static) -> Self {
        self.mutators.push(Arc::new(plugin));
        self
    }

    pub fn validate(mut self, plugin: impl Validate + 'static) -> Self {
        self.validators.push(Arc::new(plugin));
        self
    }

    pub fn build(self) -> Pipeline {
        let Self {
            mutators,
            validators,
            disabled,
        } = self;

        let mut pipeline = Pipeline::default();
        for plugin in mutators {
            if disabled.contains(plugin.name()) {
                info!(plugin = %plugin.name(), "Disabled");
                continue;
            }
            for kind in plugin.registration().kinds {
                pipeline
                    .mutators
                    .entry(*kind)
                    .or_default()
                    .push(plugin.clone());
            }
        }
        for plugin in validators {
            if disabled.contains(plugin.name()) {
                info!(plugin = %plugin.name(), "Disabled");
                continue;
            }
            for kind in plugin.registration().kinds {
                pipeline
                    .validators
                    .entry(*kind)
                    .or_default()
                    .push(plugin.clone());
            }
        }
        pipeline
    }
}
