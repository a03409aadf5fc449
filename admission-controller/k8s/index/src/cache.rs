use ahash::AHashMap as HashMap;
use garden_admission_controller_k8s_api::{Resource, ResourceExt};
use kubert::index::{ClusterRemoved, NamespacedRemoved};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tokio::sync::watch;

/// A shared, watch-fed read model of a single resource kind.
pub struct Cache<T> {
    name: Arc<str>,
    store: Arc<RwLock<Store<T>>>,
}

/// Holds the objects of a [`Cache`], indexed by namespace and name.
///
/// Cluster-scoped objects are stored under the empty namespace.
pub struct Store<T> {
    namespaces: HashMap<String, HashMap<String, Arc<T>>>,
    synced: watch::Sender<bool>,
}

// === impl Cache ===

impl<T> Cache<T>
where
    T: Resource<DynamicType = ()>,
{
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            name: T::plural(&()).into(),
            store: Arc::new(RwLock::new(Store {
                namespaces: HashMap::default(),
                synced,
            })),
        }
    }

    /// Builds a cache that already completed its initial sync with the given objects.
    pub fn synced_with(objects: impl IntoIterator<Item = T>) -> Self {
        let cache = Self::new();
        cache.store.write().reset(objects.into_iter().collect());
        cache
    }
}

impl<T> Cache<T> {
    /// The resource kind's plural name, e.g. `shoots`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_synced(&self) -> bool {
        *self.store.read().synced.borrow()
    }

    /// Observes whether the cache has completed its initial sync.
    pub fn synced(&self) -> watch::Receiver<bool> {
        self.store.read().synced.subscribe()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<T>> {
        self.store.read().namespaces.get(namespace)?.get(name).cloned()
    }

    pub fn get_cluster(&self, name: &str) -> Option<Arc<T>> {
        self.get("", name)
    }

    pub fn list(&self) -> Vec<Arc<T>> {
        self.store
            .read()
            .namespaces
            .values()
            .flat_map(|objects| objects.values().cloned())
            .collect()
    }

    pub fn list_namespace(&self, namespace: &str) -> Vec<Arc<T>> {
        self.store
            .read()
            .namespaces
            .get(namespace)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.store
            .read()
            .namespaces
            .values()
            .map(|objects| objects.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn namespace_len(&self, namespace: &str) -> usize {
        self.store
            .read()
            .namespaces
            .get(namespace)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: self.store.clone(),
        }
    }
}

impl<T> Default for Cache<T>
where
    T: Resource<DynamicType = ()>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("synced", &self.is_synced())
            .field("len", &self.len())
            .finish()
    }
}

impl<T> kubert::index::IndexNamespacedResource<T> for Cache<T>
where
    T: ResourceExt,
{
    fn apply(&mut self, resource: T) {
        self.store.write().apply(resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.store.write().delete(&namespace, &name);
    }

    fn reset(&mut self, resources: Vec<T>, _removed: NamespacedRemoved) {
        tracing::debug!(kind = %self.name, resources = resources.len(), "Resetting cache");
        self.store.write().reset(resources);
    }
}

impl<T> kubert::index::IndexClusterResource<T> for Cache<T>
where
    T: ResourceExt,
{
    fn apply(&mut self, resource: T) {
        self.store.write().apply(resource);
    }

    fn delete(&mut self, name: String) {
        self.store.write().delete("", &name);
    }

    fn reset(&mut self, resources: Vec<T>, _removed: ClusterRemoved) {
        tracing::debug!(kind = %self.name, resources = resources.len(), "Resetting cache");
        self.store.write().reset(resources);
    }
}

// === impl Store ===

impl<T: ResourceExt> Store<T> {
    fn apply(&mut self, resource: T) {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        self.namespaces
            .entry(namespace)
            .or_default()
            .insert(name, Arc::new(resource));
    }

    /// Replaces the store's contents and marks it as synced.
    ///
    /// Objects that are not part of the new snapshot are dropped, so the removed sets kubert
    /// computes are not needed.
    fn reset(&mut self, resources: Vec<T>) {
        self.namespaces.clear();
        for resource in resources {
            self.apply(resource);
        }
        self.synced.send_replace(true);
    }
}

impl<T> Store<T> {
    fn delete(&mut self, namespace: &str, name: &str) {
        if let Some(objects) = self.namespaces.get_mut(namespace) {
            objects.remove(name);
            if objects.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
    }
}
