use crate::Cache;
use garden_admission_controller_k8s_api::{Resource, ResourceExt};
use kubert::index::{ClusterRemoved, NamespacedRemoved};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Wraps a [`Cache`] so that every watch update is also recorded in metrics.
pub struct IndexMetrics<T> {
    inner: Cache<T>,

    index_size: Family<NamespacedIndexLabels, Gauge>,
    index_applies: Family<NamespacedIndexLabels, Counter>,
    index_deletes: Family<NamespacedIndexLabels, Counter>,
    index_resets: Family<IndexLabels, Counter>,
}

/// Metric families shared by the caches of all kinds.
#[derive(Clone, Debug, Default)]
pub struct Families {
    index_size: Family<NamespacedIndexLabels, Gauge>,
    index_applies: Family<NamespacedIndexLabels, Counter>,
    index_deletes: Family<NamespacedIndexLabels, Counter>,
    index_resets: Family<IndexLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespacedIndexLabels {
    namespace: String,
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct IndexLabels {
    kind: String,
}

// === impl Families ===

impl Families {
    pub fn register(prom: &mut Registry) -> Self {
        let index_size = Family::default();
        prom.register(
            "index_size",
            "Gauge of the number of resources in the index",
            index_size.clone(),
        );

        let index_applies = Family::default();
        prom.register(
            "index_applies",
            "Count of applies to the index",
            index_applies.clone(),
        );

        let index_deletes = Family::default();
        prom.register(
            "index_deletes",
            "Count of deletes to the index",
            index_deletes.clone(),
        );

        let index_resets = Family::default();
        prom.register(
            "index_resets",
            "Count of resets to the index",
            index_resets.clone(),
        );

        Self {
            index_size,
            index_applies,
            index_deletes,
            index_resets,
        }
    }

    /// Wraps the cache in an index that records its updates in these families.
    pub fn metered<T>(&self, inner: Cache<T>) -> Arc<RwLock<IndexMetrics<T>>> {
        Arc::new(RwLock::new(IndexMetrics {
            inner,
            index_size: self.index_size.clone(),
            index_applies: self.index_applies.clone(),
            index_deletes: self.index_deletes.clone(),
            index_resets: self.index_resets.clone(),
        }))
    }
}

// === impl IndexMetrics ===

impl<T> IndexMetrics<T>
where
    T: Resource<DynamicType = ()>,
{
    fn labels(namespace: String) -> NamespacedIndexLabels {
        NamespacedIndexLabels {
            namespace,
            kind: T::kind(&()).to_string(),
        }
    }

    fn observe_applied(&self, namespace: String) {
        let labels = Self::labels(namespace);
        self.index_applies.get_or_create(&labels).inc();
        self.set_size(labels);
    }

    fn observe_deleted(&self, namespace: String) {
        let labels = Self::labels(namespace);
        self.index_deletes.get_or_create(&labels).inc();
        self.set_size(labels);
    }

    fn observe_reset(&self, namespaces: Vec<String>) {
        self.index_resets
            .get_or_create(&IndexLabels {
                kind: T::kind(&()).to_string(),
            })
            .inc();
        for ns in namespaces {
            self.set_size(Self::labels(ns));
        }
    }

    fn set_size(&self, labels: NamespacedIndexLabels) {
        let size = self.inner.namespace_len(&labels.namespace);
        self.index_size.get_or_create(&labels).set(size as i64);
    }
}

impl<T> kubert::index::IndexNamespacedResource<T> for IndexMetrics<T>
where
    T: Resource<DynamicType = ()>,
{
    /// Processes an update to a Kubernetes resource.
    fn apply(&mut self, resource: T) {
        let namespace = resource.namespace().unwrap_or_default();
        kubert::index::IndexNamespacedResource::apply(&mut self.inner, resource);
        self.observe_applied(namespace);
    }

    /// Observes the removal of a Kubernetes resource.
    fn delete(&mut self, namespace: String, name: String) {
        kubert::index::IndexNamespacedResource::delete(&mut self.inner, namespace.clone(), name);
        self.observe_deleted(namespace);
    }

    /// Resets an index with a set of live resources and a namespaced map of removed
    /// resources.
    fn reset(&mut self, resources: Vec<T>, removed: NamespacedRemoved) {
        let namespaces = resources
            .iter()
            .flat_map(|r| r.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        kubert::index::IndexNamespacedResource::reset(&mut self.inner, resources, removed);
        self.observe_reset(namespaces);
    }
}

impl<T> kubert::index::IndexClusterResource<T> for IndexMetrics<T>
where
    T: Resource<DynamicType = ()>,
{
    fn apply(&mut self, resource: T) {
        kubert::index::IndexClusterResource::apply(&mut self.inner, resource);
        self.observe_applied(String::new());
    }

    fn delete(&mut self, name: String) {
        kubert::index::IndexClusterResource::delete(&mut self.inner, name);
        self.observe_deleted(String::new());
    }

    fn reset(&mut self, resources: Vec<T>, removed: ClusterRemoved) {
        kubert::index::IndexClusterResource::reset(&mut self.inner, resources, removed);
        self.observe_reset(vec![String::new()]);
    }
}
