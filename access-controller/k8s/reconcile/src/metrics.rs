use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ReconcileMetrics {
    passes: Family<ClusterLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
    applied: Family<BackendLabels, Counter>,
    pruned: Family<BackendLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ClusterLabels {
    namespace: String,
    cluster: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    namespace: String,
    cluster: String,
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BackendLabels {
    namespace: String,
    cluster: String,
    backend: String,
}

impl ReconcileMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let passes = Family::default();
        prom.register(
            "reconcile_passes",
            "Count of completed reconcile passes",
            passes.clone(),
        );

        let errors = Family::default();
        prom.register(
            "reconcile_errors",
            "Count of errors encountered while reconciling",
            errors.clone(),
        );

        let applied = Family::default();
        prom.register(
            "applied_objects",
            "Count of objects applied",
            applied.clone(),
        );

        let pruned = Family::default();
        prom.register(
            "pruned_objects",
            "Count of unused objects deleted",
            pruned.clone(),
        );

        Self {
            passes,
            errors,
            applied,
            pruned,
        }
    }

    pub(crate) fn pass(&self, namespace: &str, cluster: &str) {
        self.passes
            .get_or_create(&ClusterLabels {
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
            })
            .inc();
    }

    pub(crate) fn error(&self, namespace: &str, cluster: &str, kind: &str) {
        self.errors
            .get_or_create(&ErrorLabels {
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
                kind: kind.to_string(),
            })
            .inc();
    }

    pub(crate) fn applied(&self, namespace: &str, cluster: &str, backend: &str) {
        self.applied
            .get_or_create(&BackendLabels::new(namespace, cluster, backend))
            .inc();
    }

    pub(crate) fn pruned(&self, namespace: &str, cluster: &str, backend: &str) {
        self.pruned
            .get_or_create(&BackendLabels::new(namespace, cluster, backend))
            .inc();
    }
}

impl BackendLabels {
    fn new(namespace: &str, cluster: &str, backend: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            backend: backend.to_string(),
        }
    }
}
