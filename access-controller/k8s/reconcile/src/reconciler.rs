use crate::{ObjectStore, ReconcileMetrics};
use kafka_access_controller_core::{Error, Result};
use kafka_access_controller_k8s_api::{
    is_externally_managed, labels, KafkaCluster, OwnerReference, Resource,
};
use kafka_access_controller_k8s_backend::{Backend, Cluster, Compiled, DesiredObject, ObjectKey};
use std::collections::HashSet;

/// Runs reconcile passes against an [`ObjectStore`].
#[derive(Clone, Debug)]
pub struct Reconciler<S> {
    store: S,
    metrics: ReconcileMetrics,
}

/// The result of a pass that ran to completion.
#[derive(Debug, Default)]
pub struct Outcome {
    pub applied: usize,
    pub deleted: usize,

    /// Errors that skipped part of the configuration.
    pub errors: Vec<Error>,
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, metrics: ReconcileMetrics) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one pass over every backend.
    ///
    /// Scoped errors are collected in the outcome. The first store error ends
    /// the pass; since every pass recomputes everything from the resource, it
    /// is safe to retry.
    #[tracing::instrument(skip_all, fields(
        cluster = resource.metadata.name.as_deref(),
        namespace = resource.metadata.namespace.as_deref(),
    ))]
    pub async fn reconcile(&self, resource: &KafkaCluster) -> Result<Outcome> {
        let cluster = Cluster::from_resource(resource)?;
        let owner = resource
            .controller_owner_ref(&())
            .ok_or(Error::InvalidResource("metadata.uid"))?;

        let mut outcome = Outcome::default();
        for backend in Backend::ALL {
            for unit in backend.compile(&cluster) {
                if let Err(error) = self.reconcile_unit(&cluster, &owner, unit, &mut outcome).await {
                    tracing::warn!(%backend, %error, "Reconcile pass failed");
                    self.metrics
                        .error(cluster.namespace, cluster.name, error.kind());
                    return Err(error);
                }
            }
        }

        self.metrics.pass(cluster.namespace, cluster.name);
        tracing::debug!(
            applied = outcome.applied,
            deleted = outcome.deleted,
            errors = outcome.errors.len(),
            "Reconciled"
        );
        Ok(outcome)
    }

    async fn reconcile_unit(
        &self,
        cluster: &Cluster<'_>,
        owner: &OwnerReference,
        unit: Compiled,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let backend = unit.backend.as_str();
        let listener = unit.prune.listener.as_deref().unwrap_or_default();
        for error in unit.errors.iter() {
            tracing::warn!(%backend, %listener, %error, "Skipping invalid configuration");
            self.metrics
                .error(cluster.namespace, cluster.name, error.kind());
        }

        for object in unit.active.iter() {
            self.store
                .apply(object, owner)
                .await
                .map_err(|source| backend_error("apply", object.key(), source))?;
            tracing::debug!(%backend, key = %object.key(), "Applied");
            self.metrics.applied(cluster.namespace, cluster.name, backend);
            outcome.applied += 1;
        }

        let deleted = self.prune(cluster, &unit).await?;
        if deleted > 0 {
            tracing::info!(%backend, %listener, deleted, "Removed unused ingress resources");
        }
        outcome.deleted += deleted;
        outcome.errors.extend(unit.errors);
        Ok(())
    }

    /// Deletes the live objects of the unit's scope that are not active.
    ///
    /// Objects of an inactive topology are always deleted. Other leftovers are
    /// only deleted when unused resources are removed and the unit compiled
    /// without errors, so that a bad configuration never takes down the
    /// objects of its last good generation. Externally managed and terminating
    /// objects are never deleted.
    async fn prune(&self, cluster: &Cluster<'_>, unit: &Compiled) -> Result<usize> {
        let scope = &unit.prune;
        let active = unit
            .active
            .iter()
            .map(DesiredObject::key)
            .collect::<HashSet<_>>();
        let remove_unused = scope.remove_unused && unit.errors.is_empty();

        let mut deleted = 0;
        for kind in scope.kinds.iter().copied() {
            let live = self
                .store
                .list(kind, cluster.namespace, &scope.selector)
                .await
                .map_err(|source| {
                    backend_error(
                        "list",
                        ObjectKey::new(kind, cluster.namespace, &scope.selector),
                        source,
                    )
                })?;

            for object in live {
                if let Some(listener) = scope.listener.as_deref() {
                    if object.labels.get(labels::LISTENER_KEY).map(String::as_str) != Some(listener)
                    {
                        continue;
                    }
                }
                if active.contains(&object.key) {
                    continue;
                }
                if !unit.is_inactive(&object.key) && !remove_unused {
                    continue;
                }
                if is_externally_managed(&object.labels, &object.annotations) {
                    tracing::debug!(key = %object.key, "Skipping externally managed object");
                    continue;
                }
                if object.terminating {
                    tracing::debug!(key = %object.key, "Skipping terminating object");
                    continue;
                }

                self.store
                    .delete(&object.key)
                    .await
                    .map_err(|source| backend_error("delete", object.key.clone(), source))?;
                tracing::debug!(key = %object.key, "Deleted");
                self.metrics
                    .pruned(cluster.namespace, cluster.name, unit.backend.as_str());
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

fn backend_error(action: &'static str, key: ObjectKey, source: anyhow::Error) -> Error {
    Error::Backend {
        action,
        kind: key.kind.as_str(),
        namespace: key.namespace,
        name: key.name,
        source,
    }
}
