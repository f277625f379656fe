use kafka_access_controller_k8s_api::{labels, OwnerReference, Selector};
use kafka_access_controller_k8s_backend::{DesiredObject, Kind, ObjectKey};

/// Reads and writes objects in the cluster.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates or updates `object`, setting `owner` as its owner. Applying an
    /// unchanged object is a no-op.
    async fn apply(&self, object: &DesiredObject, owner: &OwnerReference) -> anyhow::Result<()>;

    /// Deletes an object. Deleting an object that does not exist succeeds.
    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<()>;

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &Selector,
    ) -> anyhow::Result<Vec<LiveObject>>;
}

/// The parts of a live object pruning decisions depend on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveObject {
    pub key: ObjectKey,
    pub labels: labels::Map,
    pub annotations: labels::Map,
    /// Set when the object has a deletion timestamp.
    pub terminating: bool,
}
