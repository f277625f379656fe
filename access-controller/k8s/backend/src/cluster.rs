use kafka_access_controller_core::{Error, Result};
use kafka_access_controller_k8s_api::{labels, KafkaCluster, KafkaClusterSpec, ObjectMeta};

/// A snapshot of the cluster being reconciled.
#[derive(Copy, Clone, Debug)]
pub struct Cluster<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub spec: &'a KafkaClusterSpec,
}

impl<'a> Cluster<'a> {
    pub fn from_resource(cluster: &'a KafkaCluster) -> Result<Self> {
        Ok(Self {
            name: cluster
                .metadata
                .name
                .as_deref()
                .ok_or(Error::InvalidResource("metadata.name"))?,
            namespace: cluster
                .metadata
                .namespace
                .as_deref()
                .ok_or(Error::InvalidResource("metadata.namespace"))?,
            spec: &cluster.spec,
        })
    }

    pub fn domain(&self) -> &'a str {
        self.spec.cluster_domain()
    }

    /// Metadata for an object in the cluster's namespace. Empty annotations
    /// are omitted.
    pub(crate) fn object_meta(
        &self,
        name: impl ToString,
        labels: labels::Map,
        annotations: labels::Map,
    ) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.to_string()),
            labels: Some(labels),
            annotations: Some(annotations).filter(|a| !a.is_empty()),
            ..Default::default()
        }
    }
}
