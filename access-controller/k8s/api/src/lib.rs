#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod contour;
pub mod labels;

pub use self::{
    cluster::{
        AccessMethod, Broker, BrokerConfig, ContourIngressConfig, EnvoyConfig, ExternalListener,
        IngressConfig, KafkaCluster, KafkaClusterSpec, ListenerIngressConfig, ListenersConfig,
    },
    contour::HttpProxy,
    labels::{Labels, Selector},
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{ConfigMap, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, ResourceExt},
    Client, Error, Resource,
};

/// Marks objects that are owned by another cluster through the cluster
/// registry. Such objects are never deleted by this controller.
pub const EXTERNALLY_MANAGED_KEY: &str = "cluster-registry.k8s.cisco.com/resource-owner-cluster-id";

/// Returns true if the object carries the externally-managed marker as either
/// a label or an annotation.
pub fn is_externally_managed(
    labels: &labels::Map,
    annotations: &std::collections::BTreeMap<String, String>,
) -> bool {
    labels.contains_key(EXTERNALLY_MANAGED_KEY) || annotations.contains_key(EXTERNALLY_MANAGED_KEY)
}
