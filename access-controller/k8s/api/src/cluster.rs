use k8s_openapi::api::core::v1::{LocalObjectReference, NodeAffinity, ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

pub const ENVOY_INGRESS_CONTROLLER: &str = "envoy";
pub const CONTOUR_INGRESS_CONTROLLER: &str = "contour";

/// Sentinel external starting port: the listener has no per-broker ports and
/// is only reachable through its anycast port.
pub const NO_STARTING_PORT: i32 = -1;

const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
const DEFAULT_ENVOY_IMAGE: &str = "envoyproxy/envoy:v1.22.2";

/// Describes a Kafka cluster and how its brokers are exposed.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kafka.banzaicloud.io",
    version = "v1beta1",
    kind = "KafkaCluster",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaClusterSpec {
    #[serde(default)]
    pub brokers: Vec<Broker>,

    #[serde(default)]
    pub broker_config_groups: BTreeMap<String, BrokerConfig>,

    #[serde(default)]
    pub listeners_config: ListenersConfig,

    /// Either `envoy` (the default) or `contour`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_controller: Option<String>,

    #[serde(default)]
    pub envoy_config: EnvoyConfig,

    /// Enables pruning of ingress objects that are no longer desired.
    #[serde(default)]
    pub remove_unused_ingress_resources: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_cluster_domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cruise_control_config: Option<CruiseControlConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Broker {
    /// Ids of 1000 and above denote ephemeral brokers provisioned outside of
    /// the cluster resource. They are exposed like any other broker.
    pub id: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_config_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_config: Option<BrokerConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Names of the ingress configs that expose this broker.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broker_ingress_mapping: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envoy_config: Option<EnvoyGroupConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,
}

/// Envoy settings that may be overridden per broker config group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyGroupConfig {
    #[serde(default)]
    pub replicas: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenersConfig {
    #[serde(default)]
    pub internal_listeners: Vec<InternalListener>,

    #[serde(default)]
    pub external_listeners: Vec<ExternalListener>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalListener {
    pub name: String,
    #[serde(rename = "type")]
    pub protocol: String,
    pub container_port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalListener {
    pub name: String,

    #[serde(default, rename = "type")]
    pub protocol: String,

    pub container_port: i32,

    /// Base for per-broker external ports; `-1` disables them.
    #[serde(default)]
    pub external_starting_port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_method: Option<AccessMethod>,

    /// Port of the shared entrypoint fronting every broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_cast_port: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname_override: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service_annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_traffic_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ListenerIngressConfig>,
}

/// How an external listener is exposed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum AccessMethod {
    NodePort,
    #[default]
    LoadBalancer,
    #[serde(rename = "ClusterIP")]
    ClusterIp,
}

/// The named ingress overrides of a listener.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenerIngressConfig {
    /// Applies to brokers that do not list any ingress config. Empty means
    /// every broker must opt in explicitly.
    #[serde(default)]
    pub default_ingress_config: String,

    #[serde(default)]
    pub ingress_config: BTreeMap<String, IngressConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname_override: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service_annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contour_ingress_config: Option<ContourIngressConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContourIngressConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret_name: Option<String>,

    /// A hostname template where `%d` is replaced by the broker id.
    #[serde(default, rename = "brokerFQDNTemplate")]
    pub broker_fqdn_template: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Annotations for the Envoy LoadBalancer service.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,

    /// Runs one Envoy deployment per broker config group instead of one for
    /// the whole cluster.
    #[serde(default)]
    pub envoy_per_broker_group: bool,

    /// The LoadBalancer in front of Envoy is provided by the user.
    #[serde(default, rename = "bringYourOwnLB")]
    pub bring_your_own_lb: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CruiseControlConfig {
    /// Cruise Control properties in Java properties format.
    #[serde(default)]
    pub config: String,
}

// === impl KafkaClusterSpec ===

impl KafkaClusterSpec {
    pub fn ingress_controller(&self) -> &str {
        self.ingress_controller
            .as_deref()
            .unwrap_or(ENVOY_INGRESS_CONTROLLER)
    }

    pub fn cluster_domain(&self) -> &str {
        self.kubernetes_cluster_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_CLUSTER_DOMAIN)
    }
}

// === impl ExternalListener ===

impl ExternalListener {
    pub fn access_method(&self) -> AccessMethod {
        self.access_method.unwrap_or_default()
    }

    pub fn uses_starting_port(&self) -> bool {
        self.external_starting_port != NO_STARTING_PORT
    }
}

// === impl EnvoyConfig ===

impl EnvoyConfig {
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_ENVOY_IMAGE)
    }

    pub fn replicas(&self) -> i32 {
        self.replicas.filter(|r| *r > 0).unwrap_or(1)
    }
}

// === impl AccessMethod ===

impl AccessMethod {
    /// The service type that implements this access method.
    pub fn service_type(&self) -> &'static str {
        match self {
            Self::NodePort => "NodePort",
            Self::LoadBalancer => "LoadBalancer",
            Self::ClusterIp => "ClusterIP",
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type())
    }
}
