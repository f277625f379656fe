//! Resolution of ingress overrides and proxy settings.
//!
//! Settings are inherited along a fixed chain: cluster defaults, then the
//! broker config group, then the broker's own config. Only the documented
//! fields take part; everything else is left untouched at every level.

use crate::{Error, Result};
use k8s_openapi::api::core::v1::NodeAffinity;
use kafka_access_controller_k8s_api::{Broker, BrokerConfig, ExternalListener, KafkaClusterSpec};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// An ingress config resolved against its listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOverride {
    pub name: String,
    /// The hostname of the shared entrypoint, inherited from the listener when
    /// the override does not set one.
    pub hostname: Option<String>,
    pub service_annotations: BTreeMap<String, String>,
    pub tls_secret_name: Option<String>,
    pub broker_fqdn_template: Option<String>,
}

/// The ingress configs of one listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOverrides {
    pub overrides: BTreeMap<String, ResolvedOverride>,

    /// Selected by brokers without an ingress mapping. Empty when every broker
    /// must opt in.
    pub default: String,

    /// Set when the listener defines no ingress configs. The single override
    /// is named after the listener and applies to every broker.
    pub implicit: bool,
}

/// The membership boundary of one static proxy deployment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Group(String),
}

/// A proxy scope together with its brokers and effective settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyScope<'s> {
    pub scope: Scope,
    /// Ordered by ascending broker id.
    pub brokers: Vec<&'s Broker>,
    pub config: ResolvedProxyConfig,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedProxyConfig {
    pub replicas: i32,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub node_affinity: Option<NodeAffinity>,
}

/// Resolves the ingress configs of `listener`.
///
/// Listeners without named configs resolve to a single implicit override so
/// that every listener yields at least one override. Fails when the default
/// names an undefined config or a broker maps to a config that no listener
/// defines. A mapping cannot be attributed to one listener, so an undefined
/// mapping fails every listener that has named configs.
pub fn resolve_ingress_configs(
    spec: &KafkaClusterSpec,
    listener: &ExternalListener,
) -> Result<ResolvedOverrides> {
    let listener_hostname = non_empty(listener.hostname_override.as_deref());

    let config = match listener.config.as_ref() {
        Some(config) if !config.ingress_config.is_empty() => config,
        _ => {
            let implicit = ResolvedOverride {
                name: listener.name.clone(),
                hostname: listener_hostname,
                service_annotations: listener.service_annotations.clone(),
                tls_secret_name: None,
                broker_fqdn_template: None,
            };
            return Ok(ResolvedOverrides {
                overrides: Some((listener.name.clone(), implicit)).into_iter().collect(),
                default: listener.name.clone(),
                implicit: true,
            });
        }
    };

    let scope = format!("listener {}", listener.name);
    let default = config.default_ingress_config.clone();
    if !default.is_empty() && !config.ingress_config.contains_key(&default) {
        return Err(Error::configuration(
            scope,
            format!("default ingress config {default} is not defined"),
        ));
    }

    let known = known_ingress_config_names(spec);
    for broker in spec.brokers.iter() {
        let broker_config = effective_broker_config(broker, spec);
        if let Some(name) = broker_config
            .broker_ingress_mapping
            .iter()
            .find(|name| !known.contains(name.as_str()))
        {
            return Err(Error::configuration(
                scope,
                format!("broker {} maps to undefined ingress config {name}", broker.id),
            ));
        }
    }

    let overrides = config
        .ingress_config
        .iter()
        .map(|(name, ingress)| {
            let contour = ingress.contour_ingress_config.as_ref();
            let mut service_annotations = listener.service_annotations.clone();
            service_annotations.extend(ingress.service_annotations.clone());
            let resolved = ResolvedOverride {
                name: name.clone(),
                hostname: non_empty(ingress.hostname_override.as_deref())
                    .or_else(|| listener_hostname.clone()),
                service_annotations,
                tls_secret_name: non_empty(contour.and_then(|c| c.tls_secret_name.as_deref())),
                broker_fqdn_template: non_empty(contour.map(|c| c.broker_fqdn_template.as_str())),
            };
            (name.clone(), resolved)
        })
        .collect();

    Ok(ResolvedOverrides {
        overrides,
        default,
        implicit: false,
    })
}

/// Returns true if at least one broker selects `name`, either explicitly in
/// its ingress mapping or by relying on `default`.
pub fn is_override_in_use(name: &str, default: &str, spec: &KafkaClusterSpec) -> bool {
    spec.brokers.iter().any(|broker| {
        let config = effective_broker_config(broker, spec);
        selects(name, default, &config)
    })
}

/// Composes a broker's config from its inline config and its config group.
///
/// Inline fields win over group fields; ingress mappings are concatenated,
/// inline entries first, without duplicates.
pub fn effective_broker_config(broker: &Broker, spec: &KafkaClusterSpec) -> BrokerConfig {
    let inline = broker.broker_config.clone().unwrap_or_default();
    let group = match broker
        .broker_config_group
        .as_deref()
        .and_then(|g| spec.broker_config_groups.get(g))
    {
        Some(group) => group,
        None => return inline,
    };

    let mut broker_ingress_mapping = inline.broker_ingress_mapping;
    for name in group.broker_ingress_mapping.iter() {
        if !broker_ingress_mapping.contains(name) {
            broker_ingress_mapping.push(name.clone());
        }
    }

    BrokerConfig {
        broker_ingress_mapping,
        envoy_config: inline.envoy_config.or_else(|| group.envoy_config.clone()),
        node_selector: inline.node_selector.or_else(|| group.node_selector.clone()),
        node_affinity: inline.node_affinity.or_else(|| group.node_affinity.clone()),
    }
}

/// Resolves the proxy settings of a scope.
///
/// Group settings only apply when per-group proxies are enabled, and each
/// field only when the group sets it.
pub fn resolve_proxy_scope_config(
    scope: &Scope,
    group: Option<&BrokerConfig>,
    spec: &KafkaClusterSpec,
) -> ResolvedProxyConfig {
    let envoy = &spec.envoy_config;
    let mut config = ResolvedProxyConfig {
        replicas: envoy.replicas(),
        node_selector: envoy.node_selector.clone(),
        node_affinity: envoy.node_affinity.clone(),
    };

    if !envoy.envoy_per_broker_group || *scope == Scope::Global {
        return config;
    }
    let group = match group {
        Some(group) => group,
        None => return config,
    };

    if let Some(replicas) = group
        .envoy_config
        .as_ref()
        .map(|e| e.replicas)
        .filter(|r| *r > 0)
    {
        config.replicas = replicas;
    }
    if let Some(node_selector) = group.node_selector.as_ref() {
        config.node_selector = Some(node_selector.clone());
    }
    if let Some(node_affinity) = group.node_affinity.as_ref() {
        config.node_affinity = Some(node_affinity.clone());
    }
    config
}

/// Partitions the brokers into proxy scopes.
///
/// The global topology yields exactly one scope with every broker. The
/// per-group topology yields one scope per config group with at least one
/// member; brokers without a known group are reported and left out.
pub fn proxy_scopes(spec: &KafkaClusterSpec, per_group: bool) -> (Vec<ProxyScope<'_>>, Vec<Error>) {
    let mut brokers = spec.brokers.iter().collect::<Vec<_>>();
    brokers.sort_by_key(|b| b.id);

    if !per_group {
        let scope = ProxyScope {
            config: resolve_proxy_scope_config(&Scope::Global, None, spec),
            scope: Scope::Global,
            brokers,
        };
        return (vec![scope], vec![]);
    }

    let mut errors = vec![];
    let mut members = BTreeMap::<&str, Vec<&Broker>>::new();
    for broker in brokers {
        match broker.broker_config_group.as_deref() {
            Some(group) if spec.broker_config_groups.contains_key(group) => {
                members.entry(group).or_default().push(broker);
            }
            Some(group) => errors.push(Error::configuration(
                format!("broker {}", broker.id),
                format!("broker config group {group} is not defined"),
            )),
            None => errors.push(Error::configuration(
                format!("broker {}", broker.id),
                "per-group proxies require a broker config group",
            )),
        }
    }

    let scopes = members
        .into_iter()
        .map(|(group, brokers)| {
            let scope = Scope::Group(group.to_string());
            ProxyScope {
                config: resolve_proxy_scope_config(
                    &scope,
                    spec.broker_config_groups.get(group),
                    spec,
                ),
                scope,
                brokers,
            }
        })
        .collect();
    (scopes, errors)
}

/// Every scope a topology could produce, whether or not it has members.
pub fn all_scopes(spec: &KafkaClusterSpec, per_group: bool) -> Vec<Scope> {
    if per_group {
        spec.broker_config_groups
            .keys()
            .map(|group| Scope::Group(group.clone()))
            .collect()
    } else {
        vec![Scope::Global]
    }
}

fn selects(name: &str, default: &str, config: &BrokerConfig) -> bool {
    if config.broker_ingress_mapping.is_empty() {
        return !default.is_empty() && name == default;
    }
    config.broker_ingress_mapping.iter().any(|n| n == name)
}

/// Ingress config names a broker may map to: every named config of every
/// external listener, and every listener name for the implicit configs.
fn known_ingress_config_names(spec: &KafkaClusterSpec) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    for listener in spec.listeners_config.external_listeners.iter() {
        names.insert(listener.name.as_str());
        if let Some(config) = listener.config.as_ref() {
            names.extend(config.ingress_config.keys().map(String::as_str));
        }
    }
    names
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(ToString::to_string)
}

// === impl ResolvedOverrides ===

impl ResolvedOverrides {
    /// Returns true if `broker` is exposed through the override `name`.
    pub fn selects(&self, name: &str, broker: &Broker, spec: &KafkaClusterSpec) -> bool {
        if self.implicit {
            return self.overrides.contains_key(name);
        }
        selects(name, &self.default, &effective_broker_config(broker, spec))
    }

    pub fn is_in_use(&self, name: &str, spec: &KafkaClusterSpec) -> bool {
        if self.implicit {
            return self.overrides.contains_key(name) && !spec.brokers.is_empty();
        }
        is_override_in_use(name, &self.default, spec)
    }

    /// The overrides selected by at least one broker, in name order.
    pub fn in_use<'o>(
        &'o self,
        spec: &'o KafkaClusterSpec,
    ) -> impl Iterator<Item = &'o ResolvedOverride> + 'o {
        self.overrides
            .values()
            .filter(move |o| self.is_in_use(&o.name, spec))
    }

    /// The brokers exposed through the override `name`, in ascending id order.
    pub fn brokers<'s>(&self, name: &str, spec: &'s KafkaClusterSpec) -> Vec<&'s Broker> {
        let mut brokers = spec
            .brokers
            .iter()
            .filter(|b| self.selects(name, b, spec))
            .collect::<Vec<_>>();
        brokers.sort_by_key(|b| b.id);
        brokers
    }
}

// === impl Scope ===

impl Scope {
    /// Label value identifying the global scope.
    pub const GLOBAL_ID: &'static str = "envoy-global";

    pub fn id(&self) -> &str {
        match self {
            Self::Global => Self::GLOBAL_ID,
            Self::Group(group) => group,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
