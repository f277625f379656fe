//! Deterministic names, ports and addresses.
//!
//! Pruning and lookups by other components recompute these names, so every
//! function here must return the same output for the same input.

use crate::resolve::Scope;

const ENVOY_CONFIG_PREFIX: &str = "envoy-config";
const ENVOY_DEPLOYMENT_PREFIX: &str = "envoy";
const ENVOY_LOAD_BALANCER_PREFIX: &str = "envoy-loadbalancer";

/// Replaced by the broker id in FQDN templates.
pub const BROKER_ID_PLACEHOLDER: &str = "%d";

/// Name of the service exposing one broker on one listener.
pub fn per_broker_service_name(cluster: &str, broker_id: i32, listener: &str) -> String {
    format!("{cluster}-{broker_id}-{listener}")
}

/// Name of the service fronting all brokers of a listener through one
/// ingress config.
pub fn shared_service_name(listener: &str, ingress_config: &str, cluster: &str) -> String {
    format!("{listener}-{ingress_config}-{cluster}")
}

/// Name of the single port of a per-broker service.
pub fn broker_port_name(broker_id: i32) -> String {
    format!("broker-{broker_id}")
}

/// Computes a broker's external port from its listener's starting port.
///
/// Returns `None` when the listener has no starting port or the result is not
/// a valid port.
pub fn per_broker_external_port(external_starting_port: i32, broker_id: i32) -> Option<u16> {
    if external_starting_port < 0 || broker_id < 0 {
        return None;
    }
    let port = external_starting_port.checked_add(broker_id)?;
    u16::try_from(port).ok().filter(|p| *p != 0)
}

pub fn broker_fqdn(template: &str, broker_id: i32) -> String {
    template.replace(BROKER_ID_PLACEHOLDER, &broker_id.to_string())
}

/// The stable per-pod address of a broker, resolved through the headless
/// service.
pub fn broker_host(cluster: &str, broker_id: i32, namespace: &str, domain: &str) -> String {
    format!("{cluster}-{broker_id}.{cluster}-headless.{namespace}.svc.{domain}")
}

pub fn all_broker_host(cluster: &str, namespace: &str, domain: &str) -> String {
    format!("{cluster}-all-broker.{namespace}.svc.{domain}")
}

pub fn envoy_config_name(scope: &Scope, cluster: &str) -> String {
    scoped(ENVOY_CONFIG_PREFIX, scope, cluster)
}

pub fn envoy_deployment_name(scope: &Scope, cluster: &str) -> String {
    scoped(ENVOY_DEPLOYMENT_PREFIX, scope, cluster)
}

pub fn envoy_load_balancer_name(scope: &Scope, cluster: &str) -> String {
    scoped(ENVOY_LOAD_BALANCER_PREFIX, scope, cluster)
}

/// Scoped names are unique within one cluster. They may alias across clusters
/// of the same namespace (group `a` of cluster `b` and the global scope of
/// cluster `a-b`), so such clusters must not share a namespace.
fn scoped(prefix: &str, scope: &Scope, cluster: &str) -> String {
    match scope {
        Scope::Global => format!("{prefix}-{cluster}"),
        Scope::Group(group) => format!("{prefix}-{group}-{cluster}"),
    }
}
