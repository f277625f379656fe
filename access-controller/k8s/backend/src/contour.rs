//! The routing CRD backend.
//!
//! Each in-use ingress config of a listener gets a shared Service and an
//! `HTTPProxy` binding its hostname to that Service. Every broker of the
//! cluster gets its own Service on the listener, and one `HTTPProxy` per
//! ingress config it selects, named after the broker's FQDN.

use crate::{Backend, Cluster, Compiled, DesiredObject, Kind, PruneScope};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kafka_access_controller_core::{
    naming,
    resolve::{resolve_ingress_configs, ResolvedOverride},
    Error,
};
use kafka_access_controller_k8s_api::{
    cluster::CONTOUR_INGRESS_CONTROLLER,
    contour::{HttpProxySpec, TcpProxy, TcpProxyService, Tls, VirtualHost},
    labels, AccessMethod, Broker, ExternalListener, HttpProxy, Selector, Service, ServicePort,
    ServiceSpec,
};
use std::collections::BTreeMap;

/// The port name of shared Services.
pub const SHARED_PORT_NAME: &str = "tcp-all-broker";

const KINDS: &[Kind] = &[Kind::Service, Kind::HttpProxy];

/// Compiles one unit per external listener.
pub fn compile(cluster: &Cluster<'_>) -> Vec<Compiled> {
    cluster
        .spec
        .listeners_config
        .external_listeners
        .iter()
        .map(|listener| compile_listener(cluster, listener))
        .collect()
}

/// Returns true if the listener is exposed through Contour.
pub fn serves(cluster: &Cluster<'_>, listener: &ExternalListener) -> bool {
    cluster.spec.ingress_controller() == CONTOUR_INGRESS_CONTROLLER
        && listener.access_method() == AccessMethod::ClusterIp
}

fn compile_listener(cluster: &Cluster<'_>, listener: &ExternalListener) -> Compiled {
    let _span = tracing::debug_span!("listener", name = %listener.name).entered();
    let mut compiled = Compiled::empty(Backend::RoutingCrd, prune_scope(cluster, listener));
    if !serves(cluster, listener) {
        return compiled;
    }

    let any_cast_port = match listener.any_cast_port {
        Some(port) => port,
        None => {
            compiled.errors.push(Error::invariant(
                &listener.name,
                "*",
                "an anycast port is required for ClusterIP access",
            ));
            return compiled;
        }
    };
    let overrides = match resolve_ingress_configs(cluster.spec, listener) {
        Ok(overrides) => overrides,
        Err(error) => {
            compiled.errors.push(error);
            return compiled;
        }
    };

    let mut proxies = Vec::new();
    for ingress in overrides.in_use(cluster.spec) {
        let hostname = match ingress.hostname.as_deref() {
            Some(hostname) => hostname,
            None => {
                compiled.errors.push(Error::invariant(
                    &listener.name,
                    &ingress.name,
                    "a hostname is required for the shared route",
                ));
                continue;
            }
        };

        let shared = shared_service(cluster, listener, ingress, any_cast_port);
        let shared_name = naming::shared_service_name(&listener.name, &ingress.name, cluster.name);
        proxies.push(http_proxy(
            cluster,
            listener,
            hostname,
            ingress.tls_secret_name.as_deref(),
            &shared_name,
            any_cast_port,
        ));
        compiled.active.push(shared.into());

        let brokers = overrides.brokers(&ingress.name, cluster.spec);
        let template = match ingress.broker_fqdn_template.as_deref() {
            Some(template) => template,
            // Implicit overrides only carry the shared route.
            None if overrides.implicit => continue,
            None => {
                if !brokers.is_empty() {
                    compiled.errors.push(Error::invariant(
                        &listener.name,
                        &ingress.name,
                        "a broker FQDN template is required for per-broker routes",
                    ));
                }
                continue;
            }
        };
        for broker in brokers {
            proxies.push(http_proxy(
                cluster,
                listener,
                &naming::broker_fqdn(template, broker.id),
                ingress.tls_secret_name.as_deref(),
                &naming::per_broker_service_name(cluster.name, broker.id, &listener.name),
                any_cast_port,
            ));
        }
    }

    let broker_services = cluster
        .spec
        .brokers
        .iter()
        .map(|broker| (broker.id, broker_service(cluster, listener, broker, any_cast_port)))
        .collect::<BTreeMap<_, _>>();
    compiled
        .active
        .extend(broker_services.into_values().map(DesiredObject::from));
    compiled.active.extend(proxies.into_iter().map(DesiredObject::from));
    tracing::debug!(objects = compiled.active.len(), "Compiled listener");
    compiled
}

fn shared_service(
    cluster: &Cluster<'_>,
    listener: &ExternalListener,
    ingress: &ResolvedOverride,
    any_cast_port: i32,
) -> Service {
    Service {
        metadata: cluster.object_meta(
            naming::shared_service_name(&listener.name, &ingress.name, cluster.name),
            listener_labels(cluster, listener),
            ingress.service_annotations.clone(),
        ),
        spec: Some(ServiceSpec {
            type_: Some(listener.access_method().service_type().to_string()),
            selector: Some(labels::kafka(cluster.name)),
            ports: Some(vec![service_port(
                SHARED_PORT_NAME.to_string(),
                any_cast_port,
                listener.container_port,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn broker_service(
    cluster: &Cluster<'_>,
    listener: &ExternalListener,
    broker: &Broker,
    any_cast_port: i32,
) -> Service {
    let broker_id = broker.id.to_string();
    let mut labels = listener_labels(cluster, listener);
    labels.insert(labels::BROKER_ID_KEY.to_string(), broker_id.clone());
    let mut selector = labels::kafka(cluster.name);
    selector.insert(labels::BROKER_ID_KEY.to_string(), broker_id);

    Service {
        metadata: cluster.object_meta(
            naming::per_broker_service_name(cluster.name, broker.id, &listener.name),
            labels,
            listener.service_annotations.clone(),
        ),
        spec: Some(ServiceSpec {
            type_: Some(listener.access_method().service_type().to_string()),
            selector: Some(selector),
            ports: Some(vec![service_port(
                naming::broker_port_name(broker.id),
                any_cast_port,
                listener.container_port,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn http_proxy(
    cluster: &Cluster<'_>,
    listener: &ExternalListener,
    fqdn: &str,
    tls_secret_name: Option<&str>,
    service: &str,
    port: i32,
) -> HttpProxy {
    HttpProxy {
        metadata: cluster.object_meta(fqdn, listener_labels(cluster, listener), Default::default()),
        spec: HttpProxySpec {
            virtualhost: Some(VirtualHost {
                fqdn: fqdn.to_string(),
                tls: tls_secret_name.map(|name| Tls {
                    secret_name: Some(name.to_string()),
                }),
            }),
            tcpproxy: Some(TcpProxy {
                services: vec![TcpProxyService {
                    name: service.to_string(),
                    port,
                }],
            }),
        },
    }
}

fn service_port(name: String, port: i32, target_port: i32) -> ServicePort {
    ServicePort {
        name: Some(name),
        port,
        target_port: Some(IntOrString::Int(target_port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

fn listener_labels(cluster: &Cluster<'_>, listener: &ExternalListener) -> labels::Map {
    labels::merge([
        (labels::APP_KEY, labels::CONTOUR_APP),
        (labels::CLUSTER_KEY, cluster.name),
        (labels::LISTENER_KEY, listener.name.as_str()),
    ])
}

fn prune_scope(cluster: &Cluster<'_>, listener: &ExternalListener) -> PruneScope {
    PruneScope {
        kinds: KINDS,
        selector: Selector::from_map(labels::merge([
            (labels::APP_KEY, labels::CONTOUR_APP),
            (labels::CLUSTER_KEY, cluster.name),
        ])),
        listener: Some(listener.name.clone()),
        remove_unused: cluster.spec.remove_unused_ingress_resources,
    }
}

#[cfg(test)]
mod tests;
