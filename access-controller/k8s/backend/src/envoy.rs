//! The static proxy backend.
//!
//! Every proxy scope gets a ConfigMap holding a generated Envoy bootstrap
//! config, a Deployment running Envoy with that config, and a LoadBalancer
//! Service in front of the Deployment. The Deployment's pod template carries
//! a hash of the config so that config changes roll the pods.

mod bootstrap;

use self::bootstrap::{Bootstrap, ADMIN_PORT};
use crate::{Backend, Cluster, Compiled, DesiredObject, Kind, ObjectKey, PruneScope};
use k8s_openapi::{
    api::core::v1::{
        Affinity, ConfigMapVolumeSource, Container, ContainerPort, Volume, VolumeMount,
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
use kafka_access_controller_core::{
    naming,
    resolve::{all_scopes, proxy_scopes, ProxyScope, Scope},
    Error,
};
use kafka_access_controller_k8s_api::{
    cluster::ENVOY_INGRESS_CONTROLLER, labels, AccessMethod, Broker, ConfigMap, Deployment,
    DeploymentSpec, ExternalListener, LabelSelector, ObjectMeta, PodSpec, PodTemplateSpec,
    Selector, Service, ServicePort, ServiceSpec,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// The ConfigMap key holding the bootstrap config.
pub const CONFIG_KEY: &str = "envoy.yaml";
/// The pod annotation holding the hash of the bootstrap config.
pub const CONFIG_HASH_ANNOTATION: &str = "envoy.yaml.hash";

const CONFIG_MOUNT_PATH: &str = "/etc/envoy";
const CONTAINER_NAME: &str = "envoy";
const ADMIN_PORT_NAME: &str = "envoy-admin";
const CONFIG_FILE_MODE: i32 = 0o644;

const KINDS: &[Kind] = &[Kind::ConfigMap, Kind::Deployment, Kind::Service];

/// One listener/upstream pair of a proxy config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// Names both the Envoy listener and its upstream cluster.
    pub name: String,
    /// Names the LoadBalancer port.
    pub port_name: String,
    pub listen_port: u16,
    pub stat_prefix: String,
    pub upstream_host: String,
    pub upstream_port: u16,
}

/// Compiles the objects of every proxy scope.
///
/// Scopes of the inactive topology are always marked inactive, as are the
/// groups of the active topology that have no brokers, so that toggling
/// per-group proxies converges in one pass.
pub fn compile(cluster: &Cluster<'_>) -> Compiled {
    let spec = cluster.spec;
    let mut compiled = Compiled::empty(Backend::StaticProxy, prune_scope(cluster));

    let listeners = served_listeners(cluster);
    if listeners.is_empty() {
        return compiled;
    }

    let per_group = spec.envoy_config.envoy_per_broker_group;
    let (scopes, errors) = proxy_scopes(spec, per_group);
    compiled.errors.extend(errors);

    for scope in scopes.iter() {
        let routes = routes(cluster, &listeners, &scope.brokers, &mut compiled.errors);
        match compile_scope(cluster, scope, &routes) {
            Ok(objects) => {
                tracing::debug!(scope = %scope.scope, routes = routes.len(), "Compiled proxy scope");
                compiled.active.extend(objects);
            }
            Err(error) => {
                tracing::warn!(scope = %scope.scope, %error, "Skipping proxy scope");
                compiled.errors.push(error);
            }
        }
    }

    let live = scopes.iter().map(|s| &s.scope).collect::<BTreeSet<_>>();
    let unused = all_scopes(spec, !per_group)
        .into_iter()
        .chain(all_scopes(spec, per_group))
        .filter(|scope| !live.contains(scope));
    for scope in unused {
        compiled.inactive.extend(scope_keys(cluster, &scope));
    }
    if spec.envoy_config.bring_your_own_lb {
        for scope in live {
            compiled.inactive.push(ObjectKey::new(
                Kind::Service,
                cluster.namespace,
                naming::envoy_load_balancer_name(scope, cluster.name),
            ));
        }
    }

    compiled
}

/// Listeners exposed through Envoy.
pub fn served_listeners<'c>(cluster: &Cluster<'c>) -> Vec<&'c ExternalListener> {
    if cluster.spec.ingress_controller() != ENVOY_INGRESS_CONTROLLER {
        return vec![];
    }
    cluster
        .spec
        .listeners_config
        .external_listeners
        .iter()
        .filter(|l| l.access_method() == AccessMethod::LoadBalancer)
        .collect()
}

/// Builds the routes of a scope: one per broker and listener with a starting
/// port, in ascending broker order, followed by one anycast route per listener
/// with an anycast port.
///
/// Routes whose listen port is invalid or already taken are skipped and
/// reported.
pub fn routes(
    cluster: &Cluster<'_>,
    listeners: &[&ExternalListener],
    brokers: &[&Broker],
    errors: &mut Vec<Error>,
) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut taken = BTreeMap::<u16, String>::new();

    for broker in brokers.iter() {
        for listener in listeners.iter().filter(|l| l.uses_starting_port()) {
            let listen_port =
                match naming::per_broker_external_port(listener.external_starting_port, broker.id)
                {
                    Some(port) => port,
                    None => {
                        errors.push(Error::configuration(
                            format!("listener {}", listener.name),
                            format!("broker {} has no valid external port", broker.id),
                        ));
                        continue;
                    }
                };
            let upstream_port = match container_port(listener, errors) {
                Some(port) => port,
                None => continue,
            };
            let route = Route {
                name: format!("{}-broker-{}", listener.name, broker.id),
                port_name: format!("tcp-{}-{}", listener.name, broker.id),
                listen_port,
                stat_prefix: format!("broker_tcp-{}", broker.id),
                upstream_host: naming::broker_host(
                    cluster.name,
                    broker.id,
                    cluster.namespace,
                    cluster.domain(),
                ),
                upstream_port,
            };
            if claim_port(&mut taken, &route, listener, errors) {
                routes.push(route);
            }
        }
    }

    for listener in listeners.iter() {
        let any_cast_port = match listener.any_cast_port {
            Some(port) => port,
            None => continue,
        };
        let listen_port = match u16::try_from(any_cast_port).ok().filter(|p| *p != 0) {
            Some(port) => port,
            None => {
                errors.push(Error::configuration(
                    format!("listener {}", listener.name),
                    format!("invalid anycast port {any_cast_port}"),
                ));
                continue;
            }
        };
        let upstream_port = match container_port(listener, errors) {
            Some(port) => port,
            None => continue,
        };
        let route = Route {
            name: format!("{}-all-brokers", listener.name),
            port_name: format!("tcp-{}-all-broker", listener.name),
            listen_port,
            stat_prefix: "all_brokers_tcp".to_string(),
            upstream_host: naming::all_broker_host(cluster.name, cluster.namespace, cluster.domain()),
            upstream_port,
        };
        if claim_port(&mut taken, &route, listener, errors) {
            routes.push(route);
        }
    }

    routes
}

/// Renders the bootstrap config of a set of routes.
pub fn render_config(routes: &[Route]) -> Result<String, serde_yaml::Error> {
    Bootstrap::new(routes).to_yaml()
}

pub fn config_hash(config: &str) -> String {
    format!("{:x}", Sha256::digest(config.as_bytes()))
}

fn compile_scope(
    cluster: &Cluster<'_>,
    scope: &ProxyScope<'_>,
    routes: &[Route],
) -> Result<Vec<DesiredObject>, Error> {
    let config = render_config(routes).map_err(|error| Error::Compilation {
        scope: scope.scope.to_string(),
        artifact: CONFIG_KEY,
        source: error.into(),
    })?;
    let hash = config_hash(&config);

    let labels = scope_labels(cluster, &scope.scope);
    let config_name = naming::envoy_config_name(&scope.scope, cluster.name);

    let config_map = ConfigMap {
        metadata: cluster.object_meta(&config_name, labels.clone(), Default::default()),
        data: Some(labels::merge([(CONFIG_KEY, config)])),
        ..Default::default()
    };

    let deployment = Deployment {
        metadata: cluster.object_meta(
            naming::envoy_deployment_name(&scope.scope, cluster.name),
            labels.clone(),
            Default::default(),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(scope.config.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    annotations: Some(labels::merge([(CONFIG_HASH_ANNOTATION, hash)])),
                    ..Default::default()
                }),
                spec: Some(pod_spec(cluster, scope, &config_name, routes)),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    let load_balancer = Service {
        metadata: cluster.object_meta(
            naming::envoy_load_balancer_name(&scope.scope, cluster.name),
            labels.clone(),
            cluster.spec.envoy_config.annotations.clone(),
        ),
        spec: Some(ServiceSpec {
            type_: Some(AccessMethod::LoadBalancer.service_type().to_string()),
            selector: Some(labels),
            load_balancer_ip: cluster.spec.envoy_config.load_balancer_ip.clone(),
            ports: Some(
                routes
                    .iter()
                    .map(|route| ServicePort {
                        name: Some(route.port_name.clone()),
                        port: route.listen_port.into(),
                        target_port: Some(IntOrString::Int(route.listen_port.into())),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut objects = vec![config_map.into(), deployment.into()];
    if !cluster.spec.envoy_config.bring_your_own_lb {
        objects.push(load_balancer.into());
    }
    Ok(objects)
}

fn pod_spec(
    cluster: &Cluster<'_>,
    scope: &ProxyScope<'_>,
    config_name: &str,
    routes: &[Route],
) -> PodSpec {
    let envoy = &cluster.spec.envoy_config;

    let mut ports = routes
        .iter()
        .map(|route| ContainerPort {
            container_port: route.listen_port.into(),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    ports.push(ContainerPort {
        name: Some(ADMIN_PORT_NAME.to_string()),
        container_port: ADMIN_PORT.into(),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    });

    PodSpec {
        service_account_name: envoy.service_account_name.clone(),
        image_pull_secrets: Some(envoy.image_pull_secrets.clone()).filter(|s| !s.is_empty()),
        tolerations: Some(envoy.tolerations.clone()).filter(|t| !t.is_empty()),
        node_selector: scope.config.node_selector.clone(),
        affinity: scope.config.node_affinity.clone().map(|node_affinity| Affinity {
            node_affinity: Some(node_affinity),
            ..Default::default()
        }),
        containers: vec![Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(envoy.image().to_string()),
            ports: Some(ports),
            volume_mounts: Some(vec![VolumeMount {
                name: config_name.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            resources: envoy.resources.clone(),
            ..Default::default()
        }],
        volumes: Some(vec![Volume {
            name: config_name.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_name.to_string(),
                default_mode: Some(CONFIG_FILE_MODE),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn claim_port(
    taken: &mut BTreeMap<u16, String>,
    route: &Route,
    listener: &ExternalListener,
    errors: &mut Vec<Error>,
) -> bool {
    if let Some(other) = taken.get(&route.listen_port) {
        errors.push(Error::configuration(
            format!("listener {}", listener.name),
            format!(
                "port {} of {} is already used by {other}",
                route.listen_port, route.name
            ),
        ));
        return false;
    }
    taken.insert(route.listen_port, route.name.clone());
    true
}

fn container_port(listener: &ExternalListener, errors: &mut Vec<Error>) -> Option<u16> {
    let port = u16::try_from(listener.container_port)
        .ok()
        .filter(|p| *p != 0);
    if port.is_none() {
        errors.push(Error::configuration(
            format!("listener {}", listener.name),
            format!("invalid container port {}", listener.container_port),
        ));
    }
    port
}

fn scope_labels(cluster: &Cluster<'_>, scope: &Scope) -> labels::Map {
    labels::merge([
        (labels::APP_KEY, labels::ENVOY_APP),
        (labels::CLUSTER_KEY, cluster.name),
        (labels::ENVOY_SCOPE_KEY, scope.id()),
    ])
}

fn scope_keys(cluster: &Cluster<'_>, scope: &Scope) -> [ObjectKey; 3] {
    [
        ObjectKey::new(
            Kind::ConfigMap,
            cluster.namespace,
            naming::envoy_config_name(scope, cluster.name),
        ),
        ObjectKey::new(
            Kind::Deployment,
            cluster.namespace,
            naming::envoy_deployment_name(scope, cluster.name),
        ),
        ObjectKey::new(
            Kind::Service,
            cluster.namespace,
            naming::envoy_load_balancer_name(scope, cluster.name),
        ),
    ]
}

fn prune_scope(cluster: &Cluster<'_>) -> PruneScope {
    PruneScope {
        kinds: KINDS,
        selector: Selector::from_map(labels::merge([
            (labels::APP_KEY, labels::ENVOY_APP),
            (labels::CLUSTER_KEY, cluster.name),
        ])),
        listener: None,
        remove_unused: cluster.spec.remove_unused_ingress_resources,
    }
}

#[cfg(test)]
mod tests;
