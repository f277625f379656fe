use super::*;
use kafka_access_controller_k8s_api::{
    BrokerConfig, ContourIngressConfig, IngressConfig, KafkaCluster, KafkaClusterSpec,
    ListenerIngressConfig,
};
use maplit::btreemap;
use pretty_assertions::assert_eq;

fn mk_cluster(spec: KafkaClusterSpec) -> KafkaCluster {
    let mut cluster = KafkaCluster::new("kafka", spec);
    cluster.metadata.namespace = Some("kafka-ns".to_string());
    cluster
}

fn mk_broker(id: i32, mapping: &[&str]) -> Broker {
    Broker {
        id,
        broker_config_group: None,
        broker_config: Some(BrokerConfig {
            broker_ingress_mapping: mapping.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }),
    }
}

fn mk_ingress(hostname: &str, template: &str) -> IngressConfig {
    IngressConfig {
        hostname_override: Some(hostname.to_string()).filter(|h| !h.is_empty()),
        service_annotations: Default::default(),
        contour_ingress_config: Some(ContourIngressConfig {
            tls_secret_name: Some("kafka-tls".to_string()),
            broker_fqdn_template: template.to_string(),
        }),
    }
}

fn mk_spec(brokers: Vec<Broker>) -> KafkaClusterSpec {
    let mut spec = KafkaClusterSpec {
        brokers,
        ingress_controller: Some("contour".to_string()),
        ..Default::default()
    };
    spec.listeners_config.external_listeners.push(ExternalListener {
        name: "external".to_string(),
        container_port: 9094,
        external_starting_port: -1,
        access_method: Some(AccessMethod::ClusterIp),
        any_cast_port: Some(8443),
        config: Some(ListenerIngressConfig {
            default_ingress_config: String::new(),
            ingress_config: btreemap! {
                "ingress1".to_string() => mk_ingress(
                    "kafka.cluster.local",
                    "broker-%d.kafka.cluster.local",
                ),
                "ingress2".to_string() => mk_ingress(
                    "kafka2.cluster.local",
                    "b%d.kafka2.cluster.local",
                ),
            },
        }),
        ..Default::default()
    });
    spec
}

fn compile_one(spec: KafkaClusterSpec) -> Compiled {
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let mut units = compile(&cluster);
    assert_eq!(units.len(), 1);
    units.remove(0)
}

fn services(compiled: &Compiled) -> Vec<&Service> {
    compiled
        .active
        .iter()
        .filter_map(|o| match o {
            DesiredObject::Service(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn proxies(compiled: &Compiled) -> Vec<&HttpProxy> {
    compiled
        .active
        .iter()
        .filter_map(|o| match o {
            DesiredObject::HttpProxy(p) => Some(p),
            _ => None,
        })
        .collect()
}

fn fqdn(proxy: &HttpProxy) -> &str {
    proxy
        .spec
        .virtualhost
        .as_ref()
        .map(|v| v.fqdn.as_str())
        .unwrap_or_default()
}

fn backend(proxy: &HttpProxy) -> (&str, i32) {
    let service = &proxy.spec.tcpproxy.as_ref().unwrap().services[0];
    (service.name.as_str(), service.port)
}

#[test]
fn shared_override_with_two_brokers() {
    let compiled = compile_one(mk_spec(vec![
        mk_broker(0, &["ingress1"]),
        mk_broker(1, &["ingress1"]),
    ]));
    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);

    let services = services(&compiled);
    assert_eq!(
        services
            .iter()
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect::<Vec<_>>(),
        vec!["external-ingress1-kafka", "kafka-0-external", "kafka-1-external"]
    );

    let shared = services[0].spec.as_ref().unwrap();
    assert_eq!(shared.type_.as_deref(), Some("ClusterIP"));
    assert_eq!(
        shared.selector,
        Some(btreemap! {
            "app".to_string() => "kafka".to_string(),
            "kafka_cr".to_string() => "kafka".to_string(),
        })
    );
    let port = &shared.ports.as_ref().unwrap()[0];
    assert_eq!(port.name.as_deref(), Some(SHARED_PORT_NAME));
    assert_eq!(port.port, 8443);
    assert_eq!(port.target_port, Some(IntOrString::Int(9094)));

    for (service, id) in services[1..].iter().zip(["0", "1"]) {
        let spec = service.spec.as_ref().unwrap();
        let port = &spec.ports.as_ref().unwrap()[0];
        assert_eq!(port.name, Some(format!("broker-{id}")));
        assert_eq!(port.port, 8443);
        assert_eq!(
            spec.selector.as_ref().unwrap().get("brokerId").map(String::as_str),
            Some(id)
        );
        assert_eq!(
            service
                .metadata
                .labels
                .as_ref()
                .unwrap()
                .get("eListenerName")
                .map(String::as_str),
            Some("external")
        );
    }

    let proxies = proxies(&compiled);
    assert_eq!(
        proxies.iter().map(|p| fqdn(p)).collect::<Vec<_>>(),
        vec![
            "kafka.cluster.local",
            "broker-0.kafka.cluster.local",
            "broker-1.kafka.cluster.local",
        ]
    );
    assert_eq!(backend(proxies[0]), ("external-ingress1-kafka", 8443));
    assert_eq!(backend(proxies[1]), ("kafka-0-external", 8443));
    assert_eq!(backend(proxies[2]), ("kafka-1-external", 8443));
    assert_eq!(
        proxies[0]
            .spec
            .virtualhost
            .as_ref()
            .and_then(|v| v.tls.as_ref())
            .and_then(|t| t.secret_name.as_deref()),
        Some("kafka-tls")
    );
    assert_eq!(proxies[0].metadata.name.as_deref(), Some("kafka.cluster.local"));
}

#[test]
fn broker_switches_override() {
    let compiled = compile_one(mk_spec(vec![
        mk_broker(0, &["ingress2"]),
        mk_broker(1, &["ingress1"]),
    ]));
    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);

    assert_eq!(
        proxies(&compiled)
            .iter()
            .map(|p| fqdn(p))
            .collect::<Vec<_>>(),
        vec![
            "kafka.cluster.local",
            "broker-1.kafka.cluster.local",
            "kafka2.cluster.local",
            "b0.kafka2.cluster.local",
        ]
    );
    assert_eq!(
        services(&compiled)
            .iter()
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect::<Vec<_>>(),
        vec![
            "external-ingress1-kafka",
            "external-ingress2-kafka",
            "kafka-0-external",
            "kafka-1-external",
        ]
    );
}

#[test]
fn unused_override_compiles_nothing() {
    let compiled = compile_one(mk_spec(vec![
        mk_broker(0, &["ingress2"]),
        mk_broker(1, &["ingress2"]),
    ]));
    assert!(compiled
        .active
        .iter()
        .all(|o| !o.name().contains("ingress1") && o.name() != "kafka.cluster.local"));
    assert_eq!(services(&compiled).len(), 3);
    assert_eq!(proxies(&compiled).len(), 3);
}

#[test]
fn default_override_applies_to_unmapped_brokers() {
    let mut spec = mk_spec(vec![mk_broker(0, &[]), mk_broker(1, &["ingress2"])]);
    spec.listeners_config.external_listeners[0]
        .config
        .as_mut()
        .unwrap()
        .default_ingress_config = "ingress1".to_string();
    let compiled = compile_one(spec);

    assert_eq!(
        proxies(&compiled)
            .iter()
            .map(|p| fqdn(p))
            .collect::<Vec<_>>(),
        vec![
            "kafka.cluster.local",
            "broker-0.kafka.cluster.local",
            "kafka2.cluster.local",
            "b1.kafka2.cluster.local",
        ]
    );
}

#[test]
fn empty_hostname_skips_override() {
    let mut spec = mk_spec(vec![mk_broker(0, &["ingress1"]), mk_broker(1, &["ingress2"])]);
    spec.listeners_config.external_listeners[0]
        .config
        .as_mut()
        .unwrap()
        .ingress_config
        .insert("ingress1".to_string(), mk_ingress("", "broker-%d.kafka.cluster.local"));
    let compiled = compile_one(spec);

    assert_eq!(compiled.errors.len(), 1);
    assert!(matches!(
        &compiled.errors[0],
        Error::Invariant { ingress_config, .. } if ingress_config == "ingress1"
    ));
    assert_eq!(
        proxies(&compiled)
            .iter()
            .map(|p| fqdn(p))
            .collect::<Vec<_>>(),
        vec!["kafka2.cluster.local", "b1.kafka2.cluster.local"]
    );
    assert_eq!(
        services(&compiled)
            .iter()
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect::<Vec<_>>(),
        vec!["external-ingress2-kafka", "kafka-0-external", "kafka-1-external"]
    );
}

#[test]
fn listener_hostname_is_inherited() {
    let mut spec = mk_spec(vec![mk_broker(0, &["ingress1"])]);
    let listener = &mut spec.listeners_config.external_listeners[0];
    listener.hostname_override = Some("listener.cluster.local".to_string());
    listener
        .config
        .as_mut()
        .unwrap()
        .ingress_config
        .insert("ingress1".to_string(), mk_ingress("", "broker-%d.kafka.cluster.local"));
    let compiled = compile_one(spec);

    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);
    assert_eq!(fqdn(proxies(&compiled)[0]), "listener.cluster.local");
}

#[test]
fn listener_without_ingress_configs_exposes_every_broker() {
    let mut spec = mk_spec(vec![mk_broker(0, &[]), mk_broker(1, &[])]);
    let listener = &mut spec.listeners_config.external_listeners[0];
    listener.config = None;
    listener.hostname_override = Some("kafka.cluster.local".to_string());
    let compiled = compile_one(spec);

    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);
    assert_eq!(
        services(&compiled)
            .iter()
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect::<Vec<_>>(),
        vec!["external-external-kafka", "kafka-0-external", "kafka-1-external"]
    );
    let proxies = proxies(&compiled);
    assert_eq!(
        proxies.iter().map(|p| fqdn(p)).collect::<Vec<_>>(),
        vec!["kafka.cluster.local"]
    );
    assert_eq!(backend(proxies[0]), ("external-external-kafka", 8443));
}

#[test]
fn brokers_outside_every_override_keep_their_service() {
    let compiled = compile_one(mk_spec(vec![
        mk_broker(0, &["ingress1"]),
        mk_broker(1, &["external"]),
    ]));
    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);
    assert_eq!(
        services(&compiled)
            .iter()
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect::<Vec<_>>(),
        vec!["external-ingress1-kafka", "kafka-0-external", "kafka-1-external"]
    );
    assert_eq!(
        proxies(&compiled)
            .iter()
            .map(|p| fqdn(p))
            .collect::<Vec<_>>(),
        vec!["kafka.cluster.local", "broker-0.kafka.cluster.local"]
    );
}

#[test]
fn missing_anycast_port() {
    let mut spec = mk_spec(vec![mk_broker(0, &["ingress1"])]);
    spec.listeners_config.external_listeners[0].any_cast_port = None;
    let compiled = compile_one(spec);

    assert!(compiled.active.is_empty());
    assert_eq!(compiled.errors.len(), 1);
    assert!(compiled.errors[0].is_scoped());
}

#[test]
fn unresolved_mapping_blocks_listener() {
    let compiled = compile_one(mk_spec(vec![mk_broker(0, &["ingress3"])]));
    assert!(compiled.active.is_empty());
    assert!(matches!(compiled.errors[..], [Error::Configuration { .. }]));
}

#[test]
fn unserved_listeners_keep_prune_scope() {
    let mut spec = mk_spec(vec![mk_broker(0, &["ingress1"])]);
    spec.ingress_controller = None;
    spec.remove_unused_ingress_resources = true;
    let compiled = compile_one(spec);

    assert!(compiled.active.is_empty());
    assert!(compiled.errors.is_empty());
    assert_eq!(
        compiled.prune,
        PruneScope {
            kinds: &[Kind::Service, Kind::HttpProxy],
            selector: Selector::from_map(btreemap! {
                "app".to_string() => "contouringress".to_string(),
                "kafka_cr".to_string() => "kafka".to_string(),
            }),
            listener: Some("external".to_string()),
            remove_unused: true,
        }
    );
}

#[test]
fn compilation_is_deterministic() {
    let spec = mk_spec(vec![mk_broker(1, &["ingress1"]), mk_broker(0, &["ingress1"])]);
    let first = compile_one(spec.clone());
    let second = compile_one(spec);
    assert_eq!(first.active, second.active);
}
