use super::*;
use kafka_access_controller_k8s_api::{BrokerConfig, KafkaCluster, KafkaClusterSpec};
use pretty_assertions::assert_eq;

fn mk_cluster(spec: KafkaClusterSpec) -> KafkaCluster {
    let mut cluster = KafkaCluster::new("kafka", spec);
    cluster.metadata.namespace = Some("kafka-ns".to_string());
    cluster
}

fn mk_listener(name: &str, starting_port: i32, any_cast_port: Option<i32>) -> ExternalListener {
    ExternalListener {
        name: name.to_string(),
        container_port: 9094,
        external_starting_port: starting_port,
        access_method: Some(AccessMethod::LoadBalancer),
        any_cast_port,
        ..Default::default()
    }
}

fn mk_broker(id: i32, group: Option<&str>) -> Broker {
    Broker {
        id,
        broker_config_group: group.map(ToString::to_string),
        broker_config: None,
    }
}

fn mk_spec(brokers: Vec<Broker>, listeners: Vec<ExternalListener>) -> KafkaClusterSpec {
    let mut spec = KafkaClusterSpec {
        brokers,
        ..Default::default()
    };
    spec.listeners_config.external_listeners = listeners;
    spec
}

fn names(compiled: &Compiled) -> Vec<(Kind, String)> {
    compiled
        .active
        .iter()
        .map(|o| (o.kind(), o.name().to_string()))
        .collect()
}

fn config_of(compiled: &Compiled, name: &str) -> String {
    compiled
        .active
        .iter()
        .find_map(|o| match o {
            DesiredObject::ConfigMap(cm) if o.name() == name => {
                cm.data.as_ref().and_then(|d| d.get(CONFIG_KEY)).cloned()
            }
            _ => None,
        })
        .expect("config map must be compiled")
}

fn hash_of(compiled: &Compiled, name: &str) -> String {
    compiled
        .active
        .iter()
        .find_map(|o| match o {
            DesiredObject::Deployment(d) if o.name() == name => d
                .spec
                .as_ref()
                .and_then(|s| s.template.metadata.as_ref())
                .and_then(|m| m.annotations.as_ref())
                .and_then(|a| a.get(CONFIG_HASH_ANNOTATION))
                .cloned(),
            _ => None,
        })
        .expect("deployment must be compiled")
}

#[test]
fn global_scope() {
    let resource = mk_cluster(mk_spec(
        vec![mk_broker(1, None), mk_broker(0, None)],
        vec![mk_listener("external", 19090, Some(29092))],
    ));
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);
    assert_eq!(
        names(&compiled),
        vec![
            (Kind::ConfigMap, "envoy-config-kafka".to_string()),
            (Kind::Deployment, "envoy-kafka".to_string()),
            (Kind::Service, "envoy-loadbalancer-kafka".to_string()),
        ]
    );
    assert!(compiled.inactive.is_empty());

    let config = config_of(&compiled, "envoy-config-kafka");
    assert_eq!(hash_of(&compiled, "envoy-kafka"), config_hash(&config));
    for expected in [
        "port_value: 19090",
        "port_value: 19091",
        "port_value: 29092",
        "stat_prefix: broker_tcp-0",
        "type: STRICT_DNS",
        "lb_policy: ROUND_ROBIN",
        "connect_timeout: 1s",
        "address: kafka-1.kafka-headless.kafka-ns.svc.cluster.local",
        "address: kafka-all-broker.kafka-ns.svc.cluster.local",
    ] {
        assert!(config.contains(expected), "missing {expected:?} in\n{config}");
    }
    let broker0 = config.find("external-broker-0").unwrap();
    let broker1 = config.find("external-broker-1").unwrap();
    assert!(broker0 < broker1, "routes must be ordered by broker id");
}

#[test]
fn routes_are_ordered_by_broker_then_listener() {
    let resource = mk_cluster(KafkaClusterSpec::default());
    let cluster = Cluster::from_resource(&resource).unwrap();
    let listeners = [
        mk_listener("a", 19090, None),
        mk_listener("b", 29090, Some(39090)),
    ];
    let brokers = [mk_broker(0, None), mk_broker(1, None)];

    let mut errors = vec![];
    let routes = routes(
        &cluster,
        &listeners.iter().collect::<Vec<_>>(),
        &brokers.iter().collect::<Vec<_>>(),
        &mut errors,
    );
    assert!(errors.is_empty());
    assert_eq!(
        routes
            .iter()
            .map(|r| (r.name.as_str(), r.port_name.as_str(), r.listen_port))
            .collect::<Vec<_>>(),
        vec![
            ("a-broker-0", "tcp-a-0", 19090),
            ("b-broker-0", "tcp-b-0", 29090),
            ("a-broker-1", "tcp-a-1", 19091),
            ("b-broker-1", "tcp-b-1", 29091),
            ("b-all-brokers", "tcp-b-all-broker", 39090),
        ]
    );
    assert!(routes.iter().all(|r| r.upstream_port == 9094));
}

#[test]
fn colliding_ports_are_skipped() {
    let resource = mk_cluster(KafkaClusterSpec::default());
    let cluster = Cluster::from_resource(&resource).unwrap();
    let listeners = [mk_listener("a", 19090, None), mk_listener("b", 19091, None)];
    let brokers = [mk_broker(0, None), mk_broker(1, None)];

    let mut errors = vec![];
    let routes = routes(
        &cluster,
        &listeners.iter().collect::<Vec<_>>(),
        &brokers.iter().collect::<Vec<_>>(),
        &mut errors,
    );
    assert_eq!(
        routes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["a-broker-0", "b-broker-0", "b-broker-1"]
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("a-broker-1"), "{}", errors[0]);
}

#[test]
fn listeners_without_starting_port_only_get_anycast() {
    let resource = mk_cluster(KafkaClusterSpec::default());
    let cluster = Cluster::from_resource(&resource).unwrap();
    let listeners = [mk_listener("a", -1, Some(29092))];
    let brokers = [mk_broker(0, None)];

    let mut errors = vec![];
    let routes = routes(
        &cluster,
        &listeners.iter().collect::<Vec<_>>(),
        &brokers.iter().collect::<Vec<_>>(),
        &mut errors,
    );
    assert!(errors.is_empty());
    assert_eq!(
        routes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["a-all-brokers"]
    );
}

#[test]
fn hash_tracks_config_changes() {
    let compile_hash = |spec: KafkaClusterSpec| {
        let resource = mk_cluster(spec);
        let cluster = Cluster::from_resource(&resource).unwrap();
        hash_of(&compile(&cluster), "envoy-kafka")
    };
    let base = || {
        mk_spec(
            vec![mk_broker(0, None), mk_broker(1, None)],
            vec![mk_listener("external", 19090, None)],
        )
    };

    assert_eq!(compile_hash(base()), compile_hash(base()));

    let mut moved = base();
    moved.listeners_config.external_listeners[0].external_starting_port = 19190;
    assert_ne!(compile_hash(base()), compile_hash(moved));

    let mut grown = base();
    grown.brokers.push(mk_broker(2, None));
    assert_ne!(compile_hash(base()), compile_hash(grown));

    // Settings outside of the config document do not roll the pods.
    let mut scaled = base();
    scaled.envoy_config.replicas = Some(3);
    assert_eq!(compile_hash(base()), compile_hash(scaled));
}

#[test]
fn per_group_scopes() {
    let mut spec = mk_spec(
        vec![
            mk_broker(0, Some("a")),
            mk_broker(1, Some("b")),
            mk_broker(2, Some("b")),
        ],
        vec![mk_listener("external", 19090, None)],
    );
    spec.envoy_config.envoy_per_broker_group = true;
    for group in ["a", "b", "empty"] {
        spec.broker_config_groups
            .insert(group.to_string(), BrokerConfig::default());
    }
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    assert!(compiled.errors.is_empty(), "{:?}", compiled.errors);
    assert_eq!(
        names(&compiled),
        vec![
            (Kind::ConfigMap, "envoy-config-a-kafka".to_string()),
            (Kind::Deployment, "envoy-a-kafka".to_string()),
            (Kind::Service, "envoy-loadbalancer-a-kafka".to_string()),
            (Kind::ConfigMap, "envoy-config-b-kafka".to_string()),
            (Kind::Deployment, "envoy-b-kafka".to_string()),
            (Kind::Service, "envoy-loadbalancer-b-kafka".to_string()),
        ]
    );
    assert!(config_of(&compiled, "envoy-config-a-kafka").contains("external-broker-0"));
    assert!(!config_of(&compiled, "envoy-config-a-kafka").contains("external-broker-1"));

    let inactive = compiled
        .inactive
        .iter()
        .map(|k| k.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        inactive,
        vec![
            "envoy-config-kafka",
            "envoy-kafka",
            "envoy-loadbalancer-kafka",
            "envoy-config-empty-kafka",
            "envoy-empty-kafka",
            "envoy-loadbalancer-empty-kafka",
        ]
    );
    for key in compiled.inactive.iter() {
        assert!(!compiled.is_active(key), "{key} is both active and inactive");
    }
}

#[test]
fn global_scope_marks_groups_inactive() {
    let mut spec = mk_spec(
        vec![mk_broker(0, Some("a"))],
        vec![mk_listener("external", 19090, None)],
    );
    spec.broker_config_groups
        .insert("a".to_string(), BrokerConfig::default());
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    assert_eq!(
        compiled
            .inactive
            .iter()
            .map(|k| (k.kind, k.name.as_str()))
            .collect::<Vec<_>>(),
        vec![
            (Kind::ConfigMap, "envoy-config-a-kafka"),
            (Kind::Deployment, "envoy-a-kafka"),
            (Kind::Service, "envoy-loadbalancer-a-kafka"),
        ]
    );
}

#[test]
fn bring_your_own_load_balancer() {
    let mut spec = mk_spec(
        vec![mk_broker(0, None)],
        vec![mk_listener("external", 19090, None)],
    );
    spec.envoy_config.bring_your_own_lb = true;
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    assert_eq!(
        names(&compiled),
        vec![
            (Kind::ConfigMap, "envoy-config-kafka".to_string()),
            (Kind::Deployment, "envoy-kafka".to_string()),
        ]
    );
    assert_eq!(
        compiled.inactive,
        vec![ObjectKey::new(
            Kind::Service,
            "kafka-ns",
            "envoy-loadbalancer-kafka"
        )]
    );
}

#[test]
fn deployment_uses_scope_settings() {
    let mut spec = mk_spec(
        vec![mk_broker(0, None)],
        vec![mk_listener("external", 19090, None)],
    );
    spec.envoy_config.replicas = Some(2);
    spec.envoy_config.image = Some("envoy:test".to_string());
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    let deployment = compiled
        .active
        .iter()
        .find_map(|o| match o {
            DesiredObject::Deployment(d) => Some(d),
            _ => None,
        })
        .unwrap();
    let spec = deployment.spec.as_ref().unwrap();
    assert_eq!(spec.replicas, Some(2));

    let pod = spec.template.spec.as_ref().unwrap();
    let container = &pod.containers[0];
    assert_eq!(container.image.as_deref(), Some("envoy:test"));
    assert_eq!(
        container
            .ports
            .iter()
            .flatten()
            .map(|p| (p.name.as_deref(), p.container_port))
            .collect::<Vec<_>>(),
        vec![(None, 19090), (Some("envoy-admin"), 9901)]
    );
    assert_eq!(
        container.volume_mounts.as_ref().unwrap()[0].mount_path,
        "/etc/envoy"
    );
    assert_eq!(
        pod.volumes.as_ref().unwrap()[0]
            .config_map
            .as_ref()
            .map(|c| c.name.as_str()),
        Some("envoy-config-kafka")
    );

    let labels = deployment.metadata.labels.as_ref().unwrap();
    assert_eq!(labels.get("app").map(String::as_str), Some("envoyingress"));
    assert_eq!(labels.get("envoyScope").map(String::as_str), Some("envoy-global"));
}

#[test]
fn unserved_cluster_compiles_nothing() {
    let mut spec = mk_spec(
        vec![mk_broker(0, None)],
        vec![mk_listener("external", 19090, None)],
    );
    spec.ingress_controller = Some("contour".to_string());
    spec.remove_unused_ingress_resources = true;
    let resource = mk_cluster(spec);
    let cluster = Cluster::from_resource(&resource).unwrap();
    let compiled = compile(&cluster);

    assert!(compiled.active.is_empty());
    assert!(compiled.inactive.is_empty());
    assert!(compiled.prune.remove_unused);
    assert_eq!(
        compiled.prune.selector.to_string(),
        "app=envoyingress,kafka_cr=kafka"
    );
}

#[test]
fn cluster_ip_listeners_are_not_served() {
    let mut listener = mk_listener("external", 19090, None);
    listener.access_method = Some(AccessMethod::ClusterIp);
    let resource = mk_cluster(mk_spec(vec![mk_broker(0, None)], vec![listener]));
    let cluster = Cluster::from_resource(&resource).unwrap();
    assert!(served_listeners(&cluster).is_empty());
}
