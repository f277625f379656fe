//! The subset of Envoy's v3 bootstrap config needed to proxy TCP to brokers.
//!
//! Field order is the serialization order, so the rendered document only
//! changes when its routes do.

use super::Route;
use serde::Serialize;

pub(super) const ADMIN_PORT: u16 = 9901;
const ANY_ADDRESS: &str = "0.0.0.0";
const TCP_PROXY_FILTER: &str = "envoy.filters.network.tcp_proxy";
const TCP_PROXY_TYPE: &str = "type.googleapis.com/envoy.extensions.filters.network.tcp_proxy.v3.TcpProxy";
const CONNECT_TIMEOUT: &str = "1s";

#[derive(Debug, Serialize)]
pub(super) struct Bootstrap {
    admin: Admin,
    static_resources: StaticResources,
}

#[derive(Debug, Serialize)]
struct Admin {
    address: Address,
}

#[derive(Debug, Serialize)]
struct Address {
    socket_address: SocketAddress,
}

#[derive(Debug, Serialize)]
struct SocketAddress {
    address: String,
    port_value: u16,
}

#[derive(Debug, Serialize)]
struct StaticResources {
    listeners: Vec<Listener>,
    clusters: Vec<UpstreamCluster>,
}

#[derive(Debug, Serialize)]
struct Listener {
    name: String,
    address: Address,
    filter_chains: Vec<FilterChain>,
}

#[derive(Debug, Serialize)]
struct FilterChain {
    filters: Vec<Filter>,
}

#[derive(Debug, Serialize)]
struct Filter {
    name: &'static str,
    typed_config: TcpProxy,
}

#[derive(Debug, Serialize)]
struct TcpProxy {
    #[serde(rename = "@type")]
    type_url: &'static str,
    stat_prefix: String,
    cluster: String,
}

#[derive(Debug, Serialize)]
struct UpstreamCluster {
    name: String,
    connect_timeout: &'static str,
    #[serde(rename = "type")]
    discovery_type: DiscoveryType,
    lb_policy: LbPolicy,
    load_assignment: LoadAssignment,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum DiscoveryType {
    StrictDns,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum LbPolicy {
    RoundRobin,
}

#[derive(Debug, Serialize)]
struct LoadAssignment {
    cluster_name: String,
    endpoints: Vec<LocalityEndpoints>,
}

#[derive(Debug, Serialize)]
struct LocalityEndpoints {
    lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Debug, Serialize)]
struct LbEndpoint {
    endpoint: Endpoint,
}

#[derive(Debug, Serialize)]
struct Endpoint {
    address: Address,
}

// === impl Bootstrap ===

impl Bootstrap {
    pub(super) fn new(routes: &[Route]) -> Self {
        let listeners = routes
            .iter()
            .map(|route| Listener {
                name: route.name.clone(),
                address: Address::new(ANY_ADDRESS, route.listen_port),
                filter_chains: vec![FilterChain {
                    filters: vec![Filter {
                        name: TCP_PROXY_FILTER,
                        typed_config: TcpProxy {
                            type_url: TCP_PROXY_TYPE,
                            stat_prefix: route.stat_prefix.clone(),
                            cluster: route.name.clone(),
                        },
                    }],
                }],
            })
            .collect();

        let clusters = routes
            .iter()
            .map(|route| UpstreamCluster {
                name: route.name.clone(),
                connect_timeout: CONNECT_TIMEOUT,
                discovery_type: DiscoveryType::StrictDns,
                lb_policy: LbPolicy::RoundRobin,
                load_assignment: LoadAssignment {
                    cluster_name: route.name.clone(),
                    endpoints: vec![LocalityEndpoints {
                        lb_endpoints: vec![LbEndpoint {
                            endpoint: Endpoint {
                                address: Address::new(&route.upstream_host, route.upstream_port),
                            },
                        }],
                    }],
                },
            })
            .collect();

        Self {
            admin: Admin {
                address: Address::new(ANY_ADDRESS, ADMIN_PORT),
            },
            static_resources: StaticResources {
                listeners,
                clusters,
            },
        }
    }

    pub(super) fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl Address {
    fn new(address: &str, port_value: u16) -> Self {
        Self {
            socket_address: SocketAddress {
                address: address.to_string(),
                port_value,
            },
        }
    }
}
