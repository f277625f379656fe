#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Compiles a cluster's external access configuration into the objects each
//! ingress backend needs.

mod cluster;
pub mod contour;
pub mod envoy;
mod object;

pub use self::{
    cluster::Cluster,
    object::{DesiredObject, Kind, ObjectKey},
};
use kafka_access_controller_core::Error;
use kafka_access_controller_k8s_api::Selector;
use std::fmt;

/// An ingress backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Envoy deployments with a generated static bootstrap config.
    StaticProxy,
    /// Contour `HTTPProxy` routes in front of per-broker services.
    RoutingCrd,
}

/// The objects a backend wants for one reconcile unit, i.e. the whole cluster
/// for the static proxy or a single listener for routing CRDs.
#[derive(Debug)]
pub struct Compiled {
    pub backend: Backend,

    /// Objects to create or update.
    pub active: Vec<DesiredObject>,

    /// Objects of a topology that is not currently active. They are deleted
    /// whether or not unused resources are otherwise removed.
    pub inactive: Vec<ObjectKey>,

    pub prune: PruneScope,

    /// Errors scoped to part of the unit. The remainder was still compiled.
    pub errors: Vec<Error>,
}

/// Identifies the live objects a unit is responsible for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PruneScope {
    pub kinds: &'static [Kind],
    pub selector: Selector,

    /// When set, only objects labeled with this listener are considered.
    pub listener: Option<String>,

    /// Live objects that are neither active nor inactive are deleted only
    /// when this is set.
    pub remove_unused: bool,
}

// === impl Backend ===

impl Backend {
    pub const ALL: [Self; 2] = [Self::StaticProxy, Self::RoutingCrd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticProxy => "envoy",
            Self::RoutingCrd => "contour",
        }
    }

    /// Compiles every unit of this backend, whether or not the backend
    /// currently serves any listener. Units that are not served have no
    /// active objects so that their leftovers may be pruned.
    pub fn compile(&self, cluster: &Cluster<'_>) -> Vec<Compiled> {
        match self {
            Self::StaticProxy => vec![envoy::compile(cluster)],
            Self::RoutingCrd => contour::compile(cluster),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Compiled ===

impl Compiled {
    fn empty(backend: Backend, prune: PruneScope) -> Self {
        Self {
            backend,
            active: vec![],
            inactive: vec![],
            prune,
            errors: vec![],
        }
    }

    pub fn is_active(&self, key: &ObjectKey) -> bool {
        self.active.iter().any(|o| o.key() == *key)
    }

    pub fn is_inactive(&self, key: &ObjectKey) -> bool {
        self.inactive.contains(key)
    }
}
