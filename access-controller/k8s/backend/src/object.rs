use kafka_access_controller_k8s_api::{
    ConfigMap, Deployment, HttpProxy, ObjectMeta, OwnerReference, Service,
};
use std::fmt;

/// The kinds of objects the backends produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    ConfigMap,
    Deployment,
    Service,
    HttpProxy,
}

/// An object computed for the current pass.
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredObject {
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Service(Service),
    HttpProxy(HttpProxy),
}

/// Identifies an object within a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

// === impl Kind ===

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMap => "ConfigMap",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::HttpProxy => "HTTPProxy",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl DesiredObject ===

impl DesiredObject {
    pub fn kind(&self) -> Kind {
        match self {
            Self::ConfigMap(_) => Kind::ConfigMap,
            Self::Deployment(_) => Kind::Deployment,
            Self::Service(_) => Kind::Service,
            Self::HttpProxy(_) => Kind::HttpProxy,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::ConfigMap(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::HttpProxy(o) => &o.metadata,
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::ConfigMap(o) => &mut o.metadata,
            Self::Deployment(o) => &mut o.metadata,
            Self::Service(o) => &mut o.metadata,
            Self::HttpProxy(o) => &mut o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind(),
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
        }
    }

    /// Sets `owner` as the object's only owner.
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.meta_mut().owner_references = Some(vec![owner]);
        self
    }
}

impl From<ConfigMap> for DesiredObject {
    fn from(o: ConfigMap) -> Self {
        Self::ConfigMap(o)
    }
}

impl From<Deployment> for DesiredObject {
    fn from(o: Deployment) -> Self {
        Self::Deployment(o)
    }
}

impl From<Service> for DesiredObject {
    fn from(o: Service) -> Self {
        Self::Service(o)
    }
}

impl From<HttpProxy> for DesiredObject {
    fn from(o: HttpProxy) -> Self {
        Self::HttpProxy(o)
    }
}

// === impl ObjectKey ===

impl ObjectKey {
    pub fn new(kind: Kind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}
