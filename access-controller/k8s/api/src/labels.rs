use std::{collections::BTreeMap, fmt, sync::Arc};

/// Identifies the component that owns an object.
pub const APP_KEY: &str = "app";
/// Identifies the `KafkaCluster` an object belongs to.
pub const CLUSTER_KEY: &str = "kafka_cr";
pub const BROKER_ID_KEY: &str = "brokerId";
pub const LISTENER_KEY: &str = "eListenerName";
/// Distinguishes the Envoy workloads of different scopes.
pub const ENVOY_SCOPE_KEY: &str = "envoyScope";

/// The component identity carried by broker pods.
pub const KAFKA_APP: &str = "kafka";
pub const ENVOY_APP: &str = "envoyingress";
pub const CONTOUR_APP: &str = "contouringress";

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// Selects objects by exact label matches.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Map,
}

/// Builds a label map from string pairs. Later pairs override earlier ones.
pub fn merge<I, K, V>(pairs: I) -> Map
where
    I: IntoIterator<Item = (K, V)>,
    K: ToString,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Labels carried by the broker pods of a cluster.
pub fn kafka(cluster: &str) -> Map {
    merge([(APP_KEY, KAFKA_APP), (CLUSTER_KEY, cluster)])
}

// === Selector ===

impl Selector {
    pub fn from_map(match_labels: Map) -> Self {
        Self { match_labels }
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.0.get(k) == Some(v))
    }

    pub fn as_map(&self) -> &Map {
        &self.match_labels
    }
}

/// Formats the selector in the `k=v,k=v` form used by list requests.
impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in self.match_labels.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(merge(iter))
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from(merge(iter))
    }
}
