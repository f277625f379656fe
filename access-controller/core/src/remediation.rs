//! Pausing and resuming autonomous remediation around disruptive changes.

use kafka_access_controller_k8s_api::KafkaClusterSpec;
use std::{collections::HashMap, fmt};

const SELF_HEALING_ENABLED: &str = "self.healing.enabled";
const TRUE_VALUES: [&str; 4] = ["1", "true", "yes", "on"];

/// Anomaly categories the remediation service can heal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnomalyType {
    BrokerFailure,
    DiskFailure,
    GoalViolation,
    MaintenanceEvent,
    MetricAnomaly,
    TopicAnomaly,
}

/// Toggles self-healing on the remediation service.
#[async_trait::async_trait]
pub trait RemediationClient {
    /// Enables self-healing for exactly the given categories.
    async fn set_enabled_anomaly_types(&self, enabled: &[AnomalyType]) -> anyhow::Result<()>;
}

/// Disables self-healing for every anomaly category.
pub async fn pause_self_healing<C>(client: &C) -> anyhow::Result<()>
where
    C: RemediationClient + Sync + ?Sized,
{
    tracing::info!("Disabling self-healing");
    client.set_enabled_anomaly_types(&[]).await.map_err(|error| {
        tracing::warn!(%error, "Failed to disable self-healing");
        error
    })
}

/// Re-enables self-healing for the categories enabled in `properties`.
pub async fn resume_self_healing<C>(client: &C, properties: &str) -> anyhow::Result<()>
where
    C: RemediationClient + Sync + ?Sized,
{
    let enabled = enabled_anomaly_types(properties);
    tracing::info!(anomaly_types = ?enabled, "Enabling self-healing");
    client
        .set_enabled_anomaly_types(&enabled)
        .await
        .map_err(|error| {
            tracing::warn!(%error, "Failed to enable self-healing");
            error
        })
}

/// Re-enables self-healing as configured by the cluster's Cruise Control
/// properties. A cluster without properties has self-healing disabled.
pub async fn resume_cluster_self_healing<C>(
    client: &C,
    spec: &KafkaClusterSpec,
) -> anyhow::Result<()>
where
    C: RemediationClient + Sync + ?Sized,
{
    let properties = spec
        .cruise_control_config
        .as_ref()
        .map(|c| c.config.as_str())
        .unwrap_or_default();
    resume_self_healing(client, properties).await
}

/// Returns the categories whose `self.healing.<category>.enabled` property is
/// true. Unset categories follow `self.healing.enabled`, which defaults to
/// false. `1`, `true`, `yes` and `on` are true in any case; any other value
/// is false.
pub fn enabled_anomaly_types(properties: &str) -> Vec<AnomalyType> {
    let properties = parse_properties(properties);
    let get_bool = |key: &str| {
        properties
            .get(key)
            .map(|v| TRUE_VALUES.iter().any(|t| v.eq_ignore_ascii_case(t)))
    };
    let default = get_bool(SELF_HEALING_ENABLED).unwrap_or(false);

    AnomalyType::ALL
        .iter()
        .copied()
        .filter(|t| get_bool(t.property()).unwrap_or(default))
        .collect()
}

/// Parses `key=value`, `key: value` and `key value` lines, skipping blank
/// lines and `#`/`!` comments.
fn parse_properties(s: &str) -> HashMap<&str, &str> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| {
            match line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) {
                Some(idx) => {
                    let value = line[idx..]
                        .trim_start()
                        .trim_start_matches(['=', ':'])
                        .trim();
                    (line[..idx].trim_end(), value)
                }
                None => (line, ""),
            }
        })
        .collect()
}

// === impl AnomalyType ===

impl AnomalyType {
    pub const ALL: [Self; 6] = [
        Self::BrokerFailure,
        Self::DiskFailure,
        Self::GoalViolation,
        Self::MaintenanceEvent,
        Self::MetricAnomaly,
        Self::TopicAnomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrokerFailure => "BROKER_FAILURE",
            Self::DiskFailure => "DISK_FAILURE",
            Self::GoalViolation => "GOAL_VIOLATION",
            Self::MaintenanceEvent => "MAINTENANCE_EVENT",
            Self::MetricAnomaly => "METRIC_ANOMALY",
            Self::TopicAnomaly => "TOPIC_ANOMALY",
        }
    }

    /// The property enabling self-healing for this category.
    pub fn property(&self) -> &'static str {
        match self {
            Self::BrokerFailure => "self.healing.broker.failure.enabled",
            Self::DiskFailure => "self.healing.disk.failure.enabled",
            Self::GoalViolation => "self.healing.goal.violation.enabled",
            Self::MaintenanceEvent => "self.healing.maintenance.event.enabled",
            Self::MetricAnomaly => "self.healing.metric.anomaly.enabled",
            Self::TopicAnomaly => "self.healing.topic.anomaly.enabled",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
