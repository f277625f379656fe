use crate::controller::{self, Context};
use anyhow::{bail, Result};
use clap::Parser;
use kafka_access_controller_core::CONTROLLER_NAME;
use kafka_access_controller_k8s_reconcile::{KubeStore, ReconcileMetrics, Reconciler};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "kafka-access",
    about = "Exposes Kafka brokers outside of the cluster"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "kafka_access=info,warn",
        env = "KAFKA_ACCESS_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The field manager that owns applied fields.
    #[clap(long, default_value = CONTROLLER_NAME)]
    field_manager: String,

    /// Only watches clusters in this namespace. All namespaces are watched
    /// by default.
    #[clap(long)]
    watch_namespace: Option<String>,

    /// Reconciles every cluster at this interval even when nothing changed.
    #[clap(long, default_value = "300")]
    resync_period_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            field_manager,
            watch_namespace,
            resync_period_secs,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = ReconcileMetrics::register(prom.sub_registry_with_prefix("kafka_access"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();
        let ctx = Arc::new(Context {
            reconciler: Reconciler::new(KubeStore::new(client.clone(), &field_manager), metrics),
            resync: Duration::from_secs(resync_period_secs),
        });
        tokio::spawn(
            controller::run(client, watch_namespace, ctx, runtime.shutdown_handle())
                .instrument(info_span!("kafkaclusters")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
