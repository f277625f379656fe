use futures::prelude::*;
use k8s_openapi::NamespaceResourceScope;
use kafka_access_controller_core::Error;
use kafka_access_controller_k8s_api::{
    Api, Client, ConfigMap, Deployment, HttpProxy, KafkaCluster, Resource, ResourceExt, Service,
};
use kafka_access_controller_k8s_reconcile::{KubeStore, Reconciler};
use kube::runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use tokio::time::Duration;

const ERROR_REQUEUE: Duration = Duration::from_secs(10);

pub(crate) struct Context {
    pub(crate) reconciler: Reconciler<KubeStore>,
    pub(crate) resync: Duration,
}

/// Reconciles every `KafkaCluster` whenever it or one of the objects it owns
/// changes, until shutdown is signaled.
pub(crate) async fn run(
    client: Client,
    namespace: Option<String>,
    ctx: Arc<Context>,
    drain: drain::Watch,
) {
    let ns = namespace.as_deref();
    let mut controller = Controller::new(api::<KafkaCluster>(&client, ns), watcher::Config::default())
        .owns(api::<ConfigMap>(&client, ns), watcher::Config::default())
        .owns(api::<Deployment>(&client, ns), watcher::Config::default())
        .owns(api::<Service>(&client, ns), watcher::Config::default());

    if api_resource_exists::<HttpProxy>(&client).await {
        controller = controller.owns(api::<HttpProxy>(&client, ns), watcher::Config::default());
    } else {
        tracing::warn!("httpproxies.projectcontour.io resource kind not found, skipping watches");
    }

    tracing::info!(namespace = ns.unwrap_or("all"), "Watching clusters");
    let reconciles = controller
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((cluster, _)) => tracing::debug!(
                    name = %cluster.name,
                    namespace = cluster.namespace.as_deref(),
                    "Reconciled"
                ),
                Err(error) => tracing::warn!(%error, "Reconcile failed"),
            }
        });

    tokio::select! {
        _ = reconciles => {}
        handle = drain.signaled() => {
            tracing::debug!("Shutting down");
            drop(handle);
        }
    }
}

async fn reconcile(cluster: Arc<KafkaCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let outcome = ctx.reconciler.reconcile(&cluster).await?;
    if !outcome.errors.is_empty() {
        tracing::info!(
            name = %cluster.name_any(),
            errors = outcome.errors.len(),
            "Cluster has invalid ingress configuration"
        );
    }
    Ok(Action::requeue(ctx.resync))
}

fn error_policy(cluster: Arc<KafkaCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::warn!(
        name = %cluster.name_any(),
        namespace = cluster.namespace().as_deref(),
        %error,
        "Retrying cluster reconcile"
    );
    Action::requeue(ERROR_REQUEUE)
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
