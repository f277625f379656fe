use crate::{LiveObject, ObjectStore};
use k8s_openapi::NamespaceResourceScope;
use kafka_access_controller_k8s_api::{
    Api, Client, ConfigMap, DeleteParams, Deployment, HttpProxy, ListParams, OwnerReference,
    Patch, PatchParams, Resource, ResourceExt, Selector, Service,
};
use kafka_access_controller_k8s_backend::{DesiredObject, Kind, ObjectKey};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// An [`ObjectStore`] backed by the Kubernetes API.
///
/// Objects are written with server-side apply so that fields this controller
/// does not set are left to other managers.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    patch_params: PatchParams,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            patch_params: PatchParams::apply(field_manager).force(),
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch<K>(&self, object: K) -> anyhow::Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize,
        K: fmt::Debug,
        K::DynamicType: Default,
    {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        self.api::<K>(&namespace)
            .patch(&name, &self.patch_params, &Patch::Apply(&object))
            .await?;
        Ok(())
    }

    async fn delete_object<K>(&self, key: &ObjectKey) -> anyhow::Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        match self
            .api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(error)) if error.code == 404 => {
                tracing::debug!(%key, "Object already deleted");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn list_objects<K>(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &Selector,
    ) -> anyhow::Result<Vec<LiveObject>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        let params = ListParams::default().labels(&selector.to_string());
        let list = self.api::<K>(namespace).list(&params).await?;
        Ok(list
            .items
            .into_iter()
            .map(|object| LiveObject {
                key: ObjectKey::new(kind, namespace, object.name_any()),
                labels: object.labels().clone(),
                annotations: object.annotations().clone(),
                terminating: object.meta().deletion_timestamp.is_some(),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeStore {
    async fn apply(&self, object: &DesiredObject, owner: &OwnerReference) -> anyhow::Result<()> {
        match object.clone().with_owner(owner.clone()) {
            DesiredObject::ConfigMap(o) => self.patch(o).await,
            DesiredObject::Deployment(o) => self.patch(o).await,
            DesiredObject::Service(o) => self.patch(o).await,
            DesiredObject::HttpProxy(o) => self.patch(o).await,
        }
    }

    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<()> {
        match key.kind {
            Kind::ConfigMap => self.delete_object::<ConfigMap>(key).await,
            Kind::Deployment => self.delete_object::<Deployment>(key).await,
            Kind::Service => self.delete_object::<Service>(key).await,
            Kind::HttpProxy => self.delete_object::<HttpProxy>(key).await,
        }
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &Selector,
    ) -> anyhow::Result<Vec<LiveObject>> {
        match kind {
            Kind::ConfigMap => self.list_objects::<ConfigMap>(kind, namespace, selector).await,
            Kind::Deployment => self.list_objects::<Deployment>(kind, namespace, selector).await,
            Kind::Service => self.list_objects::<Service>(kind, namespace, selector).await,
            Kind::HttpProxy => self.list_objects::<HttpProxy>(kind, namespace, selector).await,
        }
    }
}
