//! Cluster clients for the objects produced by the mapper
//!
//! Each client is bound to one namespace and addresses objects by name. Listing
//! only returns objects carrying the creator label, so objects created by
//! anything else in the namespace are never touched.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service as KubeService};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info};

use crate::config::OperatorConfig;
use crate::custom_resource::{ServiceResourceData, api_resource};
use crate::error::{KubeError, Result};
use crate::labels;

/// CRUD handle for one kind of object in one namespace
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    type Object: Send + Sync;

    /// List objects owned by the operator
    async fn list(&self) -> Result<Vec<Self::Object>>;

    /// Get an object by name
    async fn get(&self, name: &str) -> Result<Option<Self::Object>>;

    /// Create a new object
    async fn create(&self, obj: &Self::Object) -> Result<Self::Object>;

    /// Update an existing object, creating it if needed
    async fn update(&self, obj: &Self::Object) -> Result<Self::Object>;

    /// Delete an object by name
    async fn delete(&self, name: &str) -> Result<()>;

    /// Check if an object exists
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.get(name).await?.is_some())
    }
}

/// Client for a typed, namespaced Kubernetes kind
pub struct KubeResourceClient<K> {
    api: Api<K>,
    field_manager: String,
}

impl<K> KubeResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    /// Create a client for `namespace`
    pub fn new(client: Client, namespace: &str, field_manager: impl Into<String>) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            field_manager: field_manager.into(),
        }
    }
}

fn object_name<K>(obj: &K) -> Result<String>
where
    K: Resource,
    K::DynamicType: Default,
{
    obj.meta().name.clone().ok_or_else(|| KubeError::MissingName {
        kind: K::kind(&K::DynamicType::default()).to_string(),
    })
}

#[async_trait]
impl<K> ResourceClient for KubeResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    type Object = K;

    async fn list(&self) -> Result<Vec<K>> {
        let params = ListParams::default().labels(&labels::creator_selector());
        Ok(self.api.list(&params).await?.items)
    }

    async fn get(&self, name: &str) -> Result<Option<K>> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        info!(name = %obj.name_any(), kind = %K::kind(&K::DynamicType::default()), "creating");
        Ok(self.api.create(&PostParams::default(), obj).await?)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let name = object_name(obj)?;
        info!(name = %name, kind = %K::kind(&K::DynamicType::default()), "applying");

        let params = PatchParams::apply(&self.field_manager).force();
        Ok(self.api.patch(&name, &params, &Patch::Apply(obj)).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        info!(name = %name, kind = %K::kind(&K::DynamicType::default()), "deleting");
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Client for service custom resources of one kind
pub struct ServiceResourceClient {
    api: Api<DynamicObject>,
    kind: String,
    field_manager: String,
}

impl ServiceResourceClient {
    /// Create a client for custom resources of `kind` in `namespace`
    pub fn new(
        client: Client,
        namespace: &str,
        kind: impl Into<String>,
        field_manager: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        Self {
            api: Api::namespaced_with(client, namespace, &api_resource(&kind)),
            kind,
            field_manager: field_manager.into(),
        }
    }

    /// Custom resource kind handled by this client
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

#[async_trait]
impl ResourceClient for ServiceResourceClient {
    type Object = ServiceResourceData;

    async fn list(&self) -> Result<Vec<ServiceResourceData>> {
        let params = ListParams::default().labels(&labels::creator_selector());
        self.api
            .list(&params)
            .await?
            .items
            .iter()
            .map(ServiceResourceData::from_dynamic_object)
            .collect()
    }

    async fn get(&self, name: &str) -> Result<Option<ServiceResourceData>> {
        self.api
            .get_opt(name)
            .await?
            .as_ref()
            .map(ServiceResourceData::from_dynamic_object)
            .transpose()
    }

    async fn create(&self, obj: &ServiceResourceData) -> Result<ServiceResourceData> {
        let dynamic = obj.to_dynamic_object(&self.kind)?;
        info!(name = %dynamic.name_any(), kind = %self.kind, "creating");

        let created = self.api.create(&PostParams::default(), &dynamic).await?;
        ServiceResourceData::from_dynamic_object(&created)
    }

    async fn update(&self, obj: &ServiceResourceData) -> Result<ServiceResourceData> {
        let dynamic = obj.to_dynamic_object(&self.kind)?;
        let name = dynamic.name_any();
        info!(name = %name, kind = %self.kind, "applying");

        let params = PatchParams::apply(&self.field_manager).force();
        let applied = self
            .api
            .patch(&name, &params, &Patch::Apply(&dynamic))
            .await?;
        ServiceResourceData::from_dynamic_object(&applied)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        info!(name = %name, kind = %self.kind, "deleting");
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Read-only access to the secrets of a namespace
pub struct SecretClient {
    api: Api<Secret>,
}

impl SecretClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    /// List every secret in the namespace, whoever created it
    pub async fn list(&self) -> Result<Vec<Secret>> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }

    /// Check if a secret exists
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let found = self.api.get_opt(name).await?.is_some();
        debug!(name = %name, found, "checked secret");
        Ok(found)
    }
}

/// Entry point handing out per-kind clients bound to one namespace
#[derive(Clone)]
pub struct EnvironmentClient {
    client: Client,
    namespace: String,
    field_manager: String,
}

impl EnvironmentClient {
    /// Create a client from the default kubeconfig or in-cluster config
    pub async fn try_default(config: &OperatorConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client, config))
    }

    /// Create with an existing Kubernetes client
    pub fn with_client(client: Client, config: &OperatorConfig) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            field_manager: config.field_manager.clone(),
        }
    }

    /// Namespace all clients are bound to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn typed<K>(&self) -> KubeResourceClient<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        KubeResourceClient::new(self.client.clone(), &self.namespace, &self.field_manager)
    }

    pub fn services(&self) -> KubeResourceClient<KubeService> {
        self.typed()
    }

    pub fn deployments(&self) -> KubeResourceClient<Deployment> {
        self.typed()
    }

    pub fn ingresses(&self) -> KubeResourceClient<Ingress> {
        self.typed()
    }

    pub fn persistent_volume_claims(&self) -> KubeResourceClient<PersistentVolumeClaim> {
        self.typed()
    }

    pub fn autoscalers(&self) -> KubeResourceClient<HorizontalPodAutoscaler> {
        self.typed()
    }

    pub fn secrets(&self) -> SecretClient {
        SecretClient::new(self.client.clone(), &self.namespace)
    }

    /// Client for service custom resources of `kind`
    pub fn service_resources(&self, kind: &str) -> ServiceResourceClient {
        ServiceResourceClient::new(
            self.client.clone(),
            &self.namespace,
            kind,
            &self.field_manager,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    /// In-memory client keyed by name
    #[derive(Default)]
    struct MemoryClient {
        store: RwLock<BTreeMap<String, KubeService>>,
    }

    #[async_trait]
    impl ResourceClient for MemoryClient {
        type Object = KubeService;

        async fn list(&self) -> Result<Vec<KubeService>> {
            let store = self.store.read().unwrap();
            Ok(store
                .values()
                .filter(|s| {
                    s.labels().get(labels::CREATOR_LABEL).map(String::as_str)
                        == Some(labels::CREATOR)
                })
                .cloned()
                .collect())
        }

        async fn get(&self, name: &str) -> Result<Option<KubeService>> {
            Ok(self.store.read().unwrap().get(name).cloned())
        }

        async fn create(&self, obj: &KubeService) -> Result<KubeService> {
            let name = object_name(obj)?;
            self.store.write().unwrap().insert(name, obj.clone());
            Ok(obj.clone())
        }

        async fn update(&self, obj: &KubeService) -> Result<KubeService> {
            self.create(obj).await
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.store.write().unwrap().remove(name);
            Ok(())
        }
    }

    fn mapped(name: &str) -> KubeService {
        let service = envop_core::Service {
            name: name.to_string(),
            port: 80,
            ..Default::default()
        };
        crate::mapper::KubeMapper::new(&service, "ns").service()
    }

    #[tokio::test]
    async fn test_exists_default_method() {
        let client = MemoryClient::default();
        assert!(!client.exists("web").await.unwrap());

        client.create(&mapped("web")).await.unwrap();
        assert!(client.exists("web").await.unwrap());

        client.delete("web").await.unwrap();
        assert!(!client.exists("web").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_only_returns_owned_objects() {
        let client = MemoryClient::default();
        client.create(&mapped("web")).await.unwrap();

        let mut foreign = mapped("other");
        foreign.metadata.labels = None;
        client.create(&foreign).await.unwrap();

        let listed = client.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name_any(), "web");
    }

    #[test]
    fn test_object_name_missing() {
        let err = object_name(&KubeService::default()).unwrap_err();
        assert!(matches!(err, KubeError::MissingName { ref kind } if kind == "Service"));
    }
}
