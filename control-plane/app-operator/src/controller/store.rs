use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::trace;

use crate::crd::{AppDeployment, AppDeploymentStatus};

/// Identity of a child object: resource type plus namespace/name.
#[derive(Clone, Debug)]
pub struct ChildRef {
    pub resource: ApiResource,
    pub namespace: String,
    pub name: String,
}

impl ChildRef {
    pub fn new(resource: ApiResource, namespace: &str, name: &str) -> Self {
        Self {
            resource,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ChildRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.resource.kind, self.namespace, self.name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rejected by api server: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Transient(String),
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => match resp.code {
                404 => StoreError::NotFound,
                409 if resp.reason == "AlreadyExists" => {
                    StoreError::AlreadyExists
                }
                409 => StoreError::Conflict(resp.message),
                400 | 422 => StoreError::Invalid(resp.message),
                _ => StoreError::Transient(resp.message),
            },
            other => StoreError::Transient(other.to_string()),
        }
    }
}

/// Key-addressed object store the reconciler drives. Every call is a
/// blocking round trip from the reconciler's point of view.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn get(
        &self,
        key: &ChildRef,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn create(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Full replace guarded by `metadata.resourceVersion`. With `dry_run`
    /// the server-side result is returned without persisting anything.
    async fn update(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError>;

    /// `Err(StoreError::NotFound)` when there is nothing to delete.
    async fn delete(&self, key: &ChildRef) -> Result<(), StoreError>;

    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        status: &AppDeploymentStatus,
    ) -> Result<(), StoreError>;
}

/// Production store backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, key: &ChildRef) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &key.namespace, &key.resource)
    }

    fn post_params(&self, dry_run: bool) -> PostParams {
        PostParams {
            dry_run,
            field_manager: Some(self.field_manager.clone()),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        key: &ChildRef,
    ) -> Result<Option<DynamicObject>, StoreError> {
        trace!(%key, "store: get");
        Ok(self.api(key).get_opt(&key.name).await?)
    }

    async fn create(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        trace!(%key, "store: create");
        Ok(self.api(key).create(&self.post_params(false), obj).await?)
    }

    async fn update(
        &self,
        key: &ChildRef,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError> {
        trace!(%key, dry_run, "store: update");
        Ok(self
            .api(key)
            .replace(&key.name, &self.post_params(dry_run), obj)
            .await?)
    }

    async fn delete(&self, key: &ChildRef) -> Result<(), StoreError> {
        trace!(%key, "store: delete");
        self.api(key)
            .delete(&key.name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        status: &AppDeploymentStatus,
    ) -> Result<(), StoreError> {
        trace!(%namespace, %name, "store: patch status");
        let api: Api<AppDeployment> =
            Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Convert a typed manifest into the dynamic form the store speaks.
pub fn to_dynamic<K: Serialize>(
    obj: &K,
) -> Result<DynamicObject, serde_json::Error> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}

pub fn from_dynamic<K: DeserializeOwned>(
    obj: DynamicObject,
) -> Result<K, serde_json::Error> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}
