//! Kubernetes-side collaborators of the reconciler.
//!
//! The reconciler reads and writes AKSClusterConfig status and Secrets only
//! through these traits so that passes can be unit tested without an API
//! server.

use crate::error::ControllerError;
use crds::AKSClusterConfig;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;

/// Outcome of creating a Secret that may already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretCreation {
    Created,
    AlreadyExists,
}

/// Status persistence and listing for AKSClusterConfigs
#[async_trait::async_trait]
pub trait ClusterConfigStore: Send + Sync {
    /// Persist `config.status`, returning the stored record
    async fn update_status(&self, config: &AKSClusterConfig) -> Result<AKSClusterConfig, ControllerError>;

    async fn list(&self, namespace: &str) -> Result<Vec<AKSClusterConfig>, ControllerError>;
}

/// Secret access for credentials and derived cluster records
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError>;

    async fn create(&self, secret: &Secret) -> Result<SecretCreation, ControllerError>;
}

/// Namespace of a namespaced object, falling back to `default`
pub fn namespace_of<K: ResourceExt>(object: &K) -> String {
    object.namespace().unwrap_or_else(|| "default".to_string())
}

/// API server backed [`ClusterConfigStore`]
#[derive(Clone)]
pub struct KubeClusterConfigStore {
    client: Client,
}

impl KubeClusterConfigStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterConfigStore for KubeClusterConfigStore {
    async fn update_status(&self, config: &AKSClusterConfig) -> Result<AKSClusterConfig, ControllerError> {
        let api: Api<AKSClusterConfig> = Api::namespaced(self.client.clone(), &namespace_of(config));
        let patch = Patch::Merge(json!({ "status": config.status }));
        Ok(api
            .patch_status(&config.name_any(), &PatchParams::default(), &patch)
            .await?)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<AKSClusterConfig>, ControllerError> {
        let api: Api<AKSClusterConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

/// API server backed [`SecretStore`]
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create(&self, secret: &Secret) -> Result<SecretCreation, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace_of(secret));
        match api.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(SecretCreation::Created),
            Err(e) if is_already_exists(&e) => Ok(SecretCreation::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }
}

/// A create rejected because the object is already there
fn is_already_exists(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(ae) if ae.code == 409)
}
