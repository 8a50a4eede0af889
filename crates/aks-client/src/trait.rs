//! Capability traits for Azure sub-resource clients
//!
//! The controller only talks to Azure through these traits. The REST
//! implementation lives in [`crate::client`]; tests use the in-memory
//! [`crate::mock::MockAzureClient`].
//! All async methods must be `Send` to work with Tokio's work-stealing runtime.

use crate::credentials::Credentials;
use crate::error::AzureError;
use crate::models::*;
use std::sync::Arc;

/// How a long-running operation reports completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStrategy {
    /// The operation finished synchronously
    Done,
    /// Poll the `Azure-AsyncOperation` status URL
    AsyncOperation(String),
    /// Poll the `Location` URL until it stops answering 202
    Location(String),
}

/// Handle to a long-running Resource Manager operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// URL of the resource the operation acts on
    pub resource_url: String,
    pub poll: PollStrategy,
}

impl OperationHandle {
    /// Handle for an operation that has already completed
    pub fn done(resource_url: impl Into<String>) -> Self {
        Self {
            resource_url: resource_url.into(),
            poll: PollStrategy::Done,
        }
    }
}

/// Managed cluster operations
#[async_trait::async_trait]
pub trait ManagedClustersClient: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, AzureError>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        cluster: &ManagedCluster,
    ) -> Result<OperationHandle, AzureError>;

    async fn delete(&self, resource_group: &str, name: &str) -> Result<OperationHandle, AzureError>;

    async fn update_tags(
        &self,
        resource_group: &str,
        name: &str,
        tags: &TagsObject,
    ) -> Result<OperationHandle, AzureError>;

    /// Kubeconfig bytes for the given access role (e.g. `clusterAdmin`)
    async fn get_access_profile(
        &self,
        resource_group: &str,
        name: &str,
        role: &str,
    ) -> Result<Vec<u8>, AzureError>;

    /// Block until the operation behind `operation` has finished
    async fn wait_for_completion(&self, operation: &OperationHandle) -> Result<(), AzureError>;
}

/// Resource group operations
#[async_trait::async_trait]
pub trait ResourceGroupsClient: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, AzureError>;

    async fn create_or_update(&self, name: &str, group: &ResourceGroup) -> Result<ResourceGroup, AzureError>;
}

/// Agent pool (node pool) operations
#[async_trait::async_trait]
pub trait AgentPoolsClient: Send + Sync {
    async fn create_or_update(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        pool: &AgentPool,
    ) -> Result<OperationHandle, AzureError>;

    async fn delete(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
    ) -> Result<OperationHandle, AzureError>;
}

/// Log analytics workspace operations
#[async_trait::async_trait]
pub trait WorkspacesClient: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workspace, AzureError>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workspace: &Workspace,
    ) -> Result<OperationHandle, AzureError>;

    /// Wait for a create-or-update to finish and return the resulting workspace
    async fn async_create_update_result(&self, operation: &OperationHandle) -> Result<Workspace, AzureError>;
}

/// Typed clients for one set of credentials
#[derive(Clone)]
pub struct AzureClients {
    pub credentials: Credentials,
    pub clusters: Arc<dyn ManagedClustersClient>,
    pub resource_groups: Arc<dyn ResourceGroupsClient>,
    pub agent_pools: Arc<dyn AgentPoolsClient>,
    pub workspaces: Arc<dyn WorkspacesClient>,
}

impl std::fmt::Debug for AzureClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClients")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Builds typed clients from resolved credentials
#[async_trait::async_trait]
pub trait AzureClientFactory: Send + Sync {
    async fn clients(&self, credentials: &Credentials) -> Result<AzureClients, AzureError>;
}
