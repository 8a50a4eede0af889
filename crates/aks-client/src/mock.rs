//! Mock Azure client for unit testing
//!
//! In-memory implementation of every capability trait plus the client
//! factory. Every call is recorded so tests can assert on exactly which
//! provider operations a reconciliation pass issued.

use crate::azure_trait::*;
use crate::credentials::Credentials;
use crate::error::AzureError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Subscription used for resource IDs generated by the mock
pub const MOCK_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Provider operation kinds recorded by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetCluster,
    CreateOrUpdateCluster,
    DeleteCluster,
    UpdateTags,
    GetAccessProfile,
    WaitForCompletion,
    ResourceGroupExists,
    CreateResourceGroup,
    CreateOrUpdateAgentPool,
    DeleteAgentPool,
    GetWorkspace,
    CreateOrUpdateWorkspace,
    WorkspaceResult,
    BuildClients,
}

impl CallKind {
    /// True for calls that change provider state
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            CallKind::CreateOrUpdateCluster
                | CallKind::DeleteCluster
                | CallKind::UpdateTags
                | CallKind::CreateResourceGroup
                | CallKind::CreateOrUpdateAgentPool
                | CallKind::DeleteAgentPool
                | CallKind::CreateOrUpdateWorkspace
        )
    }
}

/// A recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureCall {
    pub kind: CallKind,
    /// Resource the call targeted (`rg/name`, `rg/cluster/pool`, ...)
    pub target: String,
}

type Key = (String, String);

fn key(resource_group: &str, name: &str) -> Key {
    (resource_group.to_string(), name.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock Azure client for testing
///
/// Cloning shares state, so a test can keep one handle while the code
/// under test receives clients built from another.
#[derive(Debug, Clone, Default)]
pub struct MockAzureClient {
    clusters: Arc<Mutex<HashMap<Key, ManagedCluster>>>,
    resource_groups: Arc<Mutex<HashMap<String, ResourceGroup>>>,
    workspaces: Arc<Mutex<HashMap<Key, Workspace>>>,
    kubeconfigs: Arc<Mutex<HashMap<Key, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<AzureCall>>>,
    failures: Arc<Mutex<HashMap<CallKind, String>>>,
    state_on_write: Arc<Mutex<Option<String>>>,
    last_credentials: Arc<Mutex<Option<Credentials>>>,
}

impl MockAzureClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster to the mock store (for test setup)
    pub fn add_cluster(&self, resource_group: &str, name: &str, mut cluster: ManagedCluster) {
        cluster.id.get_or_insert_with(|| cluster_id(resource_group, name));
        cluster.name.get_or_insert_with(|| name.to_string());
        lock(&self.clusters).insert(key(resource_group, name), cluster);
    }

    /// Current stored cluster
    pub fn cluster(&self, resource_group: &str, name: &str) -> Option<ManagedCluster> {
        lock(&self.clusters).get(&key(resource_group, name)).cloned()
    }

    /// Overwrite the provisioning state of a stored cluster
    pub fn set_cluster_state(&self, resource_group: &str, name: &str, state: &str) {
        if let Some(cluster) = lock(&self.clusters).get_mut(&key(resource_group, name)) {
            cluster.properties.get_or_insert_with(Default::default).provisioning_state = Some(state.to_string());
        }
    }

    /// Overwrite the provisioning state of one agent pool of a stored cluster
    pub fn set_pool_state(&self, resource_group: &str, name: &str, pool: &str, state: &str) {
        if let Some(cluster) = lock(&self.clusters).get_mut(&key(resource_group, name)) {
            let pools = cluster
                .properties
                .get_or_insert_with(Default::default)
                .agent_pool_profiles
                .get_or_insert_with(Vec::new);
            for profile in pools.iter_mut().filter(|p| p.name.as_deref() == Some(pool)) {
                profile.provisioning_state = Some(state.to_string());
            }
        }
    }

    /// Provisioning state stamped on clusters written through the mock
    /// (defaults to `Succeeded`)
    pub fn set_state_on_write(&self, state: &str) {
        *lock(&self.state_on_write) = Some(state.to_string());
    }

    /// Add a resource group to the mock store (for test setup)
    pub fn add_resource_group(&self, name: &str, location: &str) {
        lock(&self.resource_groups).insert(
            name.to_string(),
            ResourceGroup {
                location: location.to_string(),
                ..Default::default()
            },
        );
    }

    /// Add a workspace to the mock store (for test setup)
    pub fn add_workspace(&self, resource_group: &str, name: &str, location: &str) -> String {
        let id = workspace_id(resource_group, name);
        lock(&self.workspaces).insert(
            key(resource_group, name),
            Workspace {
                id: Some(id.clone()),
                name: Some(name.to_string()),
                location: Some(location.to_string()),
                properties: None,
            },
        );
        id
    }

    /// Stored workspace
    pub fn workspace(&self, resource_group: &str, name: &str) -> Option<Workspace> {
        lock(&self.workspaces).get(&key(resource_group, name)).cloned()
    }

    /// Kubeconfig returned by `get_access_profile` for a cluster
    pub fn set_kubeconfig(&self, resource_group: &str, name: &str, kubeconfig: impl Into<Vec<u8>>) {
        lock(&self.kubeconfigs).insert(key(resource_group, name), kubeconfig.into());
    }

    /// Make every call of `kind` fail with an API error carrying `message`
    pub fn fail_on(&self, kind: CallKind, message: impl Into<String>) {
        lock(&self.failures).insert(kind, message.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<AzureCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Number of recorded calls of `kind`
    pub fn count(&self, kind: CallKind) -> usize {
        lock(&self.calls).iter().filter(|c| c.kind == kind).count()
    }

    /// Number of recorded calls that change provider state
    pub fn mutation_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| c.kind.is_mutation()).count()
    }

    /// Credentials passed to the last `clients` call
    pub fn last_credentials(&self) -> Option<Credentials> {
        lock(&self.last_credentials).clone()
    }

    fn record(&self, kind: CallKind, target: impl Into<String>) -> Result<(), AzureError> {
        lock(&self.calls).push(AzureCall {
            kind,
            target: target.into(),
        });
        match lock(&self.failures).get(&kind) {
            Some(message) => Err(AzureError::Api {
                status: 500,
                code: "InternalServerError".to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn written_state(&self) -> String {
        lock(&self.state_on_write)
            .clone()
            .unwrap_or_else(|| "Succeeded".to_string())
    }
}

fn cluster_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{MOCK_SUBSCRIPTION}/resourcegroups/{resource_group}/providers/Microsoft.ContainerService/managedClusters/{name}"
    )
}

fn workspace_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{MOCK_SUBSCRIPTION}/resourcegroups/{resource_group}/providers/Microsoft.OperationalInsights/workspaces/{name}"
    )
}

#[async_trait::async_trait]
impl ManagedClustersClient for MockAzureClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, AzureError> {
        self.record(CallKind::GetCluster, format!("{resource_group}/{name}"))?;
        self.cluster(resource_group, name)
            .ok_or_else(|| AzureError::NotFound(cluster_id(resource_group, name)))
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        cluster: &ManagedCluster,
    ) -> Result<OperationHandle, AzureError> {
        self.record(CallKind::CreateOrUpdateCluster, format!("{resource_group}/{name}"))?;
        let state = self.written_state();
        let mut stored = cluster.clone();
        let properties = stored.properties.get_or_insert_with(Default::default);
        properties.provisioning_state = Some(state.clone());
        properties.fqdn = Some(format!("{name}-dns.hcp.mock.azmk8s.io"));
        for pool in properties.agent_pool_profiles.iter_mut().flatten() {
            pool.provisioning_state = Some(state.clone());
        }
        self.add_cluster(resource_group, name, stored);
        Ok(OperationHandle::done(cluster_id(resource_group, name)))
    }

    async fn delete(&self, resource_group: &str, name: &str) -> Result<OperationHandle, AzureError> {
        self.record(CallKind::DeleteCluster, format!("{resource_group}/{name}"))?;
        lock(&self.clusters).remove(&key(resource_group, name));
        Ok(OperationHandle::done(cluster_id(resource_group, name)))
    }

    async fn update_tags(
        &self,
        resource_group: &str,
        name: &str,
        tags: &TagsObject,
    ) -> Result<OperationHandle, AzureError> {
        self.record(CallKind::UpdateTags, format!("{resource_group}/{name}"))?;
        let mut clusters = lock(&self.clusters);
        let cluster = clusters
            .get_mut(&key(resource_group, name))
            .ok_or_else(|| AzureError::NotFound(cluster_id(resource_group, name)))?;
        cluster.tags = Some(tags.tags.clone());
        Ok(OperationHandle::done(cluster_id(resource_group, name)))
    }

    async fn get_access_profile(
        &self,
        resource_group: &str,
        name: &str,
        role: &str,
    ) -> Result<Vec<u8>, AzureError> {
        self.record(CallKind::GetAccessProfile, format!("{resource_group}/{name}/{role}"))?;
        lock(&self.kubeconfigs)
            .get(&key(resource_group, name))
            .cloned()
            .ok_or_else(|| AzureError::NotFound(format!("{}/accessProfiles/{role}", cluster_id(resource_group, name))))
    }

    async fn wait_for_completion(&self, operation: &OperationHandle) -> Result<(), AzureError> {
        self.record(CallKind::WaitForCompletion, operation.resource_url.clone())
    }
}

#[async_trait::async_trait]
impl ResourceGroupsClient for MockAzureClient {
    async fn exists(&self, name: &str) -> Result<bool, AzureError> {
        self.record(CallKind::ResourceGroupExists, name)?;
        Ok(lock(&self.resource_groups).contains_key(name))
    }

    async fn create_or_update(&self, name: &str, group: &ResourceGroup) -> Result<ResourceGroup, AzureError> {
        self.record(CallKind::CreateResourceGroup, name)?;
        lock(&self.resource_groups).insert(name.to_string(), group.clone());
        Ok(group.clone())
    }
}

#[async_trait::async_trait]
impl AgentPoolsClient for MockAzureClient {
    async fn create_or_update(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        pool: &AgentPool,
    ) -> Result<OperationHandle, AzureError> {
        self.record(
            CallKind::CreateOrUpdateAgentPool,
            format!("{resource_group}/{cluster_name}/{pool_name}"),
        )?;
        let state = self.written_state();
        let mut clusters = lock(&self.clusters);
        let cluster = clusters
            .get_mut(&key(resource_group, cluster_name))
            .ok_or_else(|| AzureError::NotFound(cluster_id(resource_group, cluster_name)))?;
        let pools = cluster
            .properties
            .get_or_insert_with(Default::default)
            .agent_pool_profiles
            .get_or_insert_with(Vec::new);

        let mut profile = pool.properties.clone().unwrap_or_default();
        profile.name = Some(pool_name.to_string());
        profile.provisioning_state = Some(state);
        match pools.iter_mut().find(|p| p.name.as_deref() == Some(pool_name)) {
            Some(existing) => *existing = profile,
            None => pools.push(profile),
        }
        Ok(OperationHandle::done(format!(
            "{}/agentPools/{pool_name}",
            cluster_id(resource_group, cluster_name)
        )))
    }

    async fn delete(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
    ) -> Result<OperationHandle, AzureError> {
        self.record(
            CallKind::DeleteAgentPool,
            format!("{resource_group}/{cluster_name}/{pool_name}"),
        )?;
        if let Some(cluster) = lock(&self.clusters).get_mut(&key(resource_group, cluster_name)) {
            if let Some(pools) = cluster
                .properties
                .as_mut()
                .and_then(|p| p.agent_pool_profiles.as_mut())
            {
                pools.retain(|p| p.name.as_deref() != Some(pool_name));
            }
        }
        Ok(OperationHandle::done(format!(
            "{}/agentPools/{pool_name}",
            cluster_id(resource_group, cluster_name)
        )))
    }
}

#[async_trait::async_trait]
impl WorkspacesClient for MockAzureClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workspace, AzureError> {
        self.record(CallKind::GetWorkspace, format!("{resource_group}/{name}"))?;
        self.workspace(resource_group, name)
            .ok_or_else(|| AzureError::NotFound(workspace_id(resource_group, name)))
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workspace: &Workspace,
    ) -> Result<OperationHandle, AzureError> {
        self.record(CallKind::CreateOrUpdateWorkspace, format!("{resource_group}/{name}"))?;
        let id = workspace_id(resource_group, name);
        let mut stored = workspace.clone();
        stored.id = Some(id.clone());
        stored.name = Some(name.to_string());
        lock(&self.workspaces).insert(key(resource_group, name), stored);
        Ok(OperationHandle::done(id))
    }

    async fn async_create_update_result(&self, operation: &OperationHandle) -> Result<Workspace, AzureError> {
        self.record(CallKind::WorkspaceResult, operation.resource_url.clone())?;
        lock(&self.workspaces)
            .values()
            .find(|w| w.id.as_deref() == Some(operation.resource_url.as_str()))
            .cloned()
            .ok_or_else(|| AzureError::NotFound(operation.resource_url.clone()))
    }
}

#[async_trait::async_trait]
impl AzureClientFactory for MockAzureClient {
    async fn clients(&self, credentials: &Credentials) -> Result<AzureClients, AzureError> {
        self.record(CallKind::BuildClients, credentials.subscription_id.clone())?;
        *lock(&self.last_credentials) = Some(credentials.clone());
        let shared = Arc::new(self.clone());
        Ok(AzureClients {
            credentials: credentials.clone(),
            clusters: Arc::clone(&shared) as Arc<dyn ManagedClustersClient>,
            resource_groups: Arc::clone(&shared) as Arc<dyn ResourceGroupsClient>,
            agent_pools: Arc::clone(&shared) as Arc<dyn AgentPoolsClient>,
            workspaces: shared,
        })
    }
}
