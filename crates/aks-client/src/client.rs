//! Azure Resource Manager REST client
//!
//! Implements the sub-resource capability traits against the ARM REST API.
//! Paths follow `/subscriptions/{id}/resourceGroups/{rg}/providers/...`.

use crate::auth::TokenProvider;
use crate::azure_trait::*;
use crate::common::HttpClient;
use crate::credentials::Credentials;
use crate::error::AzureError;
use crate::models::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub const MANAGED_CLUSTERS_API_VERSION: &str = "2020-11-01";
pub const RESOURCE_GROUPS_API_VERSION: &str = "2020-06-01";
pub const WORKSPACES_API_VERSION: &str = "2020-08-01";

/// Resource Manager client bound to one subscription
#[derive(Debug, Clone)]
pub struct ArmClient {
    http: HttpClient,
    subscription_id: String,
}

impl ArmClient {
    /// Create a client for `credentials`, acquiring tokens through `tokens`
    pub fn new(client: Client, credentials: &Credentials, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http: HttpClient::new(client, credentials.base_url.clone(), tokens),
            subscription_id: credentials.subscription_id.clone(),
        }
    }

    fn resource_group_path(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourcegroups/{}",
            urlencoding::encode(&self.subscription_id),
            urlencoding::encode(resource_group)
        )
    }

    fn cluster_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.ContainerService/managedClusters/{}",
            self.resource_group_path(resource_group),
            urlencoding::encode(name)
        )
    }

    fn workspace_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.OperationalInsights/workspaces/{}?api-version={}",
            self.resource_group_path(resource_group),
            urlencoding::encode(name),
            WORKSPACES_API_VERSION
        )
    }
}

fn with_version(path: String, version: &str) -> String {
    format!("{path}?api-version={version}")
}

#[async_trait::async_trait]
impl ManagedClustersClient for ArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, AzureError> {
        let path = with_version(self.cluster_path(resource_group, name), MANAGED_CLUSTERS_API_VERSION);
        self.http.get(&path).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        cluster: &ManagedCluster,
    ) -> Result<OperationHandle, AzureError> {
        let path = with_version(self.cluster_path(resource_group, name), MANAGED_CLUSTERS_API_VERSION);
        let body = serde_json::to_value(cluster)?;
        self.http.begin(Method::PUT, &path, Some(&body)).await
    }

    async fn delete(&self, resource_group: &str, name: &str) -> Result<OperationHandle, AzureError> {
        let path = with_version(self.cluster_path(resource_group, name), MANAGED_CLUSTERS_API_VERSION);
        self.http.begin(Method::DELETE, &path, None).await
    }

    async fn update_tags(
        &self,
        resource_group: &str,
        name: &str,
        tags: &TagsObject,
    ) -> Result<OperationHandle, AzureError> {
        let path = with_version(self.cluster_path(resource_group, name), MANAGED_CLUSTERS_API_VERSION);
        let body = serde_json::to_value(tags)?;
        self.http.begin(Method::PATCH, &path, Some(&body)).await
    }

    async fn get_access_profile(
        &self,
        resource_group: &str,
        name: &str,
        role: &str,
    ) -> Result<Vec<u8>, AzureError> {
        let path = with_version(
            format!(
                "{}/accessProfiles/{}/listCredential",
                self.cluster_path(resource_group, name),
                urlencoding::encode(role)
            ),
            MANAGED_CLUSTERS_API_VERSION,
        );
        let profile: ManagedClusterAccessProfile = self.http.post(&path).await?;
        let encoded = profile
            .properties
            .and_then(|p| p.kube_config)
            .ok_or_else(|| AzureError::InvalidResponse(format!("no kubeconfig in access profile [{role}] of [{name}]")))?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| AzureError::InvalidResponse(format!("kubeconfig of [{name}] is not base64: {e}")))
    }

    async fn wait_for_completion(&self, operation: &OperationHandle) -> Result<(), AzureError> {
        self.http.wait(operation).await
    }
}

#[async_trait::async_trait]
impl ResourceGroupsClient for ArmClient {
    async fn exists(&self, name: &str) -> Result<bool, AzureError> {
        let path = with_version(self.resource_group_path(name), RESOURCE_GROUPS_API_VERSION);
        self.http.head(&path).await
    }

    async fn create_or_update(&self, name: &str, group: &ResourceGroup) -> Result<ResourceGroup, AzureError> {
        let path = with_version(self.resource_group_path(name), RESOURCE_GROUPS_API_VERSION);
        let body = serde_json::to_value(group)?;
        self.http.put(&path, &body).await
    }
}

#[async_trait::async_trait]
impl AgentPoolsClient for ArmClient {
    async fn create_or_update(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
        pool: &AgentPool,
    ) -> Result<OperationHandle, AzureError> {
        let path = with_version(
            format!(
                "{}/agentPools/{}",
                self.cluster_path(resource_group, cluster_name),
                urlencoding::encode(pool_name)
            ),
            MANAGED_CLUSTERS_API_VERSION,
        );
        let body = serde_json::to_value(pool)?;
        self.http.begin(Method::PUT, &path, Some(&body)).await
    }

    async fn delete(
        &self,
        resource_group: &str,
        cluster_name: &str,
        pool_name: &str,
    ) -> Result<OperationHandle, AzureError> {
        let path = with_version(
            format!(
                "{}/agentPools/{}",
                self.cluster_path(resource_group, cluster_name),
                urlencoding::encode(pool_name)
            ),
            MANAGED_CLUSTERS_API_VERSION,
        );
        self.http.begin(Method::DELETE, &path, None).await
    }
}

#[async_trait::async_trait]
impl WorkspacesClient for ArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Workspace, AzureError> {
        self.http.get(&self.workspace_path(resource_group, name)).await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        workspace: &Workspace,
    ) -> Result<OperationHandle, AzureError> {
        let body = serde_json::to_value(workspace)?;
        self.http
            .begin(Method::PUT, &self.workspace_path(resource_group, name), Some(&body))
            .await
    }

    async fn async_create_update_result(&self, operation: &OperationHandle) -> Result<Workspace, AzureError> {
        self.http.wait(operation).await?;
        self.http.get(&operation.resource_url).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    auth_base_url: String,
    base_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl From<&Credentials> for TokenKey {
    fn from(credentials: &Credentials) -> Self {
        Self {
            auth_base_url: credentials.auth_base_url.clone(),
            base_url: credentials.base_url.clone(),
            tenant_id: credentials.tenant_id.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
        }
    }
}

/// Builds [`ArmClient`]s, sharing one HTTP connection pool and one token
/// cache per service principal.
#[derive(Debug, Clone)]
pub struct ArmClientFactory {
    client: Client,
    tokens: Arc<Mutex<HashMap<TokenKey, Arc<TokenProvider>>>>,
}

impl ArmClientFactory {
    pub fn new() -> Result<Self, AzureError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn token_provider(&self, credentials: &Credentials) -> Arc<TokenProvider> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            tokens
                .entry(TokenKey::from(credentials))
                .or_insert_with(|| Arc::new(TokenProvider::new(self.client.clone(), credentials))),
        )
    }
}

#[async_trait::async_trait]
impl AzureClientFactory for ArmClientFactory {
    async fn clients(&self, credentials: &Credentials) -> Result<AzureClients, AzureError> {
        debug!("Building Azure clients for subscription [{}]", credentials.subscription_id);
        let arm = Arc::new(ArmClient::new(
            self.client.clone(),
            credentials,
            self.token_provider(credentials),
        ));
        Ok(AzureClients {
            credentials: credentials.clone(),
            clusters: Arc::clone(&arm) as Arc<dyn ManagedClustersClient>,
            resource_groups: Arc::clone(&arm) as Arc<dyn ResourceGroupsClient>,
            agent_pools: Arc::clone(&arm) as Arc<dyn AgentPoolsClient>,
            workspaces: arm,
        })
    }
}
