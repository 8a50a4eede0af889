//! Test utilities for unit testing the reconciler
//!
//! In-memory stores, a harness wiring them to the mock Azure client, and
//! fixtures for AKSClusterConfigs, node pools and credential Secrets.

use crate::builder::build_managed_cluster;
use crate::credentials::ClientResolver;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::recorder::StatusRecorder;
use crate::store::{namespace_of, ClusterConfigStore, SecretCreation, SecretStore};
use aks_client::mock::MOCK_SUBSCRIPTION;
use aks_client::{AzureEnvironment, Credentials, MockAzureClient};
use crds::{AKSClusterConfig, AKSClusterConfigSpec, AKSNodePool, ClusterPhase, SYSTEM_MODE};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SUBSCRIPTION: &str = MOCK_SUBSCRIPTION;
pub const CREDENTIAL_NAMESPACE: &str = "cattle-global-data";
pub const CREDENTIAL_NAME: &str = "cc-azure";
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Admin kubeconfig as returned by the access profile endpoint
pub const ADMIN_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
current-context: prod-admin
clusters:
- name: prod
  cluster:
    server: https://prod-dns.hcp.eastus.azmk8s.io:443
    certificate-authority-data: Q0EtREFUQQ==
contexts:
- name: prod-admin
  context:
    cluster: prod
    user: clusterAdmin_prod-rg_prod
users:
- name: clusterAdmin_prod-rg_prod
  user:
    token: secret-token
"#;

type Key = (String, String);

fn key<K: ResourceExt>(object: &K) -> Key {
    (namespace_of(object), object.name_any())
}

/// [`ClusterConfigStore`] keeping records in memory and counting status writes
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: Mutex<HashMap<Key, AKSClusterConfig>>,
    writes: Mutex<Vec<AKSClusterConfig>>,
}

impl InMemoryConfigStore {
    pub fn insert(&self, config: AKSClusterConfig) {
        self.configs.lock().unwrap().insert(key(&config), config);
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<AKSClusterConfig> {
        self.configs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of status writes so far
    pub fn writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Every record passed to `update_status`, in order
    pub fn written(&self) -> Vec<AKSClusterConfig> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterConfigStore for InMemoryConfigStore {
    async fn update_status(&self, config: &AKSClusterConfig) -> Result<AKSClusterConfig, ControllerError> {
        self.writes.lock().unwrap().push(config.clone());
        self.insert(config.clone());
        Ok(config.clone())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<AKSClusterConfig>, ControllerError> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, config)| config.clone())
            .collect())
    }
}

/// [`SecretStore`] keeping Secrets in memory
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<Key, Secret>>,
    created: Mutex<Vec<Secret>>,
}

impl InMemorySecretStore {
    pub fn insert(&self, secret: Secret) {
        self.secrets.lock().unwrap().insert(key(&secret), secret);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Secrets created through the store (not via `insert`)
    pub fn created(&self) -> Vec<Secret> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        Ok(self.secret(namespace, name))
    }

    async fn create(&self, secret: &Secret) -> Result<SecretCreation, ControllerError> {
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key(secret)) {
            return Ok(SecretCreation::AlreadyExists);
        }
        secrets.insert(key(secret), secret.clone());
        self.created.lock().unwrap().push(secret.clone());
        Ok(SecretCreation::Created)
    }
}

/// Stores and mock Azure wired together the way the controller wires them
pub struct Harness {
    pub configs: Arc<InMemoryConfigStore>,
    pub secrets: Arc<InMemorySecretStore>,
    pub azure: MockAzureClient,
}

impl Harness {
    /// Harness with the default credential Secret in place
    pub fn new() -> Self {
        let secrets = Arc::new(InMemorySecretStore::default());
        secrets.insert(credential_secret(CREDENTIAL_NAMESPACE, CREDENTIAL_NAME));
        Self {
            configs: Arc::new(InMemoryConfigStore::default()),
            secrets,
            azure: MockAzureClient::new(),
        }
    }

    pub fn resolver(&self) -> ClientResolver {
        ClientResolver::new(self.secrets.clone(), Arc::new(self.azure.clone()))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.configs.clone(),
            self.secrets.clone(),
            self.resolver(),
            POLL_INTERVAL,
        )
    }

    pub fn recorder(&self) -> StatusRecorder {
        StatusRecorder::new(self.configs.clone())
    }

    /// Record in `phase`, also stored so duplicate-name checks can see it
    pub fn stored_config(&self, name: &str, spec: AKSClusterConfigSpec, phase: ClusterPhase) -> AKSClusterConfig {
        let mut config = test_config(name, spec);
        config.set_phase(phase);
        self.configs.insert(config.clone());
        config
    }

    /// Put a cluster matching `spec` in Azure, in the `Succeeded` state
    pub fn seed_cluster(&self, spec: &AKSClusterConfigSpec) {
        let cluster = build_managed_cluster(spec, &test_credentials(), None);
        self.azure.add_cluster(&spec.resource_group, &spec.cluster_name, cluster);
        self.azure
            .set_cluster_state(&spec.resource_group, &spec.cluster_name, "Succeeded");
        self.azure.add_resource_group(&spec.resource_group, &spec.resource_location);
        self.azure
            .set_kubeconfig(&spec.resource_group, &spec.cluster_name, ADMIN_KUBECONFIG);
    }
}

/// Credentials matching [`credential_secret`]
pub fn test_credentials() -> Credentials {
    Credentials::new(
        TEST_SUBSCRIPTION,
        "tenant-id",
        "client-id",
        "client-secret",
        AzureEnvironment::Public,
    )
}

/// AKSClusterConfig in the `default` namespace
pub fn test_config(name: &str, spec: AKSClusterConfigSpec) -> AKSClusterConfig {
    AKSClusterConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{name}")),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// A spec that passes validation
pub fn valid_spec() -> AKSClusterConfigSpec {
    AKSClusterConfigSpec {
        azure_credential_secret: format!("{CREDENTIAL_NAMESPACE}:{CREDENTIAL_NAME}"),
        resource_location: "eastus".to_string(),
        resource_group: "prod-rg".to_string(),
        cluster_name: "prod".to_string(),
        kubernetes_version: Some("1.29.2".to_string()),
        node_pools: Some(vec![system_pool("system")]),
        network_plugin: Some("azure".to_string()),
        tags: Some(BTreeMap::from([("env".to_string(), "prod".to_string())])),
        ..Default::default()
    }
}

pub fn system_pool(name: &str) -> AKSNodePool {
    AKSNodePool {
        name: Some(name.to_string()),
        count: Some(1),
        max_pods: Some(110),
        vm_size: "Standard_D2s_v3".to_string(),
        os_disk_size_gb: Some(128),
        os_disk_type: "Managed".to_string(),
        mode: SYSTEM_MODE.to_string(),
        os_type: "Linux".to_string(),
        ..Default::default()
    }
}

pub fn user_pool(name: &str) -> AKSNodePool {
    AKSNodePool {
        count: Some(2),
        mode: "User".to_string(),
        ..system_pool(name)
    }
}

/// Credential Secret with every key set
pub fn credential_secret(namespace: &str, name: &str) -> Secret {
    let data = [
        ("azurecredentialConfig-subscriptionId", TEST_SUBSCRIPTION),
        ("azurecredentialConfig-tenantId", "tenant-id"),
        ("azurecredentialConfig-clientId", "client-id"),
        ("azurecredentialConfig-clientSecret", "client-secret"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
    .collect();

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}
