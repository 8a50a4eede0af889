//! Main controller implementation.
//!
//! Wires the Kubernetes client, the Azure client factory and the reconciler
//! together and runs the AKSClusterConfig watcher in a background task.

use crate::config::ControllerConfig;
use crate::credentials::ClientResolver;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::recorder::StatusRecorder;
use crate::store::{KubeClusterConfigStore, KubeSecretStore};
use crate::watcher::{watch_cluster_configs, Context, RequeuePolicy};
use aks_client::ArmClientFactory;
use crds::AKSClusterConfig;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// AKS Cluster Controller
pub struct Controller {
    cluster_config_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing AKS Cluster Controller");

        let kube_client = Client::try_default().await?;
        let factory = ArmClientFactory::new()
            .map_err(|e| ControllerError::InvalidConfig(format!("cannot build Azure HTTP client: {}", e)))?;

        let configs = Arc::new(KubeClusterConfigStore::new(kube_client.clone()));
        let secrets = Arc::new(KubeSecretStore::new(kube_client.clone()));
        let resolver = ClientResolver::new(secrets.clone(), Arc::new(factory));
        let reconciler = Reconciler::new(configs.clone(), secrets, resolver, config.poll_interval);
        let recorder = StatusRecorder::new(configs);

        let api: Api<AKSClusterConfig> = match config.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        let ctx = Arc::new(Context::new(
            kube_client,
            reconciler,
            recorder,
            RequeuePolicy::new(&config),
        ));

        let concurrency = config.concurrency;
        let cluster_config_watcher =
            tokio::spawn(async move { watch_cluster_configs(api, ctx, concurrency).await });

        Ok(Self { cluster_config_watcher })
    }

    /// Runs until the watcher stops.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("AKS Cluster Controller running");
        self.cluster_config_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("AKSClusterConfig watcher panicked: {}", e)))?
            .map_err(|e| ControllerError::Watch(format!("AKSClusterConfig watcher error: {}", e)))
    }
}
