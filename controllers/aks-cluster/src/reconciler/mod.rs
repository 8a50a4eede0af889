//! Phase state machine for AKSClusterConfigs.
//!
//! Each pass dispatches on the record's phase, issues at most one mutating
//! Azure call, and reports the next phase plus when to look again. Waiting on
//! Azure is done by requeueing, never by blocking the pass.
//!
//! - `create`: validation, resource group, initial create-or-update, waiting
//!   for creation and importing
//! - `update`: busy checks and drift convergence for active clusters
//! - `remove`: teardown when the record is deleted

mod create;
mod remove;
mod update;

#[cfg(test)]
mod create_test;

use crate::credentials::ClientResolver;
use crate::error::ControllerError;
use crate::store::{namespace_of, ClusterConfigStore, SecretCreation, SecretStore};
use crate::workspace::check_log_analytics_workspace_for_monitoring;
use aks_client::{AzureClients, ResourceGroup};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crds::{AKSClusterConfig, AKSClusterConfigSpec, ClusterPhase};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::config::Kubeconfig;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Access role whose kubeconfig seeds the derived cluster Secret
const CLUSTER_ADMIN_ROLE: &str = "clusterAdmin";

/// When the record should be looked at again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    Now,
    After(Duration),
    /// Converged; only a change (or the periodic resync) brings it back
    AwaitChange,
}

/// What a phase handler decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Phase to persist; `None` keeps the current one
    pub phase: Option<ClusterPhase>,
    pub requeue: Requeue,
}

impl Step {
    /// Move to `phase` and look again right away
    pub fn to(phase: ClusterPhase) -> Self {
        Self {
            phase: Some(phase),
            requeue: Requeue::Now,
        }
    }

    /// Keep the current phase
    pub fn stay(requeue: Requeue) -> Self {
        Self { phase: None, requeue }
    }

    pub fn then(mut self, requeue: Requeue) -> Self {
        self.requeue = requeue;
        self
    }
}

/// Result of one pass: the latest known record plus the pass result.
///
/// `config` is `None` when the record is being deleted and nothing may be
/// persisted for it.
#[derive(Debug)]
pub struct PassOutcome {
    pub config: Option<AKSClusterConfig>,
    pub result: Result<Requeue, ControllerError>,
}

impl PassOutcome {
    fn failed(config: AKSClusterConfig, error: ControllerError) -> Self {
        Self {
            config: Some(config),
            result: Err(error),
        }
    }
}

/// Drives AKSClusterConfigs through their phases
#[derive(Clone)]
pub struct Reconciler {
    configs: Arc<dyn ClusterConfigStore>,
    secrets: Arc<dyn SecretStore>,
    resolver: ClientResolver,
    poll_interval: Duration,
}

impl Reconciler {
    pub fn new(
        configs: Arc<dyn ClusterConfigStore>,
        secrets: Arc<dyn SecretStore>,
        resolver: ClientResolver,
        poll_interval: Duration,
    ) -> Self {
        Self {
            configs,
            secrets,
            resolver,
            poll_interval,
        }
    }

    /// One reconciliation pass for a changed record
    pub async fn on_change(&self, config: AKSClusterConfig) -> PassOutcome {
        if config.meta().deletion_timestamp.is_some() {
            return PassOutcome {
                config: None,
                result: Ok(Requeue::AwaitChange),
            };
        }

        let phase = match config.phase() {
            Ok(phase) => phase,
            Err(e) => return PassOutcome::failed(config, e.into()),
        };
        debug!("Reconciling cluster [{}] in phase [{}]", config.spec.cluster_name, phase);

        let step = match phase {
            ClusterPhase::NotCreated => self.create_cluster(&config).await,
            ClusterPhase::Creating => self.wait_for_cluster(&config).await,
            ClusterPhase::Importing => self.import_cluster(&config).await,
            ClusterPhase::Active | ClusterPhase::Updating => self.check_and_update(&config, phase).await,
        };

        match step {
            Ok(step) => self.persist_phase(config, phase, step).await,
            Err(e) => PassOutcome::failed(config, e),
        }
    }

    /// Write the step's phase when it differs from the current one
    async fn persist_phase(&self, config: AKSClusterConfig, current: ClusterPhase, step: Step) -> PassOutcome {
        let Some(next) = step.phase.filter(|next| *next != current) else {
            return PassOutcome {
                config: Some(config),
                result: Ok(step.requeue),
            };
        };

        let mut updated = config.clone();
        updated.set_phase(next);
        match self.configs.update_status(&updated).await {
            Ok(stored) => PassOutcome {
                config: Some(stored),
                result: Ok(step.requeue),
            },
            Err(e) => PassOutcome::failed(config, e),
        }
    }

    /// Create the resource group of `spec` unless it already exists
    async fn ensure_resource_group(
        &self,
        clients: &AzureClients,
        spec: &AKSClusterConfigSpec,
        failure: String,
    ) -> Result<(), ControllerError> {
        info!("Checking if resource group [{}] exists", spec.resource_group);
        match clients.resource_groups.exists(&spec.resource_group).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            // Creating is idempotent, so an inconclusive lookup falls through
            Err(e) => warn!("Could not check resource group [{}]: {}", spec.resource_group, e),
        }

        info!(
            "Creating resource group [{}] for cluster [{}]",
            spec.resource_group, spec.cluster_name
        );
        let group = ResourceGroup {
            location: spec.resource_location.clone(),
            ..Default::default()
        };
        clients
            .resource_groups
            .create_or_update(&spec.resource_group, &group)
            .await
            .map_err(ControllerError::azure_step(failure))?;
        info!("Resource group [{}] created successfully", spec.resource_group);
        Ok(())
    }

    /// Workspace resource ID for the monitoring addon, when monitoring is on
    async fn monitoring_workspace(
        &self,
        clients: &AzureClients,
        spec: &AKSClusterConfigSpec,
    ) -> Result<Option<String>, ControllerError> {
        if spec.monitoring != Some(true) {
            return Ok(None);
        }
        let workspace_name = spec
            .log_analytics_workspace_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&spec.cluster_name);
        let id = check_log_analytics_workspace_for_monitoring(
            clients.workspaces.as_ref(),
            &spec.resource_location,
            &spec.resource_group,
            spec.log_analytics_workspace_group.as_deref().unwrap_or_default(),
            workspace_name,
        )
        .await?;
        Ok(Some(id))
    }

    /// Store the cluster endpoint and CA in a Secret named after the record
    async fn create_ca_secret(&self, config: &AKSClusterConfig, clients: &AzureClients) -> Result<(), ControllerError> {
        let spec = &config.spec;
        let kubeconfig = clients
            .clusters
            .get_access_profile(&spec.resource_group, &spec.cluster_name, CLUSTER_ADMIN_ROLE)
            .await?;
        let (endpoint, ca) = parse_admin_kubeconfig(&spec.cluster_name, &kubeconfig)?;

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(config.name_any()),
                namespace: Some(namespace_of(config)),
                owner_references: config.owner_ref(&()).map(|owner| vec![owner]),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                ("endpoint".to_string(), ByteString(endpoint.into_bytes())),
                ("ca".to_string(), ByteString(ca.into_bytes())),
            ])),
            ..Default::default()
        };
        if self.secrets.create(&secret).await? == SecretCreation::AlreadyExists {
            debug!("Secret [{}] for cluster [{}] already exists", config.name_any(), spec.cluster_name);
        }
        Ok(())
    }
}

/// API server endpoint and base64 CA from an admin kubeconfig
pub fn parse_admin_kubeconfig(cluster: &str, raw: &[u8]) -> Result<(String, String), ControllerError> {
    let invalid = |message: String| ControllerError::Kubeconfig {
        cluster: cluster.to_string(),
        message,
    };

    let text = std::str::from_utf8(raw).map_err(|e| invalid(e.to_string()))?;
    let kubeconfig = Kubeconfig::from_yaml(text).map_err(|e| invalid(e.to_string()))?;

    let current_cluster = kubeconfig.current_context.as_deref().and_then(|current| {
        kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == current)
            .and_then(|c| c.context.as_ref())
            .map(|c| c.cluster.clone())
    });
    let entry = kubeconfig
        .clusters
        .iter()
        .find(|c| Some(&c.name) == current_cluster.as_ref())
        .or_else(|| kubeconfig.clusters.first())
        .and_then(|c| c.cluster.as_ref())
        .ok_or_else(|| invalid("no cluster entry".to_string()))?;

    let endpoint = entry
        .server
        .clone()
        .ok_or_else(|| invalid("cluster entry has no server".to_string()))?;
    let ca = entry
        .certificate_authority_data
        .as_deref()
        .ok_or_else(|| invalid("cluster entry has no certificate-authority-data".to_string()))?;
    let ca = STANDARD.decode(ca.trim()).map_err(|e| invalid(e.to_string()))?;
    Ok((endpoint, STANDARD.encode(ca)))
}
