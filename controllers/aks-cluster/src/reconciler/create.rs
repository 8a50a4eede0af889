//! Not-created, creating and importing phases.

use super::{Reconciler, Requeue, Step};
use crate::builder::build_managed_cluster;
use crate::error::{ControllerError, ValidationError};
use crate::store::namespace_of;
use crate::validation::validate_spec;
use aks_client::ProvisioningState;
use crds::{AKSClusterConfig, ClusterPhase};
use kube::ResourceExt;
use tracing::info;

impl Reconciler {
    /// Checks that need the API server or the credential Secret, on top of
    /// the static spec rules
    pub(super) async fn validate_config(&self, config: &AKSClusterConfig) -> Result<(), ControllerError> {
        validate_spec(&config.spec)?;

        let name = config.name_any();
        let duplicate = self
            .configs
            .list(&namespace_of(config))
            .await?
            .iter()
            .any(|other| other.spec.cluster_name == config.spec.cluster_name && other.name_any() != name);
        if duplicate {
            return Err(ValidationError::DuplicateClusterName(config.spec.cluster_name.clone()).into());
        }

        self.resolver.credentials(config).await?;
        Ok(())
    }

    /// Validate, then either hand over to import or issue the initial
    /// create-or-update
    pub(super) async fn create_cluster(&self, config: &AKSClusterConfig) -> Result<Step, ControllerError> {
        self.validate_config(config).await?;

        let spec = &config.spec;
        if spec.imported {
            return Ok(Step::to(ClusterPhase::Importing));
        }

        info!("Creating cluster [{}]", spec.cluster_name);
        let clients = self.resolver.clients(config).await?;
        self.ensure_resource_group(
            &clients,
            spec,
            format!("error creating resource group [{}] with message", spec.resource_group),
        )
        .await?;

        let workspace_id = self.monitoring_workspace(&clients, spec).await?;
        let cluster = build_managed_cluster(spec, &clients.credentials, workspace_id);
        clients
            .clusters
            .create_or_update(&spec.resource_group, &spec.cluster_name, &cluster)
            .await
            .map_err(ControllerError::azure_step("error failed to create cluster:"))?;

        Ok(Step::to(ClusterPhase::Creating))
    }

    /// Poll the create started by [`Reconciler::create_cluster`]
    pub(super) async fn wait_for_cluster(&self, config: &AKSClusterConfig) -> Result<Step, ControllerError> {
        let spec = &config.spec;
        let clients = self.resolver.clients(config).await?;
        let cluster = clients.clusters.get(&spec.resource_group, &spec.cluster_name).await?;

        match cluster.provisioning_state() {
            Some(ProvisioningState::Failed) => Err(ControllerError::ClusterFailed(format!(
                "creation for cluster [{}] status: Failed",
                spec.cluster_name
            ))),
            Some(ProvisioningState::Succeeded) => {
                self.create_ca_secret(config, &clients).await?;
                info!("Cluster [{}] created successfully", spec.cluster_name);
                Ok(Step::to(ClusterPhase::Active))
            }
            _ => {
                info!("Waiting for cluster [{}] to finish creating", config.name_any());
                Ok(Step::stay(Requeue::After(self.poll_interval)))
            }
        }
    }

    /// Adopt an existing cluster by recording its endpoint and CA
    pub(super) async fn import_cluster(&self, config: &AKSClusterConfig) -> Result<Step, ControllerError> {
        info!("Importing config for cluster [{}]", config.spec.cluster_name);
        let clients = self.resolver.clients(config).await?;
        self.create_ca_secret(config, &clients).await?;
        Ok(Step::to(ClusterPhase::Active))
    }
}
