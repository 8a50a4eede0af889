//! Removal workflow, run once when an AKSClusterConfig is deleted.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{AKSClusterConfig, ClusterPhase};
use kube::ResourceExt;
use tracing::{info, warn};

impl Reconciler {
    /// Delete the Azure cluster behind `config` if this controller created it.
    ///
    /// Imported clusters and records that never left `not-created` are left
    /// alone. The resource group is never deleted.
    pub async fn on_remove(&self, config: &AKSClusterConfig) -> Result<(), ControllerError> {
        let spec = &config.spec;
        if spec.imported {
            info!("Cluster [{}] is imported, will not delete AKS cluster", spec.cluster_name);
            return Ok(());
        }
        if config.phase()? == ClusterPhase::NotCreated {
            warn!(
                "Cluster [{}] never advanced to creating status, will not delete AKS cluster",
                config.name_any()
            );
            return Ok(());
        }

        info!("Removing cluster [{}]", spec.cluster_name);
        let clients = self.resolver.clients(config).await?;
        let removal_failed = || format!("error removing cluster [{}] message", spec.cluster_name);

        match clients.clusters.get(&spec.resource_group, &spec.cluster_name).await {
            Ok(_) => {
                let operation = clients
                    .clusters
                    .delete(&spec.resource_group, &spec.cluster_name)
                    .await
                    .map_err(ControllerError::azure_step(removal_failed()))?;
                clients
                    .clusters
                    .wait_for_completion(&operation)
                    .await
                    .map_err(ControllerError::azure_step(removal_failed()))?;
                info!("Cluster [{}] was removed successfully", spec.cluster_name);
            }
            Err(e) if e.is_not_found() => {
                info!("Cluster [{}] no longer exists in Azure", spec.cluster_name);
            }
            Err(e) => return Err(ControllerError::azure_step(removal_failed())(e)),
        }

        info!(
            "Resource group [{}] for cluster [{}] still exists, please remove it if needed",
            spec.resource_group, spec.cluster_name
        );
        Ok(())
    }
}
