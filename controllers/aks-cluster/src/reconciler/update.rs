//! Active and updating phases: wait out busy states, then converge drift one
//! change at a time.

use super::{Reconciler, Requeue, Step};
use crate::builder::{build_agent_pool, build_managed_cluster};
use crate::drift::{next_change, Change};
use crate::error::ControllerError;
use crate::upstream::build_upstream_cluster_state;
use aks_client::{AzureClients, ProvisioningState, TagsObject};
use crds::{AKSClusterConfig, AKSClusterConfigSpec, ClusterPhase};
use kube::ResourceExt;
use tracing::info;

impl Reconciler {
    pub(super) async fn check_and_update(
        &self,
        config: &AKSClusterConfig,
        phase: ClusterPhase,
    ) -> Result<Step, ControllerError> {
        let spec = &config.spec;
        let clients = self.resolver.clients(config).await?;
        let cluster = clients.clusters.get(&spec.resource_group, &spec.cluster_name).await?;
        let busy = Step::to(ClusterPhase::Updating).then(Requeue::After(self.poll_interval));

        match cluster.provisioning_state() {
            Some(ProvisioningState::Failed) => {
                return Err(ControllerError::ClusterFailed(format!(
                    "update failed for cluster [{}], status: Failed",
                    spec.cluster_name
                )));
            }
            Some(state) if state.is_cluster_busy() => {
                info!("Waiting for cluster [{}] to finish updating", config.name_any());
                return Ok(busy);
            }
            _ => {}
        }

        for pool in cluster.agent_pools() {
            let Some(state) = pool.provisioning_state().filter(ProvisioningState::is_node_pool_busy) else {
                continue;
            };
            let pool_name = pool.name.as_deref().unwrap_or_default();
            if state == ProvisioningState::Deleting {
                info!("Waiting for cluster [{}] to delete node pool [{}]", config.name_any(), pool_name);
            } else {
                info!("Waiting for cluster [{}] to update node pool [{}]", config.name_any(), pool_name);
            }
            return Ok(busy);
        }

        info!("Checking configuration for cluster [{}]", spec.cluster_name);
        let upstream = build_upstream_cluster_state(&spec.cluster_name, &cluster)?;
        match next_change(spec, &upstream)? {
            Some(change) => {
                self.apply_change(&clients, spec, &upstream, change).await?;
                Ok(Step::to(ClusterPhase::Updating))
            }
            None if phase != ClusterPhase::Active => {
                info!("Cluster [{}] finished updating", config.name_any());
                Ok(Step::to(ClusterPhase::Active).then(Requeue::AwaitChange))
            }
            None => {
                info!("Configuration for cluster [{}] was verified", spec.cluster_name);
                Ok(Step::stay(Requeue::AwaitChange))
            }
        }
    }

    /// Issue the single Azure mutation for `change`
    async fn apply_change(
        &self,
        clients: &AzureClients,
        spec: &AKSClusterConfigSpec,
        upstream: &AKSClusterConfigSpec,
        change: Change,
    ) -> Result<(), ControllerError> {
        let (group, name) = (&spec.resource_group, &spec.cluster_name);
        match change {
            Change::Tags(tags) => {
                let tags = TagsObject {
                    tags: tags.into_iter().collect(),
                };
                clients.clusters.update_tags(group, name, &tags).await?;
            }
            Change::CreateOrUpdateNodePool(pool) => {
                let pool_name = pool.name.clone().unwrap_or_default();
                let payload = build_agent_pool(spec, &pool, &clients.credentials.subscription_id);
                clients
                    .agent_pools
                    .create_or_update(group, name, &pool_name, &payload)
                    .await
                    .map_err(ControllerError::azure_step("failed to update cluster:"))?;
            }
            Change::RemoveNodePool(pool_name) => {
                clients
                    .agent_pools
                    .delete(group, name, &pool_name)
                    .await
                    .map_err(ControllerError::azure_step("failed to remove node pool:"))?;
            }
            Change::Cluster(drift) => {
                info!("Updating cluster [{}]: {:?}", name, drift);
                self.ensure_resource_group(clients, spec, "error during updating resource group".to_string())
                    .await?;
                let workspace_id = self.monitoring_workspace(clients, spec).await?;

                // Unmanaged node pools are sent back as Azure reports them
                let mut desired = spec.clone();
                if desired.node_pools.is_none() {
                    desired.node_pools = upstream.node_pools.clone();
                }
                let cluster = build_managed_cluster(&desired, &clients.credentials, workspace_id);
                clients
                    .clusters
                    .create_or_update(group, name, &cluster)
                    .await
                    .map_err(ControllerError::azure_step("failed to update cluster:"))?;
            }
        }
        Ok(())
    }
}
