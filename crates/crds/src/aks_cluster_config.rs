//! AKSClusterConfig CRD
//!
//! Desired state of an Azure Kubernetes Service cluster and its node pools.
//! The spec is authored by the user; the status is owned by the controller.

use crate::phase::{ClusterPhase, UnknownPhase};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node pool mode that hosts critical system pods
pub const SYSTEM_MODE: &str = "System";

/// AKSClusterConfigSpec defines the desired state of an AKS cluster
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "aks.microscaler.io",
    version = "v1",
    kind = "AKSClusterConfig",
    namespaced,
    status = "AKSClusterConfigStatus",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.clusterName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterConfigSpec {
    /// Adopt an existing cluster instead of creating one. Imported clusters
    /// are never deleted by the controller.
    #[serde(default)]
    pub imported: bool,

    /// Credential secret reference, `namespace:name` or `name`
    #[serde(default)]
    pub azure_credential_secret: String,

    /// Azure region (e.g. "eastus")
    #[serde(default)]
    pub resource_location: String,

    /// Resource group holding the cluster
    #[serde(default)]
    pub resource_group: String,

    /// Cluster name in Azure; unique per namespace across AKSClusterConfigs
    #[serde(default)]
    pub cluster_name: String,

    /// Resource Manager endpoint override
    #[serde(rename = "baseUrl", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Active Directory endpoint override
    #[serde(rename = "authBaseUrl", default, skip_serializing_if = "Option::is_none")]
    pub auth_base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,

    /// Node pools. When absent, node pools are not converged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_pools: Option<Vec<AKSNodePool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_cluster: Option<bool>,

    /// CIDRs allowed to reach the API server
    #[serde(rename = "authorizedIpRanges", default, skip_serializing_if = "Option::is_none")]
    pub authorized_ip_ranges: Option<Vec<String>>,

    /// "kubenet" or "azure"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin: Option<String>,

    /// "azure" or "calico"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<String>,

    #[serde(rename = "networkDNSServiceIP", default, skip_serializing_if = "Option::is_none")]
    pub network_dns_service_ip: Option<String>,

    #[serde(rename = "networkDockerBridgeCIDR", default, skip_serializing_if = "Option::is_none")]
    pub network_docker_bridge_cidr: Option<String>,

    #[serde(rename = "networkServiceCIDR", default, skip_serializing_if = "Option::is_none")]
    pub network_service_cidr: Option<String>,

    #[serde(rename = "networkPodCIDR", default, skip_serializing_if = "Option::is_none")]
    pub network_pod_cidr: Option<String>,

    /// "basic" or "standard"
    #[serde(rename = "loadBalancerSku", default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,

    /// Resource group of `virtualNetwork` (defaults to `resourceGroup`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network_resource_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_admin_username: Option<String>,

    #[serde(rename = "linuxSSHPublicKey", default, skip_serializing_if = "Option::is_none")]
    pub linux_ssh_public_key: Option<String>,

    /// HTTP application routing addon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_application_routing: Option<bool>,

    /// Container monitoring addon (omsagent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<bool>,

    /// Resource group of the log analytics workspace used by monitoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_analytics_workspace_group: Option<String>,

    /// Log analytics workspace used by monitoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_analytics_workspace_name: Option<String>,

    /// Azure tags applied to the managed cluster; unset leaves Azure tags alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// A node pool (AKS agent pool) of the cluster. Identity is `name`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AKSNodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<i32>,

    #[serde(default)]
    pub vm_size: String,

    #[serde(rename = "osDiskSizeGB", default, skip_serializing_if = "Option::is_none")]
    pub os_disk_size_gb: Option<i32>,

    /// "Managed" or "Ephemeral"
    #[serde(default)]
    pub os_disk_type: String,

    /// "System" or "User"
    #[serde(default)]
    pub mode: String,

    /// Only "Linux" is supported
    #[serde(default)]
    pub os_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_scaling: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i32>,
}

/// AKSClusterConfigStatus defines the observed state of an AKS cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterConfigStatus {
    /// Lifecycle phase ("", "creating", "active", "updating", "importing")
    #[serde(default)]
    pub phase: String,

    /// Error from the last reconciliation; empty once a pass succeeds
    #[serde(default)]
    pub failure_message: String,
}

impl AKSClusterConfig {
    /// Current phase. A missing status means the cluster was never created.
    pub fn phase(&self) -> Result<ClusterPhase, UnknownPhase> {
        match &self.status {
            Some(status) => status.phase.parse(),
            None => Ok(ClusterPhase::NotCreated),
        }
    }

    /// Set the phase, creating the status if needed
    pub fn set_phase(&mut self, phase: ClusterPhase) {
        self.status.get_or_insert_with(Default::default).phase = phase.as_str().to_string();
    }

    /// Failure message currently stored on the status
    pub fn failure_message(&self) -> &str {
        self.status.as_ref().map_or("", |s| s.failure_message.as_str())
    }

    /// Replace the stored failure message, creating the status if needed
    pub fn set_failure_message(&mut self, message: impl Into<String>) {
        self.status.get_or_insert_with(Default::default).failure_message = message.into();
    }
}
