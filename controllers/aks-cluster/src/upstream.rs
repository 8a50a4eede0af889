//! Upstream cluster state.
//!
//! Projects a live managed cluster into the AKSClusterConfigSpec shape so it
//! can be compared field by field with the desired spec. Identity fields
//! (name, group, location, credentials) are left empty.

use crate::builder::{HTTP_APPLICATION_ROUTING_ADDON, MONITORING_ADDON, WORKSPACE_RESOURCE_ID_KEY};
use crate::error::ControllerError;
use aks_client::{AgentPoolProfile, ManagedCluster};
use crds::{AKSClusterConfigSpec, AKSNodePool};
use regex::Regex;
use std::sync::LazyLock;

// Literal patterns; compilation is covered by the unit tests
#[allow(clippy::expect_used)]
static WORKSPACE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/resourcegroups/([^/]+)/").expect("valid resource group pattern"));
#[allow(clippy::expect_used)]
static WORKSPACE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/workspaces/([^/]+)").expect("valid workspace name pattern"));

fn capture(pattern: &Regex, resource_id: &str) -> Option<String> {
    pattern
        .captures(resource_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resource group and name of a log analytics workspace resource ID
pub fn parse_workspace_resource_id(resource_id: &str) -> Result<(String, String), ControllerError> {
    match (capture(&WORKSPACE_GROUP, resource_id), capture(&WORKSPACE_NAME, resource_id)) {
        (Some(group), Some(name)) => Ok((group, name)),
        _ => Err(ControllerError::WorkspaceResourceId(resource_id.to_string())),
    }
}

fn upstream_node_pool(profile: &AgentPoolProfile) -> AKSNodePool {
    let mut pool = AKSNodePool {
        name: profile.name.clone(),
        count: profile.count,
        max_pods: profile.max_pods,
        vm_size: profile.vm_size.clone().unwrap_or_default(),
        os_disk_size_gb: profile.os_disk_size_gb,
        os_disk_type: profile.os_disk_type.clone().unwrap_or_default(),
        mode: profile.mode.clone().unwrap_or_default(),
        os_type: profile.os_type.clone().unwrap_or_default(),
        orchestrator_version: profile.orchestrator_version.clone(),
        availability_zones: profile.availability_zones.clone(),
        ..Default::default()
    };
    // Bounds are meaningless unless Azure reports the autoscaler setting
    if profile.enable_auto_scaling.is_some() {
        pool.enable_auto_scaling = profile.enable_auto_scaling;
        pool.min_count = profile.min_count;
        pool.max_count = profile.max_count;
    }
    pool
}

/// Build the upstream spec for `cluster_name` from the live cluster
pub fn build_upstream_cluster_state(
    cluster_name: &str,
    cluster: &ManagedCluster,
) -> Result<AKSClusterConfigSpec, ControllerError> {
    let properties = cluster.properties.clone().unwrap_or_default();

    let kubernetes_version = properties
        .kubernetes_version
        .clone()
        .ok_or_else(|| ControllerError::MissingKubernetesVersion(cluster_name.to_string()))?;

    let mut upstream = AKSClusterConfigSpec {
        kubernetes_version: Some(kubernetes_version),
        dns_prefix: properties.dns_prefix.clone(),
        tags: Some(cluster.tags.clone().unwrap_or_default().into_iter().collect()),
        node_pools: Some(cluster.agent_pools().iter().map(upstream_node_pool).collect()),
        private_cluster: Some(false),
        ..Default::default()
    };

    if let Some(network) = properties.network_profile {
        upstream.network_plugin = Some(network.network_plugin.unwrap_or_default());
        upstream.network_policy = Some(network.network_policy.unwrap_or_default());
        upstream.load_balancer_sku = Some(network.load_balancer_sku.unwrap_or_default());
        upstream.network_dns_service_ip = network.dns_service_ip;
        upstream.network_docker_bridge_cidr = network.docker_bridge_cidr;
        upstream.network_service_cidr = network.service_cidr;
        upstream.network_pod_cidr = network.pod_cidr;
    }

    if let Some(linux) = properties.linux_profile {
        upstream.linux_admin_username = Some(linux.admin_username);
        upstream.linux_ssh_public_key = linux.ssh.public_keys.into_iter().next().map(|k| k.key_data);
    }

    let addons = properties.addon_profiles.unwrap_or_default();
    if let Some(routing) = addons.get(HTTP_APPLICATION_ROUTING_ADDON) {
        upstream.http_application_routing = Some(routing.enabled);
    }
    if let Some(oms) = addons.get(MONITORING_ADDON) {
        upstream.monitoring = Some(oms.enabled);
        let resource_id = oms.config.as_ref().and_then(|c| c.get(WORKSPACE_RESOURCE_ID_KEY));
        if let Some(resource_id) = resource_id {
            let (group, name) = parse_workspace_resource_id(resource_id)?;
            upstream.log_analytics_workspace_group = Some(group);
            upstream.log_analytics_workspace_name = Some(name);
        }
    }

    if let Some(access) = properties.api_server_access_profile {
        if access.enable_private_cluster.is_some() {
            upstream.private_cluster = access.enable_private_cluster;
        }
        upstream.authorized_ip_ranges = access.authorized_ip_ranges;
    }

    Ok(upstream)
}
