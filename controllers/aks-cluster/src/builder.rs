//! Create-or-update payloads built from an AKSClusterConfigSpec.

use aks_client::{
    AddonProfile, AgentPool, AgentPoolProfile, ApiServerAccessProfile, Credentials, LinuxProfile,
    ManagedCluster, ManagedClusterProperties, NetworkProfile, ServicePrincipalProfile,
    SshConfiguration, SshPublicKey,
};
use crds::{AKSClusterConfigSpec, AKSNodePool};
use std::collections::HashMap;

pub const HTTP_APPLICATION_ROUTING_ADDON: &str = "httpApplicationRouting";
pub const MONITORING_ADDON: &str = "omsagent";
pub const WORKSPACE_RESOURCE_ID_KEY: &str = "logAnalyticsWorkspaceResourceID";

const VIRTUAL_MACHINE_SCALE_SETS: &str = "VirtualMachineScaleSets";
const KUBENET: &str = "kubenet";
const DEFAULT_LOAD_BALANCER_SKU: &str = "standard";

/// Subnet resource ID when both a virtual network and a subnet are set
fn subnet_id(spec: &AKSClusterConfigSpec, subscription_id: &str) -> Option<String> {
    let network = spec.virtual_network.as_deref().filter(|n| !n.is_empty())?;
    let subnet = spec.subnet.as_deref().filter(|s| !s.is_empty())?;
    let group = spec
        .virtual_network_resource_group
        .as_deref()
        .filter(|g| !g.is_empty())
        .unwrap_or(&spec.resource_group);
    Some(format!(
        "/subscriptions/{subscription_id}/resourceGroups/{group}/providers/Microsoft.Network/virtualNetworks/{network}/subnets/{subnet}"
    ))
}

/// Agent pool profile for one node pool
pub fn build_agent_pool_profile(spec: &AKSClusterConfigSpec, pool: &AKSNodePool, subscription_id: &str) -> AgentPoolProfile {
    let autoscaling = pool.enable_auto_scaling == Some(true);
    AgentPoolProfile {
        name: pool.name.clone(),
        count: pool.count,
        vm_size: Some(pool.vm_size.clone()),
        os_disk_size_gb: pool.os_disk_size_gb,
        os_disk_type: Some(pool.os_disk_type.clone()),
        vnet_subnet_id: subnet_id(spec, subscription_id),
        max_pods: pool.max_pods,
        os_type: Some(pool.os_type.clone()),
        max_count: if autoscaling { pool.max_count } else { None },
        min_count: if autoscaling { pool.min_count } else { None },
        enable_auto_scaling: pool.enable_auto_scaling,
        pool_type: Some(VIRTUAL_MACHINE_SCALE_SETS.to_string()),
        mode: Some(pool.mode.clone()),
        orchestrator_version: pool.orchestrator_version.clone(),
        provisioning_state: None,
        availability_zones: pool.availability_zones.clone(),
    }
}

/// Agent pool create-or-update payload
pub fn build_agent_pool(spec: &AKSClusterConfigSpec, pool: &AKSNodePool, subscription_id: &str) -> AgentPool {
    let mut profile = build_agent_pool_profile(spec, pool, subscription_id);
    // The pool name lives in the URL for agent pool calls
    profile.name = None;
    AgentPool {
        id: None,
        name: None,
        properties: Some(profile),
    }
}

fn network_profile(spec: &AKSClusterConfigSpec) -> NetworkProfile {
    let plugin = spec
        .network_plugin
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| KUBENET.to_string());
    let pod_cidr = if plugin == KUBENET { spec.network_pod_cidr.clone() } else { None };
    NetworkProfile {
        network_policy: spec.network_policy.clone().filter(|p| !p.is_empty()),
        pod_cidr,
        service_cidr: spec.network_service_cidr.clone(),
        dns_service_ip: spec.network_dns_service_ip.clone(),
        docker_bridge_cidr: spec.network_docker_bridge_cidr.clone(),
        load_balancer_sku: Some(
            spec.load_balancer_sku
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_LOAD_BALANCER_SKU.to_string()),
        ),
        network_plugin: Some(plugin),
    }
}

fn linux_profile(spec: &AKSClusterConfigSpec) -> Option<LinuxProfile> {
    let admin_username = spec.linux_admin_username.as_deref().filter(|u| !u.is_empty())?;
    let key_data = spec.linux_ssh_public_key.as_deref().filter(|k| !k.is_empty())?;
    Some(LinuxProfile {
        admin_username: admin_username.to_string(),
        ssh: SshConfiguration {
            public_keys: vec![SshPublicKey {
                key_data: key_data.to_string(),
            }],
        },
    })
}

fn addon_profiles(spec: &AKSClusterConfigSpec, workspace_id: Option<String>) -> HashMap<String, AddonProfile> {
    let mut addons = HashMap::new();
    if let Some(enabled) = spec.http_application_routing {
        addons.insert(
            HTTP_APPLICATION_ROUTING_ADDON.to_string(),
            AddonProfile { enabled, config: None },
        );
    }
    match spec.monitoring {
        Some(true) => {
            let config = workspace_id.map(|id| HashMap::from([(WORKSPACE_RESOURCE_ID_KEY.to_string(), id)]));
            addons.insert(MONITORING_ADDON.to_string(), AddonProfile { enabled: true, config });
        }
        Some(false) => {
            addons.insert(
                MONITORING_ADDON.to_string(),
                AddonProfile {
                    enabled: false,
                    config: None,
                },
            );
        }
        None => {}
    }
    addons
}

/// Managed cluster payload. `workspace_id` is the log analytics workspace
/// backing the monitoring addon, when monitoring is enabled.
pub fn build_managed_cluster(
    spec: &AKSClusterConfigSpec,
    credentials: &Credentials,
    workspace_id: Option<String>,
) -> ManagedCluster {
    let agent_pools = spec
        .node_pools
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|pool| build_agent_pool_profile(spec, pool, &credentials.subscription_id))
        .collect();

    let dns_prefix = spec
        .dns_prefix
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| format!("{}-dns", spec.cluster_name));

    let api_server_access_profile = (spec.private_cluster.is_some() || spec.authorized_ip_ranges.is_some())
        .then(|| ApiServerAccessProfile {
            authorized_ip_ranges: spec.authorized_ip_ranges.clone(),
            enable_private_cluster: spec.private_cluster,
        });

    ManagedCluster {
        id: None,
        name: None,
        location: Some(spec.resource_location.clone()),
        tags: spec
            .tags
            .as_ref()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        properties: Some(ManagedClusterProperties {
            provisioning_state: None,
            kubernetes_version: spec.kubernetes_version.clone(),
            dns_prefix: Some(dns_prefix),
            fqdn: None,
            agent_pool_profiles: Some(agent_pools),
            linux_profile: linux_profile(spec),
            service_principal_profile: Some(ServicePrincipalProfile {
                client_id: credentials.client_id.clone(),
                secret: Some(credentials.client_secret.clone()),
            }),
            addon_profiles: Some(addon_profiles(spec, workspace_id)),
            network_profile: Some(network_profile(spec)),
            api_server_access_profile,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_credentials, user_pool, valid_spec, TEST_SUBSCRIPTION};

    #[test]
    fn test_defaults_for_minimal_spec() {
        let spec = AKSClusterConfigSpec {
            network_plugin: None,
            network_pod_cidr: Some("10.244.0.0/16".to_string()),
            ..valid_spec()
        };
        let cluster = build_managed_cluster(&spec, &test_credentials(), None);
        let properties = cluster.properties.unwrap();

        assert_eq!(cluster.location.as_deref(), Some("eastus"));
        assert_eq!(properties.dns_prefix.as_deref(), Some("prod-dns"));
        let network = properties.network_profile.unwrap();
        assert_eq!(network.network_plugin.as_deref(), Some("kubenet"));
        assert_eq!(network.pod_cidr.as_deref(), Some("10.244.0.0/16"));
        assert_eq!(network.load_balancer_sku.as_deref(), Some("standard"));
        assert!(properties.linux_profile.is_none());
        assert!(properties.api_server_access_profile.is_none());
        assert_eq!(properties.service_principal_profile.unwrap().client_id, "client-id");
    }

    #[test]
    fn test_pod_cidr_only_for_kubenet() {
        let spec = AKSClusterConfigSpec {
            network_plugin: Some("azure".to_string()),
            network_pod_cidr: Some("10.244.0.0/16".to_string()),
            ..valid_spec()
        };
        let cluster = build_managed_cluster(&spec, &test_credentials(), None);
        assert_eq!(cluster.properties.unwrap().network_profile.unwrap().pod_cidr, None);
    }

    #[test]
    fn test_agent_pool_subnet_and_autoscaling() {
        let spec = AKSClusterConfigSpec {
            virtual_network: Some("vnet".to_string()),
            subnet: Some("nodes".to_string()),
            virtual_network_resource_group: Some("network-rg".to_string()),
            ..valid_spec()
        };
        let pool = AKSNodePool {
            enable_auto_scaling: Some(false),
            min_count: Some(1),
            max_count: Some(5),
            ..user_pool("user")
        };
        let profile = build_agent_pool_profile(&spec, &pool, TEST_SUBSCRIPTION);
        assert_eq!(
            profile.vnet_subnet_id.unwrap(),
            format!(
                "/subscriptions/{TEST_SUBSCRIPTION}/resourceGroups/network-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/nodes"
            )
        );
        assert_eq!(profile.pool_type.as_deref(), Some("VirtualMachineScaleSets"));
        assert_eq!((profile.min_count, profile.max_count), (None, None));

        let autoscaled = AKSNodePool {
            enable_auto_scaling: Some(true),
            ..pool
        };
        let profile = build_agent_pool_profile(&spec, &autoscaled, TEST_SUBSCRIPTION);
        assert_eq!((profile.min_count, profile.max_count), (Some(1), Some(5)));
    }

    #[test]
    fn test_monitoring_addon_carries_workspace() {
        let spec = AKSClusterConfigSpec {
            monitoring: Some(true),
            http_application_routing: Some(false),
            ..valid_spec()
        };
        let cluster = build_managed_cluster(&spec, &test_credentials(), Some("/ws/id".to_string()));
        let addons = cluster.properties.unwrap().addon_profiles.unwrap();
        let oms = &addons[MONITORING_ADDON];
        assert!(oms.enabled);
        assert_eq!(oms.config.as_ref().unwrap()[WORKSPACE_RESOURCE_ID_KEY], "/ws/id");
        assert!(!addons[HTTP_APPLICATION_ROUTING_ADDON].enabled);
    }

    #[test]
    fn test_linux_profile_needs_user_and_key() {
        let spec = AKSClusterConfigSpec {
            linux_admin_username: Some("azureuser".to_string()),
            ..valid_spec()
        };
        let cluster = build_managed_cluster(&spec, &test_credentials(), None);
        assert!(cluster.properties.unwrap().linux_profile.is_none());

        let spec = AKSClusterConfigSpec {
            linux_ssh_public_key: Some("ssh-rsa AAAA".to_string()),
            ..spec
        };
        let cluster = build_managed_cluster(&spec, &test_credentials(), None);
        let linux = cluster.properties.unwrap().linux_profile.unwrap();
        assert_eq!(linux.ssh.public_keys[0].key_data, "ssh-rsa AAAA");
    }
}
