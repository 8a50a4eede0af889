//! Spec validation performed before any call to Azure.
//!
//! Node pool rules are checked first so that a missing System pool or a
//! Windows pool is always reported with the same fixed error, whatever else
//! is wrong with the spec.

use crate::error::ValidationError;
use crds::{AKSClusterConfigSpec, AKSNodePool, SYSTEM_MODE};
use std::collections::HashSet;

const WINDOWS: &str = "Windows";
const NETWORK_POLICIES: [&str; 2] = ["azure", "calico"];

/// Static checks on a spec. Imported clusters only need enough to locate
/// the existing cluster.
pub fn validate_spec(spec: &AKSClusterConfigSpec) -> Result<(), ValidationError> {
    let cluster = spec.cluster_name.as_str();
    let missing = |field: &'static str| ValidationError::MissingField {
        field,
        cluster: cluster.to_string(),
    };

    if !spec.imported {
        validate_node_pool_modes(spec.node_pools.as_deref().unwrap_or_default())?;
    }

    if spec.resource_location.is_empty() {
        return Err(missing("resourceLocation"));
    }
    if spec.resource_group.is_empty() {
        return Err(missing("resourceGroup"));
    }
    if spec.cluster_name.is_empty() {
        return Err(missing("clusterName"));
    }
    if spec.azure_credential_secret.is_empty() {
        return Err(missing("azureCredentialSecret"));
    }
    if spec.imported {
        return Ok(());
    }
    if spec.kubernetes_version.as_deref().is_none_or(str::is_empty) {
        return Err(missing("kubernetesVersion"));
    }

    for pool in spec.node_pools.as_deref().unwrap_or_default() {
        validate_node_pool_fields(pool, cluster)?;
    }
    unique_node_pool_names(spec.node_pools.as_deref().unwrap_or_default(), cluster)?;

    if let Some(policy) = spec.network_policy.as_deref() {
        if !NETWORK_POLICIES.contains(&policy) {
            return Err(ValidationError::NetworkPolicy(cluster.to_string()));
        }
    }
    Ok(())
}

fn validate_node_pool_modes(pools: &[AKSNodePool]) -> Result<(), ValidationError> {
    let system_pools = pools.iter().filter(|p| p.mode == SYSTEM_MODE).count();
    if system_pools != 1 {
        return Err(ValidationError::SystemNodePool);
    }
    if pools.iter().any(|p| p.os_type == WINDOWS) {
        return Err(ValidationError::WindowsNodePool);
    }
    Ok(())
}

fn validate_node_pool_fields(pool: &AKSNodePool, cluster: &str) -> Result<(), ValidationError> {
    let field = if pool.name.as_deref().is_none_or(str::is_empty) {
        Some("NodePool.Name")
    } else if pool.count.is_none() {
        Some("NodePool.Count")
    } else if pool.max_pods.is_none() {
        Some("NodePool.MaxPods")
    } else if pool.vm_size.is_empty() {
        Some("NodePool.VMSize")
    } else if pool.os_disk_size_gb.is_none() {
        Some("NodePool.OsDiskSizeGB")
    } else if pool.os_disk_type.is_empty() {
        Some("NodePool.OSDiskType")
    } else if pool.mode.is_empty() {
        Some("NodePool.Mode")
    } else if pool.os_type.is_empty() {
        Some("NodePool.OsType")
    } else {
        None
    };

    match field {
        Some(field) => Err(ValidationError::MissingField {
            field,
            cluster: cluster.to_string(),
        }),
        None => Ok(()),
    }
}

/// Node pools are keyed by name; two pools with one name cannot be converged
pub fn unique_node_pool_names(pools: &[AKSNodePool], cluster: &str) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for name in pools.iter().filter_map(|p| p.name.as_deref()) {
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateNodePool(cluster.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{system_pool, user_pool, valid_spec};

    #[test]
    fn test_valid_spec_passes() {
        assert_eq!(validate_spec(&valid_spec()), Ok(()));
    }

    #[test]
    fn test_no_system_pool_fails_regardless_of_other_fields() {
        let broken_specs = [
            AKSClusterConfigSpec {
                node_pools: Some(vec![user_pool("user")]),
                ..valid_spec()
            },
            AKSClusterConfigSpec {
                node_pools: None,
                ..AKSClusterConfigSpec::default()
            },
            AKSClusterConfigSpec {
                node_pools: Some(vec![]),
                resource_group: String::new(),
                network_policy: Some("bogus".to_string()),
                ..valid_spec()
            },
            AKSClusterConfigSpec {
                node_pools: Some(vec![AKSNodePool {
                    os_type: "Windows".to_string(),
                    ..user_pool("win")
                }]),
                ..valid_spec()
            },
        ];
        for spec in broken_specs {
            assert_eq!(validate_spec(&spec), Err(ValidationError::SystemNodePool));
        }
    }

    #[test]
    fn test_two_system_pools_fail() {
        let spec = AKSClusterConfigSpec {
            node_pools: Some(vec![system_pool("a"), system_pool("b")]),
            ..valid_spec()
        };
        assert_eq!(validate_spec(&spec), Err(ValidationError::SystemNodePool));
    }

    #[test]
    fn test_windows_pool_always_fails() {
        let windows = AKSNodePool {
            os_type: "Windows".to_string(),
            ..user_pool("win")
        };
        let specs = [
            AKSClusterConfigSpec {
                node_pools: Some(vec![system_pool("system"), windows.clone()]),
                ..valid_spec()
            },
            AKSClusterConfigSpec {
                node_pools: Some(vec![system_pool("system"), windows]),
                kubernetes_version: None,
                cluster_name: String::new(),
                ..valid_spec()
            },
        ];
        for spec in specs {
            assert_eq!(validate_spec(&spec), Err(ValidationError::WindowsNodePool));
        }
    }

    #[test]
    fn test_required_fields_in_order() {
        let spec = AKSClusterConfigSpec {
            resource_location: String::new(),
            resource_group: String::new(),
            ..valid_spec()
        };
        assert_eq!(
            validate_spec(&spec).unwrap_err().to_string(),
            "field [resourceLocation] must be provided for cluster [prod] config"
        );

        let spec = AKSClusterConfigSpec {
            kubernetes_version: None,
            ..valid_spec()
        };
        assert_eq!(
            validate_spec(&spec).unwrap_err().to_string(),
            "field [kubernetesVersion] must be provided for cluster [prod] config"
        );
    }

    #[test]
    fn test_node_pool_fields() {
        let spec = AKSClusterConfigSpec {
            node_pools: Some(vec![
                system_pool("system"),
                AKSNodePool {
                    max_pods: None,
                    ..user_pool("user")
                },
            ]),
            ..valid_spec()
        };
        assert_eq!(
            validate_spec(&spec),
            Err(ValidationError::MissingField {
                field: "NodePool.MaxPods",
                cluster: "prod".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_node_pool_names() {
        let spec = AKSClusterConfigSpec {
            node_pools: Some(vec![system_pool("pool"), user_pool("pool")]),
            ..valid_spec()
        };
        assert_eq!(
            validate_spec(&spec),
            Err(ValidationError::DuplicateNodePool("prod".to_string()))
        );
    }

    #[test]
    fn test_network_policy_values() {
        for policy in ["azure", "calico"] {
            let spec = AKSClusterConfigSpec {
                network_policy: Some(policy.to_string()),
                ..valid_spec()
            };
            assert_eq!(validate_spec(&spec), Ok(()));
        }
        let spec = AKSClusterConfigSpec {
            network_policy: Some("cilium".to_string()),
            ..valid_spec()
        };
        assert_eq!(validate_spec(&spec), Err(ValidationError::NetworkPolicy("prod".to_string())));
    }

    #[test]
    fn test_imported_needs_only_location_fields() {
        let spec = AKSClusterConfigSpec {
            imported: true,
            cluster_name: "legacy".to_string(),
            resource_group: "legacy-rg".to_string(),
            resource_location: "westeurope".to_string(),
            azure_credential_secret: "creds:azure".to_string(),
            ..AKSClusterConfigSpec::default()
        };
        assert_eq!(validate_spec(&spec), Ok(()));
    }
}
