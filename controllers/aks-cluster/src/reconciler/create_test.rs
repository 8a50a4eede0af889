//! Tests for the not-created, creating and importing phases

use super::*;
use crate::error::ValidationError;
use crate::test_utils::*;
use aks_client::CallKind;
use crds::{AKSClusterConfigStatus, AKSNodePool};

#[tokio::test]
async fn test_no_system_pool_fails_before_any_azure_call() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        node_pools: Some(vec![user_pool("user")]),
        ..valid_spec()
    };

    let outcome = harness.reconciler().on_change(test_config("prod", spec)).await;
    let err = outcome.result.unwrap_err();
    assert_eq!(err.to_string(), "exactly one NodePool with mode System is required");
    assert!(err.is_terminal());
    assert!(harness.azure.calls().is_empty());
    assert_eq!(harness.configs.writes(), 0);
}

#[tokio::test]
async fn test_windows_pool_fails_before_any_azure_call() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        node_pools: Some(vec![
            system_pool("system"),
            AKSNodePool {
                os_type: "Windows".to_string(),
                ..user_pool("win")
            },
        ]),
        ..valid_spec()
    };

    let outcome = harness.reconciler().on_change(test_config("prod", spec)).await;
    assert!(matches!(
        outcome.result,
        Err(ControllerError::Validation(ValidationError::WindowsNodePool))
    ));
    assert!(harness.azure.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_cluster_name_in_namespace() {
    let harness = Harness::new();
    harness.stored_config("other", valid_spec(), ClusterPhase::Active);

    let outcome = harness.reconciler().on_change(test_config("prod", valid_spec())).await;
    assert_eq!(
        outcome.result.unwrap_err().to_string(),
        "cannot create cluster [prod] because an AKSClusterConfig exists with the same name"
    );
    assert_eq!(harness.azure.mutation_count(), 0);
}

#[tokio::test]
async fn test_same_record_is_not_a_duplicate() {
    let harness = Harness::new();
    let config = harness.stored_config("prod", valid_spec(), ClusterPhase::NotCreated);

    let outcome = harness.reconciler().on_change(config).await;
    assert_eq!(outcome.result.unwrap(), Requeue::Now);
}

#[tokio::test]
async fn test_missing_credential_secret() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        azure_credential_secret: format!("{CREDENTIAL_NAMESPACE}:missing"),
        ..valid_spec()
    };

    let outcome = harness.reconciler().on_change(test_config("prod", spec)).await;
    assert_eq!(
        outcome.result.unwrap_err().to_string(),
        format!("couldn't find secret [{CREDENTIAL_NAMESPACE}:missing]")
    );
    assert!(harness.azure.calls().is_empty());
}

#[tokio::test]
async fn test_create_makes_resource_group_then_cluster() {
    let harness = Harness::new();

    let outcome = harness.reconciler().on_change(test_config("prod", valid_spec())).await;
    assert_eq!(outcome.result.unwrap(), Requeue::Now);
    assert_eq!(outcome.config.unwrap().phase(), Ok(ClusterPhase::Creating));

    let mutations: Vec<CallKind> = harness
        .azure
        .calls()
        .into_iter()
        .map(|c| c.kind)
        .filter(|k| k.is_mutation())
        .collect();
    assert_eq!(mutations, vec![CallKind::CreateResourceGroup, CallKind::CreateOrUpdateCluster]);

    let cluster = harness.azure.cluster("prod-rg", "prod").unwrap();
    assert_eq!(cluster.location.as_deref(), Some("eastus"));
    assert_eq!(harness.configs.writes(), 1);
}

#[tokio::test]
async fn test_existing_resource_group_is_reused() {
    let harness = Harness::new();
    harness.azure.add_resource_group("prod-rg", "eastus");

    harness.reconciler().on_change(test_config("prod", valid_spec())).await.result.unwrap();
    assert_eq!(harness.azure.count(CallKind::CreateResourceGroup), 0);
    assert_eq!(harness.azure.count(CallKind::CreateOrUpdateCluster), 1);
}

#[tokio::test]
async fn test_resource_group_failure_is_reported() {
    let harness = Harness::new();
    harness.azure.fail_on(CallKind::CreateResourceGroup, "quota exceeded");

    let outcome = harness.reconciler().on_change(test_config("prod", valid_spec())).await;
    let message = outcome.result.unwrap_err().to_string();
    assert!(message.starts_with("error creating resource group [prod-rg] with message"));
    assert!(message.contains("quota exceeded"));
    assert_eq!(harness.azure.count(CallKind::CreateOrUpdateCluster), 0);
    assert_eq!(outcome.config.unwrap().phase(), Ok(ClusterPhase::NotCreated));
}

#[tokio::test]
async fn test_monitoring_wires_workspace_into_cluster() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        monitoring: Some(true),
        ..valid_spec()
    };

    harness.reconciler().on_change(test_config("prod", spec)).await.result.unwrap();
    let workspace = harness.azure.workspace("prod-rg", "prod").unwrap();
    let cluster = harness.azure.cluster("prod-rg", "prod").unwrap();
    let addons = cluster.properties.unwrap().addon_profiles.unwrap();
    let config = addons["omsagent"].config.clone().unwrap();
    assert_eq!(Some(&config["logAnalyticsWorkspaceResourceID"]), workspace.id.as_ref());
}

#[tokio::test]
async fn test_imported_record_moves_to_importing() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        imported: true,
        node_pools: None,
        ..valid_spec()
    };

    let outcome = harness.reconciler().on_change(test_config("prod", spec)).await;
    assert_eq!(outcome.config.unwrap().phase(), Ok(ClusterPhase::Importing));
    assert_eq!(harness.azure.mutation_count(), 0);
}

#[tokio::test]
async fn test_creating_waits_while_in_progress() {
    let harness = Harness::new();
    harness.seed_cluster(&valid_spec());
    harness.azure.set_cluster_state("prod-rg", "prod", "Creating");
    let config = harness.stored_config("prod", valid_spec(), ClusterPhase::Creating);

    let outcome = harness.reconciler().on_change(config).await;
    assert_eq!(outcome.result.unwrap(), Requeue::After(POLL_INTERVAL));
    assert_eq!(harness.configs.writes(), 0);
    assert!(harness.secrets.created().is_empty());
}

#[tokio::test]
async fn test_creating_to_active_records_endpoint_and_ca() {
    let harness = Harness::new();
    harness.seed_cluster(&valid_spec());
    let config = harness.stored_config("prod", valid_spec(), ClusterPhase::Creating);

    let outcome = harness.reconciler().on_change(config).await;
    assert_eq!(outcome.config.unwrap().phase(), Ok(ClusterPhase::Active));

    let secret = harness.secrets.secret("default", "prod").unwrap();
    let data = secret.data.unwrap();
    assert_eq!(data["endpoint"].0, b"https://prod-dns.hcp.eastus.azmk8s.io:443");
    assert_eq!(data["ca"].0, b"Q0EtREFUQQ==");
    let owner = &secret.metadata.owner_references.unwrap()[0];
    assert_eq!(owner.kind, "AKSClusterConfig");
    assert_eq!(owner.uid, "uid-prod");
}

#[tokio::test]
async fn test_creating_failed_is_terminal() {
    let harness = Harness::new();
    harness.seed_cluster(&valid_spec());
    harness.azure.set_cluster_state("prod-rg", "prod", "Failed");
    let config = harness.stored_config("prod", valid_spec(), ClusterPhase::Creating);

    let err = harness.reconciler().on_change(config).await.result.unwrap_err();
    assert_eq!(err.to_string(), "creation for cluster [prod] status: Failed");
    assert!(err.is_terminal());
}

#[tokio::test]
async fn test_import_accepts_existing_secret() {
    let harness = Harness::new();
    let spec = AKSClusterConfigSpec {
        imported: true,
        ..valid_spec()
    };
    harness.seed_cluster(&spec);
    harness.secrets.insert(credential_secret("default", "prod"));
    let config = harness.stored_config("prod", spec, ClusterPhase::Importing);

    let outcome = harness.reconciler().on_change(config).await;
    assert_eq!(outcome.config.unwrap().phase(), Ok(ClusterPhase::Active));
    assert!(harness.secrets.created().is_empty());
    assert_eq!(harness.azure.count(CallKind::GetAccessProfile), 1);
}

#[tokio::test]
async fn test_unknown_phase_is_rejected() {
    let harness = Harness::new();
    let mut config = test_config("prod", valid_spec());
    config.status = Some(AKSClusterConfigStatus {
        phase: "provisioning".to_string(),
        failure_message: String::new(),
    });

    let outcome = harness.reconciler().on_change(config).await;
    let err = outcome.result.unwrap_err();
    assert_eq!(err.to_string(), "invalid phase: provisioning");
    assert!(err.is_terminal());
    assert!(outcome.config.is_some());
}

#[tokio::test]
async fn test_deleting_record_is_skipped() {
    let harness = Harness::new();
    let mut config = test_config("prod", valid_spec());
    config.metadata.deletion_timestamp = Some(serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());

    let outcome = harness.reconciler().on_change(config).await;
    assert!(outcome.config.is_none());
    assert!(outcome.result.is_ok());
    assert!(harness.azure.calls().is_empty());
}

#[tokio::test]
async fn test_lifecycle_from_create_to_verified() {
    let harness = Harness::new();
    harness
        .azure
        .set_kubeconfig("prod-rg", "prod", ADMIN_KUBECONFIG);
    let reconciler = harness.reconciler();

    let created = reconciler.on_change(test_config("prod", valid_spec())).await;
    let config = created.config.unwrap();
    assert_eq!(config.phase(), Ok(ClusterPhase::Creating));

    let active = reconciler.on_change(config).await;
    let config = active.config.unwrap();
    assert_eq!(config.phase(), Ok(ClusterPhase::Active));

    harness.azure.clear_calls();
    let verified = reconciler.on_change(config).await;
    assert_eq!(verified.result.unwrap(), Requeue::AwaitChange);
    assert_eq!(verified.config.unwrap().phase(), Ok(ClusterPhase::Active));
    assert_eq!(harness.azure.mutation_count(), 0);
}
