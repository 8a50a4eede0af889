//! Log analytics workspace backing the monitoring addon.

use aks_client::{AzureError, Workspace, WorkspaceProperties, WorkspaceSku, WorkspacesClient, WORKSPACE_SKU_STANDALONE};
use sha2::{Digest, Sha256};
use tracing::info;

/// Longest workspace name used as-is
const MAX_WORKSPACE_NAME_LEN: usize = 63;
const TRUNCATED_PREFIX_LEN: usize = 46;
const HASH_SUFFIX_LEN: usize = 16;

/// Region hosting the workspace for clusters in a given region
static OMS_REGIONS: &[(&str, &str)] = &[
    ("australiacentral", "australiacentral"),
    ("australiacentral2", "australiacentral"),
    ("australiaeast", "australiaeast"),
    ("australiasoutheast", "australiasoutheast"),
    ("brazilsouth", "southcentralus"),
    ("canadacentral", "canadacentral"),
    ("canadaeast", "canadacentral"),
    ("centralus", "centralus"),
    ("centralindia", "centralindia"),
    ("eastasia", "eastasia"),
    ("eastus", "eastus"),
    ("eastus2", "eastus2"),
    ("francecentral", "francecentral"),
    ("francesouth", "francecentral"),
    ("japaneast", "japaneast"),
    ("japanwest", "japaneast"),
    ("koreacentral", "koreacentral"),
    ("koreasouth", "koreacentral"),
    ("northcentralus", "eastus"),
    ("northeurope", "northeurope"),
    ("southafricanorth", "westeurope"),
    ("southafricawest", "westeurope"),
    ("southcentralus", "southcentralus"),
    ("southeastasia", "southeastasia"),
    ("southindia", "centralindia"),
    ("uksouth", "uksouth"),
    ("ukwest", "uksouth"),
    ("westcentralus", "eastus"),
    ("westeurope", "westeurope"),
    ("westindia", "centralindia"),
    ("westus", "westus"),
    ("westus2", "westus2"),
    ("chinaeast", "chinaeast2"),
    ("chinaeast2", "chinaeast2"),
    ("chinanorth", "chinaeast2"),
    ("chinanorth2", "chinaeast2"),
    ("usgovvirginia", "usgovvirginia"),
    ("usgovarizona", "usgovvirginia"),
];

/// Workspace region for a cluster region, falling back to the region itself
pub fn oms_region(location: &str) -> &str {
    OMS_REGIONS
        .iter()
        .find(|(region, _)| *region == location)
        .map_or(location, |(_, oms)| *oms)
}

/// Deterministic workspace name that fits Azure's 63 character limit.
///
/// Long names keep a 46 character prefix and gain a suffix derived from a
/// SHA-256 of the full name, so distinct long names stay distinct.
pub fn generate_unique_log_workspace(name: &str) -> String {
    if name.len() <= MAX_WORKSPACE_NAME_LEN {
        return name.to_string();
    }
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let prefix: String = name.chars().take(TRUNCATED_PREFIX_LEN).collect();
    format!("{prefix}-{}", &digest[..HASH_SUFFIX_LEN])
}

/// Resource ID of the workspace used for monitoring, creating it when the
/// lookup fails. An empty `workspace_group` means the cluster's group.
pub async fn check_log_analytics_workspace_for_monitoring(
    client: &dyn WorkspacesClient,
    location: &str,
    group: &str,
    workspace_group: &str,
    workspace_name: &str,
) -> Result<String, AzureError> {
    let workspace_group = if workspace_group.is_empty() { group } else { workspace_group };
    let workspace_name = generate_unique_log_workspace(workspace_name);

    if let Ok(workspace) = client.get(workspace_group, &workspace_name).await {
        return workspace_id(workspace, &workspace_name);
    }

    info!(
        "Creating log analytics workspace [{}] in resource group [{}]",
        workspace_name, workspace_group
    );
    let workspace = Workspace {
        location: Some(oms_region(location).to_string()),
        properties: Some(WorkspaceProperties {
            sku: Some(WorkspaceSku {
                name: WORKSPACE_SKU_STANDALONE.to_string(),
            }),
            retention_in_days: None,
        }),
        ..Default::default()
    };
    let operation = client
        .create_or_update(workspace_group, &workspace_name, &workspace)
        .await?;
    let created = client.async_create_update_result(&operation).await?;
    workspace_id(created, &workspace_name)
}

fn workspace_id(workspace: Workspace, name: &str) -> Result<String, AzureError> {
    workspace
        .id
        .ok_or_else(|| AzureError::InvalidResponse(format!("workspace [{name}] has no resource ID")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aks_client::{CallKind, MockAzureClient};

    #[test]
    fn test_generate_unique_log_workspace() {
        let got = generate_unique_log_workspace(
            "ThisIsAValidInputklasjdfkljasjgireqahtawjsfklakjghrehtuirqhjfhwjkdfhjkawhfdjkhafvjkahg",
        );
        assert_eq!(got, "ThisIsAValidInputklasjdfkljasjgireqahtawjsfkla-fb8fb22278d8eb98");
        assert_eq!(got.len(), 63);
    }

    #[test]
    fn test_short_names_are_unchanged() {
        let name = "a".repeat(63);
        assert_eq!(generate_unique_log_workspace(&name), name);
        assert_eq!(generate_unique_log_workspace("prod"), "prod");
        assert_eq!(generate_unique_log_workspace(&"a".repeat(64)).len(), 63);
    }

    #[test]
    fn test_oms_region_mapping() {
        assert_eq!(oms_region("eastus"), "eastus");
        assert_eq!(oms_region("ukwest"), "uksouth");
        assert_eq!(oms_region("mars-north"), "mars-north");
    }

    #[tokio::test]
    async fn test_existing_workspace_returns_id() {
        let mock = MockAzureClient::new();
        let id = mock.add_workspace("resourcegroup", "workspaceName", "eastus");

        let got = check_log_analytics_workspace_for_monitoring(&mock, "eastus", "resourcegroup", "", "workspaceName")
            .await
            .unwrap();
        assert_eq!(got, id);
        assert_eq!(mock.count(CallKind::CreateOrUpdateWorkspace), 0);
    }

    #[tokio::test]
    async fn test_missing_workspace_is_created() {
        let mock = MockAzureClient::new();

        let got = check_log_analytics_workspace_for_monitoring(&mock, "ukwest", "resourcegroup", "", "workspaceName")
            .await
            .unwrap();
        assert_eq!(mock.count(CallKind::CreateOrUpdateWorkspace), 1);
        assert_eq!(mock.count(CallKind::WorkspaceResult), 1);

        let created = mock.workspace("resourcegroup", "workspaceName").unwrap();
        assert_eq!(created.id.as_deref(), Some(got.as_str()));
        assert_eq!(created.location.as_deref(), Some("uksouth"));
        assert_eq!(created.properties.unwrap().sku.unwrap().name, "Standalone");
    }

    #[tokio::test]
    async fn test_explicit_workspace_group_is_used() {
        let mock = MockAzureClient::new();
        check_log_analytics_workspace_for_monitoring(&mock, "eastus", "cluster-rg", "logs-rg", "logs")
            .await
            .unwrap();
        assert!(mock.workspace("logs-rg", "logs").is_some());
    }

    #[tokio::test]
    async fn test_create_error_aborts() {
        let mock = MockAzureClient::new();
        mock.fail_on(CallKind::CreateOrUpdateWorkspace, "error");

        let result =
            check_log_analytics_workspace_for_monitoring(&mock, "eastus", "workspaceResourceGroup", "", "workspaceName")
                .await;
        assert!(result.is_err());
        assert_eq!(mock.count(CallKind::WorkspaceResult), 0);
    }

    #[tokio::test]
    async fn test_result_error_aborts() {
        let mock = MockAzureClient::new();
        mock.fail_on(CallKind::WorkspaceResult, "error");

        let result =
            check_log_analytics_workspace_for_monitoring(&mock, "eastus", "workspaceResourceGroup", "", "workspaceName")
                .await;
        assert!(result.is_err());
        assert_eq!(mock.count(CallKind::CreateOrUpdateWorkspace), 1);
    }
}
