//! Azure Resource Manager client
//!
//! A narrow client for the Azure resources an AKS cluster controller touches:
//! managed clusters, agent pools, resource groups and log analytics workspaces.
//!
//! # Example
//!
//! ```no_run
//! use aks_client::{ArmClientFactory, AzureClientFactory, AzureEnvironment, Credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new(
//!     "subscription-id",
//!     "tenant-id",
//!     "client-id",
//!     "client-secret",
//!     AzureEnvironment::Public,
//! );
//! let clients = ArmClientFactory::new()?.clients(&credentials).await?;
//!
//! // Look up a cluster
//! let cluster = clients.clusters.get("my-rg", "my-cluster").await?;
//! println!("{:?}", cluster.provisioning_state());
//!
//! // Delete it and wait for Azure to finish
//! let operation = clients.clusters.delete("my-rg", "my-cluster").await?;
//! clients.clusters.wait_for_completion(&operation).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod common;
pub mod credentials;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod azure_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use azure_trait::{
    AgentPoolsClient, AzureClientFactory, AzureClients, ManagedClustersClient, OperationHandle,
    PollStrategy, ResourceGroupsClient, WorkspacesClient,
};
pub use client::{ArmClient, ArmClientFactory};
pub use common::HttpClient;
pub use credentials::{AzureEnvironment, Credentials, UnknownEnvironment};
pub use error::AzureError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{AzureCall, CallKind, MockAzureClient};
