//! Controller-specific error types.
//!
//! Every error produced while reconciling an AKSClusterConfig ends up as the
//! record's `failureMessage`, so the `Display` output is user facing.

use aks_client::{AzureError, UnknownEnvironment};
use crds::UnknownPhase;
use kube::Error as KubeError;
use kube_runtime::finalizer;
use thiserror::Error;

/// Spec problems that must be fixed by editing the AKSClusterConfig
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field [{field}] must be provided for cluster [{cluster}] config")]
    MissingField { field: &'static str, cluster: String },

    #[error("exactly one NodePool with mode System is required")]
    SystemNodePool,

    #[error("windows node pools are not currently supported")]
    WindowsNodePool,

    #[error("wrong network policy value for [{0}] cluster config")]
    NetworkPolicy(String),

    #[error("cannot create cluster [{0}] because an AKSClusterConfig exists with the same name")]
    DuplicateClusterName(String),

    #[error("NodePool names must be unique within the [{0}] cluster to avoid duplication")]
    DuplicateNodePool(String),
}

/// Problems turning an `azureCredentialSecret` reference into credentials
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("invalid credential secret reference [{0}]")]
    InvalidReference(String),

    #[error("couldn't find secret [{namespace}:{name}]")]
    NotFound { namespace: String, name: String },

    #[error("secret [{secret}] is missing key [{key}]")]
    MissingKey { secret: String, key: String },

    #[error("secret [{secret}] key [{key}] is not valid UTF-8")]
    InvalidValue { secret: String, key: String },

    #[error("secret [{secret}]: {source}")]
    Environment {
        secret: String,
        #[source]
        source: UnknownEnvironment,
    },
}

/// Errors that can occur in the AKS Cluster Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Azure Resource Manager error
    #[error(transparent)]
    Azure(#[from] AzureError),

    /// Invalid AKSClusterConfig spec
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Status carries a phase outside the known set
    #[error(transparent)]
    InvalidPhase(#[from] UnknownPhase),

    /// Credential secret could not be resolved
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// Azure call failed during a named step of the pass
    #[error("{context} {source}")]
    AzureStep {
        context: String,
        #[source]
        source: AzureError,
    },

    /// Azure reports the cluster in the `Failed` provisioning state
    #[error("{0}")]
    ClusterFailed(String),

    #[error("cannot detect cluster [{0}] upstream kubernetes version")]
    MissingKubernetesVersion(String),

    /// Monitoring addon carries a workspace resource ID we cannot parse
    #[error("invalid log analytics workspace resource ID [{0}]")]
    WorkspaceResourceId(String),

    /// Cluster kubeconfig could not be interpreted
    #[error("invalid kubeconfig for cluster [{cluster}]: {message}")]
    Kubeconfig { cluster: String, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Finalizer bookkeeping or the wrapped reconcile failed
    #[error("{0}")]
    Finalizer(#[source] Box<finalizer::Error<ControllerError>>),
}

impl ControllerError {
    /// Wrap an Azure error with the step it interrupted
    pub fn azure_step(context: impl Into<String>) -> impl FnOnce(AzureError) -> Self {
        let context = context.into();
        move |source| ControllerError::AzureStep { context, source }
    }

    /// Errors that retrying cannot fix; the record waits for a spec change
    pub fn is_terminal(&self) -> bool {
        match self {
            ControllerError::Validation(_)
            | ControllerError::InvalidPhase(_)
            | ControllerError::ClusterFailed(_)
            | ControllerError::WorkspaceResourceId(_) => true,
            ControllerError::Finalizer(inner) => match inner.as_ref() {
                finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e.is_terminal(),
                _ => false,
            },
            _ => false,
        }
    }
}
