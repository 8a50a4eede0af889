//! AKS Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the AKS cluster controller.

pub mod aks_cluster_config;
pub mod phase;

pub use aks_cluster_config::*;
pub use phase::*;
