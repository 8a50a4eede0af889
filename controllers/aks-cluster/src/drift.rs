//! Drift comparison between the desired spec and the upstream state.
//!
//! Only one change is reported per call, in a fixed priority order: tags,
//! then node pools (adds and updates before removals), then cluster-level
//! fields. Azure serializes mutations against a cluster, so the caller applies
//! the change, requeues, and asks again on the next pass.

use crate::validation::unique_node_pool_names;
use crate::error::ValidationError;
use crds::{AKSClusterConfigSpec, AKSNodePool};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Cluster-level fields that differ; `None` means unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterDrift {
    pub kubernetes_version: Option<String>,
    pub authorized_ip_ranges: Option<Vec<String>>,
    pub monitoring: Option<bool>,
}

impl ClusterDrift {
    fn is_empty(&self) -> bool {
        self == &ClusterDrift::default()
    }
}

/// The next mutation needed to converge upstream onto the desired spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Tags(BTreeMap<String, String>),
    CreateOrUpdateNodePool(AKSNodePool),
    RemoveNodePool(String),
    Cluster(ClusterDrift),
}

fn node_pool_change(desired: &AKSNodePool, upstream: Option<&AKSNodePool>, cluster: &str) -> bool {
    let name = desired.name.as_deref().unwrap_or_default();
    let Some(upstream) = upstream else {
        info!("Adding node pool [{}] for cluster [{}]", name, cluster);
        return true;
    };

    let mut changed = false;
    if desired.count.unwrap_or(0) != upstream.count.unwrap_or(0) {
        info!("Updating node count in node pool [{}] for cluster [{}]", name, cluster);
        changed = true;
    }
    if let Some(autoscaling) = desired.enable_auto_scaling {
        if autoscaling != upstream.enable_auto_scaling.unwrap_or(false) {
            info!("Updating autoscaling in node pool [{}] for cluster [{}]", name, cluster);
            changed = true;
        }
    }
    if let Some(version) = desired.orchestrator_version.as_deref() {
        if Some(version) != upstream.orchestrator_version.as_deref() {
            info!("Updating orchestrator version in node pool [{}] for cluster [{}]", name, cluster);
            changed = true;
        }
    }
    changed
}

fn cluster_drift(desired: &AKSClusterConfigSpec, upstream: &AKSClusterConfigSpec) -> ClusterDrift {
    let cluster = &desired.cluster_name;
    let mut drift = ClusterDrift::default();

    if let Some(version) = desired.kubernetes_version.as_deref() {
        if Some(version) != upstream.kubernetes_version.as_deref() {
            info!("Updating kubernetes version for cluster [{}]", cluster);
            drift.kubernetes_version = Some(version.to_string());
        }
    }
    if let Some(ranges) = desired.authorized_ip_ranges.as_ref() {
        if ranges != upstream.authorized_ip_ranges.as_ref().unwrap_or(&Vec::new()) {
            info!("Updating authorized IP ranges for cluster [{}]", cluster);
            drift.authorized_ip_ranges = Some(ranges.clone());
        }
    }
    if let Some(routing) = desired.http_application_routing {
        if routing != upstream.http_application_routing.unwrap_or(false) {
            // Reported only; not a reason to push a cluster update
            info!("Updating HTTP application routing for cluster [{}]", cluster);
        }
    }
    if let Some(monitoring) = desired.monitoring {
        if monitoring != upstream.monitoring.unwrap_or(false) {
            info!("Updating monitoring addon for cluster [{}]", cluster);
            drift.monitoring = Some(monitoring);
        }
    }
    drift
}

/// First change needed to move `upstream` towards `desired`, if any
pub fn next_change(
    desired: &AKSClusterConfigSpec,
    upstream: &AKSClusterConfigSpec,
) -> Result<Option<Change>, ValidationError> {
    let cluster = desired.cluster_name.as_str();

    if let Some(tags) = desired.tags.as_ref() {
        if tags != upstream.tags.as_ref().unwrap_or(&BTreeMap::new()) {
            info!("Updating tags for cluster [{}]", cluster);
            return Ok(Some(Change::Tags(tags.clone())));
        }
    }

    if let Some(desired_pools) = desired.node_pools.as_deref() {
        unique_node_pool_names(desired_pools, cluster)?;
        let upstream_pools: HashMap<&str, &AKSNodePool> = upstream
            .node_pools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.name.as_deref().map(|name| (name, p)))
            .collect();

        for pool in desired_pools {
            let name = pool.name.as_deref().unwrap_or_default();
            if node_pool_change(pool, upstream_pools.get(name).copied(), cluster) {
                return Ok(Some(Change::CreateOrUpdateNodePool(pool.clone())));
            }
        }

        let removed = upstream
            .node_pools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.name.as_deref())
            .find(|name| !desired_pools.iter().any(|p| p.name.as_deref() == Some(*name)));
        if let Some(name) = removed {
            info!("Removing node pool [{}] from cluster [{}]", name, cluster);
            return Ok(Some(Change::RemoveNodePool(name.to_string())));
        }
    }

    let drift = cluster_drift(desired, upstream);
    if !drift.is_empty() {
        return Ok(Some(Change::Cluster(drift)));
    }
    Ok(None)
}
