//! Cluster lifecycle phase
//!
//! The phase is persisted as a plain string on the status subresource so that
//! records written by older controllers (or by hand) still deserialize. Parsing
//! into [`ClusterPhase`] is where unknown values are rejected.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle phase of an `AKSClusterConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClusterPhase {
    /// Nothing has been issued to the provider yet (persisted as `""`)
    #[default]
    NotCreated,
    /// Create-or-update issued, waiting for the provider to finish
    Creating,
    /// Cluster exists and matched the spec on the last pass
    Active,
    /// A mutation is in flight or the provider reports a busy state
    Updating,
    /// Pre-existing cluster being adopted
    Importing,
}

impl ClusterPhase {
    /// String form stored on the status subresource
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterPhase::NotCreated => "",
            ClusterPhase::Creating => "creating",
            ClusterPhase::Active => "active",
            ClusterPhase::Updating => "updating",
            ClusterPhase::Importing => "importing",
        }
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status phase string outside the closed set of phases
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid phase: {0}")]
pub struct UnknownPhase(pub String);

impl FromStr for ClusterPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(ClusterPhase::NotCreated),
            "creating" => Ok(ClusterPhase::Creating),
            "active" => Ok(ClusterPhase::Active),
            "updating" => Ok(ClusterPhase::Updating),
            "importing" => Ok(ClusterPhase::Importing),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}
