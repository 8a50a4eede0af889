//! Prints the AKSClusterConfig CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/aksclusterconfig.yaml`

use crds::AKSClusterConfig;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&AKSClusterConfig::crd())?);
    Ok(())
}
