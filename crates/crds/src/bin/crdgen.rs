//! Prints the CRDs used by the bastion controller as a YAML stream.
//!
//! Intended for local clusters; in a Gardener landscape these resources are
//! installed by Gardener itself.

use crds::{Bastion, Cluster, Infrastructure};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [Bastion::crd(), Cluster::crd(), Infrastructure::crd()];
    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
