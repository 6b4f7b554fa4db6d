//! Prints the CustomResourceDefinition manifests for every bootctl CRD.

use crds::{Cluster, Inventory, Machine};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [Cluster::crd(), Machine::crd(), Inventory::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
