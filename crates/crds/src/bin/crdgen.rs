//! Prints the OvirtImageIOPopulator CRD as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd.yaml`

use crds::OvirtImageIOPopulator;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&OvirtImageIOPopulator::crd())?);
    Ok(())
}
