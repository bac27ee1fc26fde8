//! CRD YAML Generator
//!
//! Prints the DummySite CustomResourceDefinition.
//!
//! Usage: cargo run --bin crdgen > manifests/dummysite-crd.yaml

use dummysite_controller::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
