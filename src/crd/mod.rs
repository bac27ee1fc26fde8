//! Custom Resource Definitions for the DummySite controller

mod dummy_site;

pub use dummy_site::*;

use kube::CustomResourceExt;

/// Generate CRD YAML manifests for all custom resources
pub fn generate_crds() -> serde_yaml::Result<Vec<String>> {
    Ok(vec![serde_yaml::to_string(&DummySite::crd())?])
}
