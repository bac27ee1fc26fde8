//! DummySite to child manifest synthesis
//!
//! Everything here is pure: the same `(name, content)` always yields the same
//! manifests, so re-applying them on every event is safe.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use std::fmt;

use super::configmap_builder::build_config_map;
use super::deployment_builder::build_deployment;
use super::ingress_builder::build_ingress;
use super::service_builder::build_service;

/// Value of the `managed-by` label on every child object
pub const MANAGED_BY: &str = "dummysite-controller";

/// Kind of a child object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    ConfigMap,
    Deployment,
    Service,
    Ingress,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ManifestKind::ConfigMap => "ConfigMap",
            ManifestKind::Deployment => "Deployment",
            ManifestKind::Service => "Service",
            ManifestKind::Ingress => "Ingress",
        };
        f.write_str(kind)
    }
}

/// One desired child object
#[derive(Clone, Debug, PartialEq)]
pub enum SiteManifest {
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Service(Service),
    Ingress(Ingress),
}

impl SiteManifest {
    pub fn kind(&self) -> ManifestKind {
        match self {
            SiteManifest::ConfigMap(_) => ManifestKind::ConfigMap,
            SiteManifest::Deployment(_) => ManifestKind::Deployment,
            SiteManifest::Service(_) => ManifestKind::Service,
            SiteManifest::Ingress(_) => ManifestKind::Ingress,
        }
    }

    pub fn name(&self) -> &str {
        let name = match self {
            SiteManifest::ConfigMap(o) => o.metadata.name.as_deref(),
            SiteManifest::Deployment(o) => o.metadata.name.as_deref(),
            SiteManifest::Service(o) => o.metadata.name.as_deref(),
            SiteManifest::Ingress(o) => o.metadata.name.as_deref(),
        };
        name.unwrap_or_default()
    }
}

/// The four child objects of a DummySite
#[derive(Clone, Debug, PartialEq)]
pub struct SiteManifests {
    pub config_map: ConfigMap,
    pub deployment: Deployment,
    pub service: Service,
    pub ingress: Ingress,
}

impl SiteManifests {
    /// Manifests in apply order: ConfigMap, Deployment, Service, Ingress
    pub fn into_ordered(self) -> [SiteManifest; 4] {
        [
            SiteManifest::ConfigMap(self.config_map),
            SiteManifest::Deployment(self.deployment),
            SiteManifest::Service(self.service),
            SiteManifest::Ingress(self.ingress),
        ]
    }
}

/// Synthesize the child objects of DummySite `name` serving `content`
pub fn synthesize(name: &str, content: &str) -> SiteManifests {
    SiteManifests {
        config_map: build_config_map(name, content),
        deployment: build_deployment(name),
        service: build_service(name),
        ingress: build_ingress(name),
    }
}

/// Labels set on every child object
pub fn site_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(name);
    labels.insert("managed-by".to_string(), MANAGED_BY.to_string());
    labels
}

/// Labels used to select the pods of a site
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());
    labels
}
