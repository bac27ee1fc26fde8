//! Adapters for Kubernetes resource building and external collaborators

pub mod cluster_client;
pub mod configmap_builder;
pub mod content_fetcher;
pub mod deployment_builder;
pub mod ingress_builder;
pub mod service_builder;
pub mod site_manifests;

pub use site_manifests::{synthesize, ManifestKind, SiteManifest, SiteManifests};
