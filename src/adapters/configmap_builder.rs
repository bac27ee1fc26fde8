//! Kubernetes ConfigMap builder holding the mirrored website content

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::site_manifests::site_labels;

/// Data key served by nginx as the index page
pub const INDEX_KEY: &str = "index.html";

/// Annotation carrying the SHA-256 of the stored content
pub const CONTENT_HASH_ANNOTATION: &str = "dummysite.stable.example.com/content-sha256";

/// Name of the ConfigMap backing a DummySite
pub fn config_map_name(name: &str) -> String {
    format!("{}-content", name)
}

/// Build the ConfigMap storing `content` for DummySite `name`
pub fn build_config_map(name: &str, content: &str) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(INDEX_KEY.to_string(), content.to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(CONTENT_HASH_ANNOTATION.to_string(), content_hash(content));

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(name)),
            labels: Some(site_labels(name)),
            annotations: Some(annotations),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Hex-encoded SHA-256 of the content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The index page stored in a ConfigMap, if present
pub fn index_html(config_map: &ConfigMap) -> Option<&str> {
    config_map
        .data
        .as_ref()
        .and_then(|d| d.get(INDEX_KEY))
        .map(String::as_str)
}
