//! Kubernetes Ingress builder exposing a site under `/<name>`

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use super::service_builder::SERVICE_PORT;
use super::site_manifests::site_labels;

const REWRITE_TARGET_ANNOTATION: &str = "nginx.ingress.kubernetes.io/rewrite-target";

/// Public path of a DummySite
pub fn ingress_path(name: &str) -> String {
    format!("/{}", name)
}

/// Build the Ingress routing `/<name>` to the site Service
pub fn build_ingress(name: &str) -> Ingress {
    let mut annotations = BTreeMap::new();
    annotations.insert(REWRITE_TARGET_ANNOTATION.to_string(), "/".to_string());

    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(site_labels(name)),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(ingress_path(name)),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: name.to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(SERVICE_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
