//! Kubernetes Service builder for site access

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::deployment_builder::HTTP_PORT_NAME;
use super::site_manifests::{selector_labels, site_labels};

/// Port exposed by the Service
pub const SERVICE_PORT: i32 = 80;

/// Build a ClusterIP Service routing to the pods of DummySite `name`
pub fn build_service(name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(site_labels(name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(name)),
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_string())),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// In-cluster DNS endpoint of a site Service
pub fn service_endpoint(name: &str, namespace: &str) -> String {
    format!("{}.{}.svc.cluster.local:{}", name, namespace, SERVICE_PORT)
}
