//! Kubernetes Deployment builder for the nginx pods serving a site

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::configmap_builder::config_map_name;
use super::site_manifests::{selector_labels, site_labels};

const NGINX_IMAGE: &str = "nginx:alpine";
const CONTAINER_NAME: &str = "nginx";
const HTML_ROOT: &str = "/usr/share/nginx/html";
const CONTENT_VOLUME: &str = "content";

/// Port the nginx container listens on
pub const HTTP_PORT: i32 = 80;

/// Named container port targeted by the Service
pub const HTTP_PORT_NAME: &str = "http";

/// Build the Deployment serving the mirrored content of `name`
pub fn build_deployment(name: &str) -> Deployment {
    let selector = selector_labels(name);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(site_labels(name)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(name)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_pod_spec(name: &str) -> PodSpec {
    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(NGINX_IMAGE.to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(HTTP_PORT_NAME.to_string()),
            container_port: HTTP_PORT,
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: CONTENT_VOLUME.to_string(),
            mount_path: HTML_ROOT.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    PodSpec {
        containers: vec![container],
        volumes: Some(vec![Volume {
            name: CONTENT_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(name),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Name of the ConfigMap mounted into the pods of a Deployment, if any
pub fn mounted_config_map(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .volumes
        .as_ref()?
        .iter()
        .find_map(|v| v.config_map.as_ref().map(|cm| cm.name.as_str()))
}
