//! Namespace-scoped Kubernetes access used by the controller
//!
//! The reconciler, startup sweep and watch loop only talk to the cluster
//! through [`SiteKubeClient`], which keeps them testable with a mock.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{ListParams, Patch, PatchParams, PostParams, WatchEvent, WatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{DummySite, DummySiteStatus, SiteEvent};
use crate::{Error, Result};

/// Field manager recorded on status patches
pub const FIELD_MANAGER: &str = "dummysite-controller";

/// Result of listing DummySites
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteList {
    /// Sites in listing order
    pub items: Vec<DummySite>,
    /// Resource version of the list, used to start a watch after it
    pub resource_version: Option<String>,
}

/// Trait abstracting the Kubernetes operations of the controller
///
/// Create operations report a 409 Conflict as [`Error::AlreadyExists`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SiteKubeClient: Send + Sync {
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    async fn create_deployment(&self, deployment: &Deployment) -> Result<()>;

    async fn create_service(&self, service: &Service) -> Result<()>;

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()>;

    /// Merge-patch the status sub-resource of a DummySite
    async fn patch_site_status(&self, name: &str, status: &DummySiteStatus) -> Result<()>;

    /// List all DummySites
    async fn list_sites(&self) -> Result<SiteList>;

    /// Subscribe to DummySite changes, optionally after `resource_version`
    async fn watch_sites(
        &self,
        resource_version: Option<String>,
    ) -> Result<BoxStream<'static, Result<SiteEvent>>>;
}

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct SiteKubeClientImpl {
    client: Client,
    namespace: String,
}

impl SiteKubeClientImpl {
    /// Create a client scoped to `namespace`
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl SiteKubeClient for SiteKubeClientImpl {
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let api: Api<ConfigMap> = self.api();
        api.create(&PostParams::default(), config_map)
            .await
            .map_err(|e| Error::from_create(e, &format!("ConfigMap {}", config_map.name_any())))?;
        Ok(())
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let api: Api<ConfigMap> = self.api();
        let name = config_map.name_any();
        api.replace(&name, &PostParams::default(), config_map).await?;
        Ok(())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        let api: Api<Deployment> = self.api();
        api.create(&PostParams::default(), deployment)
            .await
            .map_err(|e| Error::from_create(e, &format!("Deployment {}", deployment.name_any())))?;
        Ok(())
    }

    async fn create_service(&self, service: &Service) -> Result<()> {
        let api: Api<Service> = self.api();
        api.create(&PostParams::default(), service)
            .await
            .map_err(|e| Error::from_create(e, &format!("Service {}", service.name_any())))?;
        Ok(())
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()> {
        let api: Api<Ingress> = self.api();
        api.create(&PostParams::default(), ingress)
            .await
            .map_err(|e| Error::from_create(e, &format!("Ingress {}", ingress.name_any())))?;
        Ok(())
    }

    async fn patch_site_status(&self, name: &str, status: &DummySiteStatus) -> Result<()> {
        let api: Api<DummySite> = self.api();
        let patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }

    async fn list_sites(&self) -> Result<SiteList> {
        let api: Api<DummySite> = self.api();
        let list = api.list(&ListParams::default()).await?;
        Ok(SiteList {
            items: list.items,
            resource_version: list.metadata.resource_version,
        })
    }

    async fn watch_sites(
        &self,
        resource_version: Option<String>,
    ) -> Result<BoxStream<'static, Result<SiteEvent>>> {
        let api: Api<DummySite> = self.api();
        let version = resource_version.unwrap_or_else(|| "0".to_string());
        debug!(namespace = %self.namespace, resource_version = %version, "Opening DummySite watch");

        let stream = api.watch(&WatchParams::default(), &version).await?;

        Ok(site_events(stream))
    }
}

/// Turn a raw watch stream into decoded [`SiteEvent`]s
///
/// An object that fails to deserialize is skipped; the API server keeps the
/// stream open after it, so later events still arrive. Transport and API
/// errors are passed through and end the subscription.
pub fn site_events<S>(raw: S) -> BoxStream<'static, Result<SiteEvent>>
where
    S: Stream<Item = std::result::Result<WatchEvent<DummySite>, kube::Error>> + Send + 'static,
{
    raw.filter_map(|item| async move {
        match item {
            Ok(event) => decode_watch_event(event).transpose(),
            Err(kube::Error::SerdeError(e)) => {
                warn!(error = %e, "Skipping DummySite watch event that failed to decode");
                None
            }
            Err(kube::Error::Api(ae)) if ae.code == 410 => Some(Err(Error::WatchExpired(ae.message))),
            Err(e) => Some(Err(Error::from(e))),
        }
    })
    .boxed()
}

/// Decode a raw watch event into a [`SiteEvent`]
///
/// Bookmarks carry no object change and are dropped. Server-side error
/// events end the subscription; a 410 means the resource version expired.
pub fn decode_watch_event(event: WatchEvent<DummySite>) -> Result<Option<SiteEvent>> {
    let event = match event {
        WatchEvent::Added(site) => SiteEvent::Added(site),
        WatchEvent::Modified(site) => SiteEvent::Modified(site),
        WatchEvent::Deleted(site) => SiteEvent::Deleted(site),
        WatchEvent::Bookmark(_) => return Ok(None),
        WatchEvent::Error(e) if e.code == 410 => return Err(Error::WatchExpired(e.message)),
        WatchEvent::Error(e) => return Err(Error::Watch(format!("{} ({})", e.message, e.code))),
    };

    if event.site().metadata.name.is_none() {
        warn!(event = event.kind(), "Dropping DummySite event without a name");
        return Ok(None);
    }

    Ok(Some(event))
}
