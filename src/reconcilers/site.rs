//! Reconciliation logic for DummySite resources
//!
//! Every run starts from `Processing`, re-derives the child objects from the
//! DummySite spec and ends in `Ready` or `Failed`. Nothing is cached between
//! runs; the cluster is the only source of truth.

use kube::ResourceExt;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::cluster_client::SiteKubeClient;
use crate::adapters::content_fetcher::fetch_or_fallback;
use crate::adapters::service_builder::service_endpoint;
use crate::adapters::{synthesize, ManifestKind, SiteManifest};
use crate::controllers::Context;
use crate::crd::{DummySite, DummySiteStatus, SitePhase};
use crate::metrics::prometheus::{
    MANIFEST_APPLIES, RECONCILE_DURATION, RECONCILIATIONS, RECONCILIATION_ERRORS,
};
use crate::{Error, Result};

/// What caused a reconciliation run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Listing at startup
    Sweep,
    /// Watch event
    Watch,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Sweep => "sweep",
            Trigger::Watch => "watch",
        }
    }
}

/// Result of applying one child object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was replaced with the desired state
    Updated,
    /// The object existed and was left as-is
    Unchanged,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Unchanged => "unchanged",
        };
        f.write_str(outcome)
    }
}

/// Validate a DummySite before touching the cluster
pub fn validate(site: &DummySite) -> Result<&str> {
    match site.metadata.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::Validation(
            "metadata.name is required to derive child objects".to_string(),
        )),
    }
}

/// Create a child object, falling back per kind when it already exists
///
/// A ConfigMap that already exists is replaced so that refreshed content is
/// served. An existing Deployment, Service or Ingress is left untouched. Any
/// other error is returned.
pub async fn apply_manifest(
    client: &dyn SiteKubeClient,
    manifest: &SiteManifest,
) -> Result<ApplyOutcome> {
    let created = match manifest {
        SiteManifest::ConfigMap(cm) => client.create_config_map(cm).await,
        SiteManifest::Deployment(deployment) => client.create_deployment(deployment).await,
        SiteManifest::Service(service) => client.create_service(service).await,
        SiteManifest::Ingress(ingress) => client.create_ingress(ingress).await,
    };

    let outcome = match created {
        Ok(()) => ApplyOutcome::Created,
        Err(e) if e.is_already_exists() => match manifest {
            SiteManifest::ConfigMap(cm) => {
                client.replace_config_map(cm).await?;
                ApplyOutcome::Updated
            }
            _ => ApplyOutcome::Unchanged,
        },
        Err(e) => return Err(e),
    };

    let kind = manifest.kind().to_string();
    let outcome_label = outcome.to_string();
    MANIFEST_APPLIES
        .with_label_values(&[kind.as_str(), outcome_label.as_str()])
        .inc();

    match outcome {
        ApplyOutcome::Unchanged => debug!("{} {} already exists", kind, manifest.name()),
        _ => info!("{} {} {}", kind, manifest.name(), outcome),
    }

    Ok(outcome)
}

/// Fetch, synthesize and apply all child objects of DummySite `name`
///
/// Stops at the first failing apply; later objects are not attempted.
pub async fn converge(
    name: &str,
    website_url: &str,
    ctx: &Context,
) -> Result<Vec<(ManifestKind, ApplyOutcome)>> {
    let content = fetch_or_fallback(ctx.fetcher.as_ref(), website_url).await;
    let manifests = synthesize(name, &content);

    let mut applied = Vec::with_capacity(4);
    for manifest in manifests.into_ordered() {
        let outcome = apply_manifest(ctx.client.as_ref(), &manifest).await?;
        applied.push((manifest.kind(), outcome));
    }

    Ok(applied)
}

/// Reconcile one DummySite and return the phase it ended in
///
/// The result is always `Ready` or `Failed`. Status patches are best-effort
/// and never change the outcome of the run.
#[instrument(skip(site, ctx, trigger), fields(name = %site.name_any(), namespace = %ctx.config.namespace, trigger = trigger.as_str()))]
pub async fn reconcile(site: &DummySite, ctx: &Context, trigger: Trigger) -> SitePhase {
    let start = Instant::now();
    RECONCILIATIONS.with_label_values(&[trigger.as_str()]).inc();

    let name = match validate(site) {
        Ok(name) => name,
        Err(e) => {
            RECONCILIATION_ERRORS
                .with_label_values(&[trigger.as_str()])
                .inc();
            error!("Skipping DummySite: {}", e);
            return SitePhase::Failed;
        }
    };

    info!(url = %site.spec.website_url, "Processing DummySite {}", name);
    update_status(ctx.client.as_ref(), name, DummySiteStatus::processing()).await;

    let phase = match converge(name, &site.spec.website_url, ctx).await {
        Ok(applied) => {
            let url = ctx.config.site_url(name);
            update_status(ctx.client.as_ref(), name, DummySiteStatus::ready(url.clone())).await;
            info!(
                url = %url,
                endpoint = %service_endpoint(name, &ctx.config.namespace),
                applied = applied.len(),
                "Successfully processed DummySite {}",
                name
            );
            SitePhase::Ready
        }
        Err(e) => {
            RECONCILIATION_ERRORS
                .with_label_values(&[trigger.as_str()])
                .inc();
            error!(error = %e, "Error processing DummySite {}", name);
            update_status(ctx.client.as_ref(), name, DummySiteStatus::failed(e.to_string())).await;
            SitePhase::Failed
        }
    };

    RECONCILE_DURATION
        .with_label_values(&[trigger.as_str()])
        .observe(start.elapsed().as_secs_f64());

    phase
}

/// Patch the status of a DummySite, logging instead of failing
async fn update_status(client: &dyn SiteKubeClient, name: &str, status: DummySiteStatus) {
    let phase = status.phase.unwrap_or_default();
    match client.patch_site_status(name, &status).await {
        Ok(()) => info!("Updated status for {}: {}", name, phase),
        Err(e) => warn!(error = %e, "Failed to update status for {} to {}", name, phase),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cluster_client::MockSiteKubeClient;
    use crate::adapters::configmap_builder::index_html;
    use crate::adapters::content_fetcher::MockContentFetcher;
    use crate::config::ControllerConfig;
    use crate::crd::DummySiteSpec;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::error::ErrorResponse;
    use std::sync::{Arc, Mutex};

    type StatusLog = Arc<Mutex<Vec<(String, DummySiteStatus)>>>;

    fn sample_site(name: &str, url: &str) -> DummySite {
        DummySite::new(
            name,
            DummySiteSpec {
                website_url: url.to_string(),
            },
        )
    }

    fn api_error(code: u16, message: &str) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    fn fetcher_returning(body: &'static str) -> MockContentFetcher {
        let mut fetcher = MockContentFetcher::new();
        fetcher
            .expect_fetch()
            .returning(move |_| Ok(body.to_string()));
        fetcher
    }

    fn record_statuses(client: &mut MockSiteKubeClient) -> StatusLog {
        let log: StatusLog = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        client
            .expect_patch_site_status()
            .returning(move |name, status| {
                sink.lock().unwrap().push((name.to_string(), status.clone()));
                Ok(())
            });
        log
    }

    fn phases(log: &StatusLog) -> Vec<SitePhase> {
        log.lock()
            .unwrap()
            .iter()
            .filter_map(|(_, s)| s.phase)
            .collect()
    }

    fn context(client: MockSiteKubeClient, fetcher: MockContentFetcher) -> Arc<Context> {
        Context::new(
            Arc::new(client),
            Arc::new(fetcher),
            ControllerConfig::default(),
        )
    }

    // =========================================================================
    // Reconciliation Story Tests
    // =========================================================================

    /// Story: a new DummySite gets all four child objects and becomes Ready
    #[tokio::test]
    async fn story_new_site_becomes_ready() {
        let mut client = MockSiteKubeClient::new();
        let config_maps: Arc<Mutex<Vec<ConfigMap>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = config_maps.clone();
        client.expect_create_config_map().times(1).returning(move |cm| {
            sink.lock().unwrap().push(cm.clone());
            Ok(())
        });
        client
            .expect_create_deployment()
            .withf(|d| d.metadata.name.as_deref() == Some("blog"))
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_service()
            .withf(|s| s.metadata.name.as_deref() == Some("blog"))
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_ingress()
            .withf(|i| i.metadata.name.as_deref() == Some("blog"))
            .times(1)
            .returning(|_| Ok(()));
        let statuses = record_statuses(&mut client);

        let ctx = context(client, fetcher_returning("<html>ok</html>"));
        let site = sample_site("blog", "http://example.test");

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Ready);
        let config_maps = config_maps.lock().unwrap();
        assert_eq!(config_maps[0].metadata.name.as_deref(), Some("blog-content"));
        assert_eq!(index_html(&config_maps[0]), Some("<html>ok</html>"));

        assert_eq!(phases(&statuses), vec![SitePhase::Processing, SitePhase::Ready]);
        let statuses = statuses.lock().unwrap();
        assert!(statuses.iter().all(|(name, _)| name == "blog"));
        assert_eq!(statuses[0].1.url, "");
        assert_eq!(statuses[1].1.url, "/blog");
        assert_eq!(statuses[1].1.message, None);
    }

    /// Story: an unreachable source site still yields a Ready placeholder
    #[tokio::test]
    async fn story_fetch_failure_serves_error_page() {
        let mut fetcher = MockContentFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Err(Error::Fetch("dns error: no such host".to_string())));

        let mut client = MockSiteKubeClient::new();
        let stored: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = stored.clone();
        client.expect_create_config_map().returning(move |cm| {
            *sink.lock().unwrap() = index_html(cm).map(str::to_string);
            Ok(())
        });
        client.expect_create_deployment().returning(|_| Ok(()));
        client.expect_create_service().returning(|_| Ok(()));
        client.expect_create_ingress().returning(|_| Ok(()));
        let statuses = record_statuses(&mut client);

        let ctx = context(client, fetcher);
        let site = sample_site("broken", "http://nowhere.test");

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Ready);
        let html = stored.lock().unwrap().clone().unwrap();
        assert!(html.contains("Error fetching http://nowhere.test"));
        assert!(html.contains("dns error: no such host"));
        assert_eq!(phases(&statuses), vec![SitePhase::Processing, SitePhase::Ready]);
    }

    /// Story: an existing ConfigMap is replaced with the refreshed content
    #[tokio::test]
    async fn story_existing_config_map_is_replaced() {
        let mut client = MockSiteKubeClient::new();
        client
            .expect_create_config_map()
            .times(1)
            .returning(|_| Err(Error::AlreadyExists("ConfigMap blog-content".to_string())));
        client
            .expect_replace_config_map()
            .withf(|cm| {
                cm.metadata.name.as_deref() == Some("blog-content")
                    && index_html(cm) == Some("<html>v2</html>")
            })
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_create_deployment()
            .returning(|_| Err(Error::AlreadyExists("Deployment blog".to_string())));
        client
            .expect_create_service()
            .returning(|_| Err(Error::AlreadyExists("Service blog".to_string())));
        client
            .expect_create_ingress()
            .returning(|_| Err(Error::AlreadyExists("Ingress blog".to_string())));
        let statuses = record_statuses(&mut client);

        let ctx = context(client, fetcher_returning("<html>v2</html>"));
        let site = sample_site("blog", "http://example.test");

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Ready);
        assert_eq!(phases(&statuses), vec![SitePhase::Processing, SitePhase::Ready]);
    }

    /// Story: a fatal Deployment error fails the run and skips later objects
    #[tokio::test]
    async fn story_deployment_failure_marks_failed() {
        let mut client = MockSiteKubeClient::new();
        client.expect_create_config_map().returning(|_| Ok(()));
        client
            .expect_create_deployment()
            .times(1)
            .returning(|_| Err(api_error(403, "deployments is forbidden")));
        client.expect_create_service().never();
        client.expect_create_ingress().never();
        let statuses = record_statuses(&mut client);

        let ctx = context(client, fetcher_returning("<html>ok</html>"));
        let site = sample_site("blog", "http://example.test");

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Failed);
        assert_eq!(phases(&statuses), vec![SitePhase::Processing, SitePhase::Failed]);
        let statuses = statuses.lock().unwrap();
        let failed = &statuses[1].1;
        assert_eq!(failed.url, "");
        assert!(failed
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("forbidden"));
    }

    /// Story: a site that is already Ready is fully reprocessed
    #[tokio::test]
    async fn story_ready_site_is_reprocessed_from_processing() {
        let mut client = MockSiteKubeClient::new();
        client
            .expect_create_config_map()
            .returning(|_| Err(Error::AlreadyExists("ConfigMap blog-content".to_string())));
        client.expect_replace_config_map().times(1).returning(|_| Ok(()));
        client
            .expect_create_deployment()
            .returning(|_| Err(Error::AlreadyExists("Deployment blog".to_string())));
        client
            .expect_create_service()
            .returning(|_| Err(Error::AlreadyExists("Service blog".to_string())));
        client
            .expect_create_ingress()
            .returning(|_| Err(Error::AlreadyExists("Ingress blog".to_string())));
        let statuses = record_statuses(&mut client);

        let ctx = context(client, fetcher_returning("<html>ok</html>"));
        let mut site = sample_site("blog", "http://example.test");
        site.status = Some(DummySiteStatus::ready("/blog"));

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Ready);
        assert_eq!(phases(&statuses), vec![SitePhase::Processing, SitePhase::Ready]);
    }

    /// Story: status patch failures never change the outcome
    #[tokio::test]
    async fn story_status_patch_failures_are_swallowed() {
        let mut client = MockSiteKubeClient::new();
        client.expect_create_config_map().returning(|_| Ok(()));
        client.expect_create_deployment().returning(|_| Ok(()));
        client.expect_create_service().returning(|_| Ok(()));
        client.expect_create_ingress().returning(|_| Ok(()));
        client
            .expect_patch_site_status()
            .times(2)
            .returning(|_, _| Err(api_error(500, "etcd unavailable")));

        let ctx = context(client, fetcher_returning("<html>ok</html>"));
        let site = sample_site("blog", "http://example.test");

        let phase = reconcile(&site, &ctx, Trigger::Sweep).await;

        assert_eq!(phase, SitePhase::Ready);
    }

    /// Story: an object without a name is rejected before any cluster call
    #[tokio::test]
    async fn story_nameless_site_fails_without_cluster_calls() {
        let client = MockSiteKubeClient::new();
        let mut fetcher = MockContentFetcher::new();
        fetcher.expect_fetch().never();

        let ctx = context(client, fetcher);
        let mut site = sample_site("blog", "http://example.test");
        site.metadata.name = None;

        let phase = reconcile(&site, &ctx, Trigger::Watch).await;

        assert_eq!(phase, SitePhase::Failed);
        assert!(phase.is_terminal());
    }

    /// Story: the public base URL prefixes the reported URL
    #[tokio::test]
    async fn story_public_base_url_is_reported() {
        let mut client = MockSiteKubeClient::new();
        client.expect_create_config_map().returning(|_| Ok(()));
        client.expect_create_deployment().returning(|_| Ok(()));
        client.expect_create_service().returning(|_| Ok(()));
        client.expect_create_ingress().returning(|_| Ok(()));
        let statuses = record_statuses(&mut client);

        let config = ControllerConfig {
            public_base_url: "http://localhost".to_string(),
            ..Default::default()
        };
        let ctx = Context::new(
            Arc::new(client),
            Arc::new(fetcher_returning("<html>ok</html>")),
            config,
        );

        reconcile(&sample_site("blog", "http://example.test"), &ctx, Trigger::Watch).await;

        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses[1].1.url, "http://localhost/blog");
    }

    // =========================================================================
    // apply_manifest Tests
    // =========================================================================

    #[tokio::test]
    async fn apply_reports_created() {
        let mut client = MockSiteKubeClient::new();
        client.expect_create_service().times(1).returning(|_| Ok(()));

        let manifests = synthesize("blog", "<html>ok</html>");
        let outcome = apply_manifest(&client, &SiteManifest::Service(manifests.service))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Created);
    }

    #[tokio::test]
    async fn apply_leaves_existing_ingress_unchanged() {
        let mut client = MockSiteKubeClient::new();
        client
            .expect_create_ingress()
            .returning(|_| Err(Error::AlreadyExists("Ingress blog".to_string())));
        client.expect_replace_config_map().never();

        let manifests = synthesize("blog", "<html>ok</html>");
        let outcome = apply_manifest(&client, &SiteManifest::Ingress(manifests.ingress))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
    }

    #[tokio::test]
    async fn apply_updates_existing_config_map() {
        let mut client = MockSiteKubeClient::new();
        client
            .expect_create_config_map()
            .returning(|_| Err(Error::AlreadyExists("ConfigMap blog-content".to_string())));
        client.expect_replace_config_map().times(1).returning(|_| Ok(()));

        let manifests = synthesize("blog", "<html>ok</html>");
        let outcome = apply_manifest(&client, &SiteManifest::ConfigMap(manifests.config_map))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Updated);
    }

    #[tokio::test]
    async fn apply_propagates_replace_failure() {
        let mut client = MockSiteKubeClient::new();
        client
            .expect_create_config_map()
            .returning(|_| Err(Error::AlreadyExists("ConfigMap blog-content".to_string())));
        client
            .expect_replace_config_map()
            .returning(|_| Err(api_error(422, "invalid")));

        let manifests = synthesize("blog", "<html>ok</html>");
        let result = apply_manifest(&client, &SiteManifest::ConfigMap(manifests.config_map)).await;

        assert!(matches!(result, Err(Error::Kube(_))));
    }

    #[test]
    fn validate_requires_a_name() {
        let mut site = sample_site("blog", "http://example.test");
        assert_eq!(validate(&site).unwrap(), "blog");

        site.metadata.name = Some(String::new());
        assert!(validate(&site).is_err());
    }
}
