//! Controller loops feeding DummySites into the reconciler

pub mod site_controller;

use std::sync::Arc;

use crate::adapters::cluster_client::SiteKubeClient;
use crate::adapters::content_fetcher::ContentFetcher;
use crate::config::ControllerConfig;

/// Shared context for the controller, built once at startup
pub struct Context {
    /// Namespace-scoped Kubernetes access
    pub client: Arc<dyn SiteKubeClient>,
    /// Source of mirrored website content
    pub fetcher: Arc<dyn ContentFetcher>,
    /// Runtime configuration
    pub config: ControllerConfig,
}

impl Context {
    /// Create a new context
    pub fn new(
        client: Arc<dyn SiteKubeClient>,
        fetcher: Arc<dyn ContentFetcher>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            fetcher,
            config,
        })
    }
}
