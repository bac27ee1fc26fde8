//! Startup sweep and watch loop for DummySite resources
//!
//! Both feed DummySites into the reconciler one at a time. The sweep covers
//! everything that changed while the controller was down; the watch loop then
//! follows changes from the sweep's resource version onward and resubscribes
//! after a fixed backoff whenever the stream ends or fails.

use futures::StreamExt;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::controllers::Context;
use crate::crd::SiteEvent;
use crate::metrics::prometheus::{set_watch_ready, HealthGuard, OPERATOR_HEALTH, WATCH_RESTARTS};
use crate::reconcilers::{reconcile, Trigger};
use crate::{Error, Result};

/// Run the DummySite controller until the process is stopped
pub async fn run(ctx: Arc<Context>) {
    info!(namespace = %ctx.config.namespace, "Starting DummySite controller");
    let _health = HealthGuard::acquire(OPERATOR_HEALTH.clone());

    let resource_version = startup_sweep(&ctx).await;
    run_watch_loop(&ctx, resource_version).await
}

/// Reconcile every existing DummySite once, in listing order
///
/// Returns the resource version of the listing so the watch can start right
/// after it. A failed listing is logged and the watch starts from scratch.
pub async fn startup_sweep(ctx: &Context) -> Option<String> {
    info!("Processing existing DummySites");

    let list = match ctx.client.list_sites().await {
        Ok(list) => list,
        Err(e) => {
            error!(error = %e, "Error listing existing DummySites");
            return None;
        }
    };

    info!(count = list.items.len(), "Found existing DummySite(s)");
    for site in &list.items {
        reconcile(site, ctx, Trigger::Sweep).await;
    }

    list.resource_version
}

/// Follow DummySite changes forever, resubscribing after every failure
pub async fn run_watch_loop(ctx: &Context, mut resource_version: Option<String>) {
    loop {
        match watch_once(ctx, &mut resource_version).await {
            Ok(()) => info!("DummySite watch stream ended"),
            Err(Error::WatchExpired(msg)) => {
                warn!(reason = %msg, "DummySite watch expired, relisting on next subscription");
                resource_version = None;
            }
            Err(e) => error!(error = %e, "DummySite watch error"),
        }

        set_watch_ready(false);
        WATCH_RESTARTS.inc();
        info!(backoff = ?ctx.config.watch_backoff, "Restarting DummySite watch");
        tokio::time::sleep(ctx.config.watch_backoff).await;
    }
}

/// Consume one watch subscription until it ends
///
/// `resource_version` tracks the newest object version seen so that the next
/// subscription resumes after it.
pub async fn watch_once(ctx: &Context, resource_version: &mut Option<String>) -> Result<()> {
    let mut events = ctx.client.watch_sites(resource_version.clone()).await?;
    info!(namespace = %ctx.config.namespace, "Watching DummySites");
    set_watch_ready(true);

    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(version) = event.site().resource_version() {
            *resource_version = Some(version);
        }
        handle_event(ctx, event).await;
    }

    Ok(())
}

/// Dispatch one decoded event to the reconciler
pub async fn handle_event(ctx: &Context, event: SiteEvent) {
    let kind = event.kind();
    match event {
        SiteEvent::Added(site) | SiteEvent::Modified(site) => {
            info!("Event: {} - {}", kind, site.name_any());
            reconcile(&site, ctx, Trigger::Watch).await;
        }
        SiteEvent::Deleted(site) => {
            // No cleanup: child objects of a deleted DummySite stay in the cluster.
            info!("Event: {} - {}, child objects are left in place", kind, site.name_any());
        }
    }
}
