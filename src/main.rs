//! DummySite Kubernetes Controller
//!
//! Main entry point. Reads configuration, connects to the Kubernetes API,
//! starts the metrics server and runs the sweep and watch loop.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dummysite_controller::{
    adapters::{cluster_client::SiteKubeClientImpl, content_fetcher::HttpContentFetcher},
    config::ControllerConfig,
    controllers::{site_controller, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting DummySite controller");

    let config = ControllerConfig::from_env()?;
    info!(
        namespace = %config.namespace,
        metrics_port = config.metrics_port,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let cluster = SiteKubeClientImpl::new(client, config.namespace.clone());
    let fetcher = HttpContentFetcher::new(config.fetch_timeout)?;
    let metrics_port = config.metrics_port;
    let context = Context::new(Arc::new(cluster), Arc::new(fetcher), config);

    let listener = metrics::bind(metrics_port).await?;
    let metrics_handle = tokio::spawn(metrics::serve(listener));
    let controller_handle = tokio::spawn(site_controller::run(context));

    // In-flight reconciliations are not drained on shutdown.
    tokio::select! {
        res = controller_handle => {
            error!(result = ?res, "DummySite controller exited unexpectedly");
            anyhow::bail!("DummySite controller exited unexpectedly");
        }
        res = metrics_handle => {
            error!(result = ?res, "Metrics server exited unexpectedly");
            anyhow::bail!("metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping controller");
        }
    }

    info!("DummySite controller stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,dummysite_controller=debug,kube=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
