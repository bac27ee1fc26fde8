//! Prometheus metrics definitions and the metrics/probe HTTP server

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, Gauge, HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "dummysite_controller_reconciliations_total",
        "Total number of reconciliations",
        &["trigger"]
    ).unwrap();

    /// Total number of failed reconciliations
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "dummysite_controller_reconciliation_errors_total",
        "Total number of failed reconciliations",
        &["trigger"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "dummysite_controller_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["trigger"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Child object apply outcomes
    pub static ref MANIFEST_APPLIES: CounterVec = register_counter_vec!(
        "dummysite_controller_manifest_applies_total",
        "Number of child object applies by kind and outcome",
        &["kind", "outcome"]
    ).unwrap();

    /// Content fetches replaced by the error page
    pub static ref CONTENT_FETCH_FAILURES: Counter = register_counter!(
        "dummysite_controller_content_fetch_failures_total",
        "Number of website fetches that fell back to the error page"
    ).unwrap();

    /// Watch resubscriptions
    pub static ref WATCH_RESTARTS: Counter = register_counter!(
        "dummysite_controller_watch_restarts_total",
        "Number of times the DummySite watch was resubscribed"
    ).unwrap();

    /// Controller health (1 while the controller loop runs, 0 otherwise)
    pub static ref OPERATOR_HEALTH: Gauge = prometheus::register_gauge!(
        "dummysite_controller_health",
        "Controller health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Set once the controller has a live DummySite watch
static WATCH_READY: AtomicBool = AtomicBool::new(false);

/// Record whether the DummySite watch is currently established
pub fn set_watch_ready(ready: bool) {
    WATCH_READY.store(ready, Ordering::Relaxed);
}

/// Holds the health gauge at 1 while alive and resets it to 0 on drop
pub struct HealthGuard {
    gauge: Gauge,
}

impl HealthGuard {
    pub fn acquire(gauge: Gauge) -> Self {
        gauge.set(1.0);
        Self { gauge }
    }
}

impl Drop for HealthGuard {
    fn drop(&mut self) {
        self.gauge.set(0.0);
    }
}

/// Bind the metrics listener on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind metrics server on {}: {}", addr, e))?;
    info!(%addr, "Metrics server listening");
    Ok(listener)
}

/// Serve `/metrics`, `/healthz` and `/readyz` on a bound listener
pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                warn!(%peer, error = %e, "Error serving metrics connection");
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(route(req.uri().path()))
}

fn route(path: &str) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" => probe_response(OPERATOR_HEALTH.get() > 0.0),
        "/readyz" | "/ready" => probe_response(WATCH_READY.load(Ordering::Relaxed)),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

fn probe_response(ok: bool) -> Response<Full<Bytes>> {
    if ok {
        text_response(StatusCode::OK, "ok")
    } else {
        text_response(StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
