//! Prometheus collectors for the queue, the reflector and the workers.
//!
//! Collectors are process-wide statics labelled by queue or controller name.
//! They are always updated; exposing them over HTTP is optional and driven by
//! [`MonitoringConfig`](crate::MonitoringConfig).


use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Result;

lazy_static! {
    pub static ref WORKQUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("workqueue_depth", "Current number of keys waiting in the queue"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref WORKQUEUE_ADDS: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_adds_total", "Keys accepted by the queue"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref WORKQUEUE_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_retries_total", "Rate limited requeues"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_total", "Reconcile attempts by outcome"),
        &["controller", "result"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("reconcile_duration_ms", "Reconcile latency in ms")
            .buckets(exponential_buckets(1.0, 2.0, 14).expect("valid buckets")),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref DROPPED_KEYS: IntCounterVec = IntCounterVec::new(
        Opts::new("dropped_keys_total", "Keys dropped after exhausting retries"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref REFLECTOR_RELISTS: IntCounterVec = IntCounterVec::new(
        Opts::new("reflector_relists_total", "Full listings applied to the cache"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref REFLECTOR_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("reflector_events_total", "Deltas applied to the cache"),
        &["name", "type"]
    )
    .expect("metric can not be created");

    pub static ref UNHANDLED_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("unhandled_errors_total", "Errors passed to the error reporter"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers every collector with `registry`.
pub fn register_custom_metrics(registry: &Registry) -> Result<()> {
    registry.register(Box::new(WORKQUEUE_DEPTH.clone()))?;
    registry.register(Box::new(WORKQUEUE_ADDS.clone()))?;
    registry.register(Box::new(WORKQUEUE_RETRIES.clone()))?;
    registry.register(Box::new(RECONCILE_TOTAL.clone()))?;
    registry.register(Box::new(RECONCILE_DURATION.clone()))?;
    registry.register(Box::new(DROPPED_KEYS.clone()))?;
    registry.register(Box::new(REFLECTOR_RELISTS.clone()))?;
    registry.register(Box::new(REFLECTOR_EVENTS.clone()))?;
    registry.register(Box::new(UNHANDLED_ERRORS.clone()))?;
    Ok(())
}

/// Text exposition of `registry`.
pub fn gather_metrics(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Serves `GET /metrics` on `port` until `shutdown_signal` fires.
pub async fn start_metrics_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    match register_custom_metrics(&REGISTRY) {
        Ok(()) | Err(crate::Error::System(crate::SystemError::Metrics(prometheus::Error::AlreadyReg))) => {}
        Err(e) => return Err(e),
    }

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("serving metrics on 0.0.0.0:{port}");
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
    Ok(())
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    match gather_metrics(&REGISTRY) {
        Ok(body) => Ok(body),
        Err(e) => {
            error!("could not encode custom metrics: {}", e);
            Ok(String::default())
        }
    }
}
