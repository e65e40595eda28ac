//! Prometheus exposition of the latest HS110 sample.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Gauge, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::device_schema::MeasurementField;
use crate::sample::SampleReader;

/// Gauges mirroring one `SampleReader`, refreshed on every scrape.
pub struct Hs110Metrics {
    registry: Registry,
    gauges: [(MeasurementField, Gauge); 4],
    sample: SampleReader,
    // Serialises set-then-gather so concurrent scrapes never mix samples
    scrape: Mutex<()>,
}

impl Hs110Metrics {
    pub fn new(sample: SampleReader) -> Result<Self> {
        let registry = Registry::new();
        let gauges = [
            (
                MeasurementField::Power,
                register_gauge(&registry, "hs110_power_watt", "HS110 Watt measure")?,
            ),
            (
                MeasurementField::Current,
                register_gauge(&registry, "hs110_current", "HS110 Current measure")?,
            ),
            (
                MeasurementField::Voltage,
                register_gauge(&registry, "hs110_voltage", "HS110 Voltage measure")?,
            ),
            (
                MeasurementField::CumulativeEnergy,
                register_gauge(&registry, "hs110_total", "HS110 Energy measure")?,
            ),
        ];

        Ok(Self {
            registry,
            gauges,
            sample,
            scrape: Mutex::new(()),
        })
    }

    /// Renders the text exposition of the sample as it is right now.
    pub fn render(&self) -> Result<String> {
        let _scrape = self.scrape.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.sample.snapshot();
        for (field, gauge) in &self.gauges {
            gauge.set(snapshot.value(*field));
        }
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .context("failed to encode metrics")
    }
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("failed to register gauge {name}"))?;
    Ok(gauge)
}

/// Router serving `GET /metrics`.
pub fn metrics_router(metrics: Arc<Hs110Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<Hs110Metrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error").into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Binds `addr` and serves the metrics in a background task.
    pub async fn start(addr: SocketAddr, metrics: Arc<Hs110Metrics>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind metrics listener {addr}"))?;
        let addr = listener.local_addr()?;
        info!(address = %addr, "exporter listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = metrics_router(metrics);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .context("metrics server encountered an error")
        });

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// Bound address, useful when started on port 0.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn sample() -> Sample {
        Sample {
            current: 1110.0,
            voltage: 229865.0,
            power: 231866.0,
            cumulative_energy: 228.0,
            error_code: 0,
        }
    }

    #[test]
    fn test_render_empty_sample() {
        let metrics = Hs110Metrics::new(SampleReader::default()).unwrap();
        let text = metrics.render().unwrap();
        assert!(text.contains("# HELP hs110_power_watt HS110 Watt measure"));
        assert!(text.contains("# TYPE hs110_current gauge"));
        assert!(text.contains("hs110_voltage 0\n"));
        assert!(text.contains("hs110_total 0\n"));
    }

    #[test]
    fn test_render_tracks_reader() {
        let reader = SampleReader::default();
        let metrics = Hs110Metrics::new(reader.clone()).unwrap();

        reader.replace(sample());
        let text = metrics.render().unwrap();
        assert!(text.contains("hs110_power_watt 231866\n"));
        assert!(text.contains("hs110_current 1110\n"));
        assert!(text.contains("hs110_voltage 229865\n"));
        assert!(text.contains("hs110_total 228\n"));

        reader.replace(Sample::empty());
        assert!(metrics.render().unwrap().contains("hs110_power_watt 0\n"));
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let reader = SampleReader::default();
        reader.replace(sample());
        let app = metrics_router(Arc::new(Hs110Metrics::new(reader).unwrap()));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            prometheus::TEXT_FORMAT
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("hs110_current 1110\n"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = metrics_router(Arc::new(Hs110Metrics::new(SampleReader::default()).unwrap()));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
