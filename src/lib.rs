//! HS110 Prometheus Exporter Library
//!
//! This library polls a TP-Link HS110 smart plug over its encrypted TCP protocol,
//! normalises the realtime energy readout of both hardware revisions and exposes
//! the latest sample as Prometheus gauges.

pub mod cipher;
pub mod config;
pub mod device_client;
pub mod device_schema;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod retry_budget;
pub mod sample;

// Re-export commonly used types for easier access
pub use config::ExporterConfig;
pub use device_client::{DeviceClient, RefreshOutcome};
pub use device_schema::{HardwareVariant, MeasurementField};
pub use error::Hs110Error;
pub use metrics::{Hs110Metrics, MetricsServer};
pub use poller::Poller;
pub use sample::{Sample, SampleReader};
