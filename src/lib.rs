//! # GPU Pulse - GPU Telemetry Sampler
//!
//! Periodically samples GPU telemetry (utilization, memory, power, PCIe
//! throughput, clocks) from NVML or a deterministic synthetic source, and
//! publishes every cycle to three independent consumers.
//!
//! ## Features
//!
//! - **Fixed-cadence sampler**: one loop probes every device and fans the
//!   resulting cycle out to each publisher in order
//! - **Terminal view**: a refreshing fixed-width text view
//! - **Prometheus endpoint**: `/metrics` gauges keyed by `{gpu_index, gpu_name}`
//! - **Web dashboard**: an auto-refreshing HTML page at `/`
//! - **Synthetic fallback**: runs fully on hosts without a compatible driver
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpu_pulse::{
//!     AppState, DashboardState, MetricsRegistry, Sampler, SyntheticSource, WebConfig, WebServer,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = MetricsRegistry::new()?;
//!     let dashboard = DashboardState::new();
//!
//!     let state = AppState::new(registry.clone(), dashboard.clone(), 1);
//!     let server = WebServer::bind(&WebConfig::new("127.0.0.1", 8000), state).await?.spawn();
//!
//!     let sampler = Sampler::new(SyntheticSource::new(1), Duration::from_secs(1))?
//!         .with_publisher(registry)
//!         .with_publisher(dashboard)
//!         .spawn();
//!
//!     tokio::signal::ctrl_c().await?;
//!     sampler.stop().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod sampler;
pub mod web;

// Re-export public API
pub use config::{MonitorConfig, SourceMode};
pub use error::{PulseError, Result};
pub use metrics::{
    data::{Cycle, DeviceIdentity, DeviceReading, MetricSnapshot},
    select_source, ActiveSource, Initialization, MetricSource, NvmlSource, SourceKind,
    SyntheticSource,
};
pub use publish::{render_cycle, DashboardState, MetricsRegistry, TerminalPublisher};
pub use sampler::{Publisher, PublishReport, Sampler, SamplerHandle, SamplerState, SamplerSummary};
pub use web::{AppState, ServerHandle, WebConfig, WebServer};

/// The default sampling interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8000;
