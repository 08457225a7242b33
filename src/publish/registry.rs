//! Prometheus gauge registry scraped through `/metrics`.
//!
//! Gauges are keyed by `{gpu_index, gpu_name}`. A device missing from a cycle
//! keeps its last published values; series are never deleted.

use crate::error::{PulseError, Result};
use crate::metrics::data::{Cycle, DeviceReading};
use crate::publish::{read_lock, write_lock};
use crate::sampler::Publisher;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::{Arc, RwLock};

pub const COMPUTE_UTILIZATION: &str = "gpu_compute_utilization_percent";
pub const MEMORY_UTILIZATION: &str = "gpu_memory_utilization_percent";
pub const MEMORY_USED: &str = "gpu_memory_used_gigabytes";
pub const POWER: &str = "gpu_power_watts";
pub const PCIE_TX: &str = "gpu_pcie_tx_megabytes_per_second";
pub const PCIE_RX: &str = "gpu_pcie_rx_megabytes_per_second";

/// Every gauge name the registry exports.
pub const GAUGE_NAMES: [&str; 6] = [
    COMPUTE_UTILIZATION,
    MEMORY_UTILIZATION,
    MEMORY_USED,
    POWER,
    PCIE_TX,
    PCIE_RX,
];

const LABELS: [&str; 2] = ["gpu_index", "gpu_name"];

struct Gauges {
    compute_utilization: GaugeVec,
    memory_utilization: GaugeVec,
    memory_used: GaugeVec,
    power: GaugeVec,
    pcie_tx: GaugeVec,
    pcie_rx: GaugeVec,
}

struct Inner {
    registry: Registry,
    gauges: Gauges,
}

/// Shared handle to the gauge registry.
///
/// Writers hold the lock for a whole cycle, so a scrape never sees one device
/// half updated.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("series", &self.series_count())
            .finish()
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &LABELS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl MetricsRegistry {
    /// Create a registry with every GPU gauge registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let gauges = Gauges {
            compute_utilization: gauge(
                &registry,
                COMPUTE_UTILIZATION,
                "GPU compute utilization percent",
            )?,
            memory_utilization: gauge(
                &registry,
                MEMORY_UTILIZATION,
                "GPU memory controller utilization percent",
            )?,
            memory_used: gauge(&registry, MEMORY_USED, "GPU memory in use (GB)")?,
            power: gauge(&registry, POWER, "GPU board power draw (W)")?,
            pcie_tx: gauge(&registry, PCIE_TX, "GPU PCIe transmit throughput (MB/s)")?,
            pcie_rx: gauge(&registry, PCIE_RX, "GPU PCIe receive throughput (MB/s)")?,
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner { registry, gauges })),
        })
    }

    /// Set every gauge for every device present in `cycle`.
    pub fn update(&self, cycle: &Cycle) {
        let inner = write_lock(&self.inner);
        for reading in &cycle.devices {
            set_device(&inner.gauges, reading);
        }
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let families = read_lock(&self.inner).registry.gather();

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;

        String::from_utf8(buffer)
            .map_err(|e| PulseError::render_error(format!("metrics are not UTF-8: {}", e)))
    }

    /// Content type matching [`MetricsRegistry::encode`].
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current value of one gauge for one device, if that series exists.
    pub fn gauge_value(&self, metric: &str, index: u32, name: &str) -> Option<f64> {
        let index = index.to_string();
        let families = read_lock(&self.inner).registry.gather();
        let family = families.iter().find(|f| f.get_name() == metric)?;

        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().iter().all(|l| match l.get_name() {
                    "gpu_index" => l.get_value() == index,
                    "gpu_name" => l.get_value() == name,
                    _ => true,
                })
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Total number of labelled series across all gauges.
    pub fn series_count(&self) -> usize {
        read_lock(&self.inner)
            .registry
            .gather()
            .iter()
            .map(|f| f.get_metric().len())
            .sum()
    }
}

fn set_device(gauges: &Gauges, reading: &DeviceReading) {
    let index = reading.device.index.to_string();
    let labels = [index.as_str(), reading.device.name.as_str()];
    let snap = &reading.snapshot;

    gauges
        .compute_utilization
        .with_label_values(&labels)
        .set(snap.compute_utilization_pct.min(100) as f64);
    gauges
        .memory_utilization
        .with_label_values(&labels)
        .set(snap.memory_controller_utilization_pct.min(100) as f64);
    gauges
        .memory_used
        .with_label_values(&labels)
        .set(snap.memory_used_gb);
    gauges.power.with_label_values(&labels).set(snap.power_watts);
    gauges.pcie_tx.with_label_values(&labels).set(snap.pcie_tx_mb_s);
    gauges.pcie_rx.with_label_values(&labels).set(snap.pcie_rx_mb_s);
}

impl Publisher for MetricsRegistry {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn publish(&mut self, cycle: &Cycle) -> Result<()> {
        self.update(cycle);
        Ok(())
    }
}
