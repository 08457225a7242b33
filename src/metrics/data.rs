//! Data structures for GPU metrics.

use serde::{Deserialize, Serialize};

/// Identity of an enumerated device, stable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Enumeration index (0-based)
    pub index: u32,
    /// Marketing name reported by the source (e.g., "NVIDIA H100 80GB HBM3")
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Metrics for a single device taken during one sampling cycle.
///
/// `memory_used_gb <= memory_total_gb` holds for synthetic data but is not
/// enforced on hardware readings, where driver races can briefly violate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Compute (SM) utilization percentage (0 to 100)
    pub compute_utilization_pct: u8,
    /// Memory controller utilization percentage (0 to 100)
    pub memory_controller_utilization_pct: u8,
    /// Device memory in use, in GB
    pub memory_used_gb: f64,
    /// Total device memory, in GB
    pub memory_total_gb: f64,
    /// Current board power draw in watts
    pub power_watts: f64,
    /// Enforced power limit in watts; `0.0` means unknown
    pub power_limit_watts: f64,
    /// PCIe transmit throughput in MB/s
    pub pcie_tx_mb_s: f64,
    /// PCIe receive throughput in MB/s
    pub pcie_rx_mb_s: f64,
    /// Graphics clock in MHz, when the source reports it
    pub graphics_clock_mhz: Option<u32>,
    /// Streaming multiprocessor clock in MHz, when the source reports it
    pub sm_clock_mhz: Option<u32>,
}

impl MetricSnapshot {
    /// Whether the source reported a power limit.
    pub fn has_power_limit(&self) -> bool {
        self.power_limit_watts > 0.0
    }
}

/// One device's identity paired with its snapshot for a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub device: DeviceIdentity,
    pub snapshot: MetricSnapshot,
}

/// Everything sampled during one scheduler iteration.
///
/// Devices are ordered by ascending index. A device whose probe failed is
/// absent rather than present with zeroed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Monotonically increasing cycle counter, starting at 0
    pub tick: u64,
    /// Timestamp when sampling started (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Readings for every device that probed successfully
    pub devices: Vec<DeviceReading>,
}

impl Cycle {
    /// Create an empty cycle stamped with the current time.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            devices: Vec::new(),
        }
    }

    /// Look up a device's reading by index.
    pub fn device(&self, index: u32) -> Option<&DeviceReading> {
        self.devices.iter().find(|r| r.device.index == index)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

/// Clamp a raw percentage into `0..=100`. Non-finite input maps to 0.
pub fn clamp_pct(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// Convert a byte count to GB (1024^3 bytes).
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}
