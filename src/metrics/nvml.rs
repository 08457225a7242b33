//! NVML (NVIDIA Management Library) hardware source.
//!
//! The driver is probed once at startup through [`NvmlSource::initialize`].
//! It's feature-gated to allow compilation on hosts without any NVIDIA
//! tooling; without the `nvml` feature initialization always reports
//! `Unavailable`.

use crate::error::{PulseError, Result};
use crate::metrics::data::{DeviceIdentity, MetricSnapshot};
use crate::metrics::traits::{Initialization, MetricSource, SourceKind};

/// Static details about a device, used by the `info` report.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDetails {
    pub device: DeviceIdentity,
    pub pci_bus_id: Option<String>,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
}

#[cfg(feature = "nvml")]
mod driver {
    use super::*;
    use crate::metrics::data::{bytes_to_gb, clamp_pct};
    use nvml_wrapper::enum_wrappers::device::{Clock, PcieUtilCounter};
    use nvml_wrapper::Nvml;
    use tracing::{debug, info, warn};

    /// Hardware source backed by NVML.
    pub struct NvmlSource {
        // `None` once released
        nvml: Option<Nvml>,
        driver_version: Option<String>,
    }

    impl std::fmt::Debug for NvmlSource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("NvmlSource")
                .field("initialized", &self.nvml.is_some())
                .field("driver_version", &self.driver_version)
                .finish()
        }
    }

    impl NvmlSource {
        /// Load the management library and check that at least one device exists.
        pub fn initialize() -> Initialization<Self> {
            let nvml = match Nvml::init() {
                Ok(nvml) => nvml,
                Err(e) => {
                    return Initialization::Unavailable(format!("Failed to initialize NVML: {}", e))
                }
            };

            match nvml.device_count() {
                Ok(0) => {
                    return Initialization::Unavailable("NVML reports no GPU devices".to_string())
                }
                Ok(count) => debug!(count, "NVML device count"),
                Err(e) => {
                    return Initialization::Unavailable(format!(
                        "Failed to query NVML device count: {}",
                        e
                    ))
                }
            }

            let driver_version = nvml.sys_driver_version().ok();
            info!(
                driver = driver_version.as_deref().unwrap_or("unknown"),
                "NVML initialized"
            );

            Initialization::Ready(Self {
                nvml: Some(nvml),
                driver_version,
            })
        }

        /// Installed driver version, if NVML reported one.
        pub fn driver_version(&self) -> Option<&str> {
            self.driver_version.as_deref()
        }

        fn nvml(&self) -> Result<&Nvml> {
            self.nvml
                .as_ref()
                .ok_or_else(|| PulseError::source_unavailable("NVML handle already released"))
        }

        /// PCI bus id and memory figures for each device.
        pub fn describe(&mut self) -> Result<Vec<DeviceDetails>> {
            let devices = self.devices()?;
            let nvml = self.nvml()?;
            let mut details = Vec::with_capacity(devices.len());

            for device in devices {
                let handle = nvml
                    .device_by_index(device.index)
                    .map_err(|e| PulseError::probe_failed(device.index, e.to_string()))?;
                let pci_bus_id = handle.pci_info().ok().map(|pci| pci.bus_id);
                let (memory_used_gb, memory_total_gb) = handle
                    .memory_info()
                    .map(|m| (bytes_to_gb(m.used), bytes_to_gb(m.total)))
                    .unwrap_or((0.0, 0.0));

                details.push(DeviceDetails {
                    device,
                    pci_bus_id,
                    memory_used_gb,
                    memory_total_gb,
                });
            }

            Ok(details)
        }
    }

    impl MetricSource for NvmlSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Hardware
        }

        fn devices(&mut self) -> Result<Vec<DeviceIdentity>> {
            let nvml = self.nvml()?;
            let count = nvml
                .device_count()
                .map_err(|e| PulseError::source_unavailable(e.to_string()))?;

            let mut devices = Vec::with_capacity(count as usize);
            for index in 0..count {
                let name = nvml
                    .device_by_index(index)
                    .and_then(|handle| handle.name())
                    .unwrap_or_else(|e| {
                        warn!(index, error = %e, "Failed to read device name");
                        format!("GPU {}", index)
                    });
                devices.push(DeviceIdentity::new(index, name));
            }

            Ok(devices)
        }

        fn probe(&mut self, device: &DeviceIdentity, _tick: u64) -> Result<MetricSnapshot> {
            let index = device.index;
            let failed = |what: &str, e: nvml_wrapper::error::NvmlError| {
                PulseError::probe_failed(index, format!("{}: {}", what, e))
            };

            let handle = self
                .nvml()?
                .device_by_index(index)
                .map_err(|e| failed("device handle", e))?;

            // Utilization, memory and power are required; anything else degrades.
            let utilization = handle.utilization_rates().map_err(|e| failed("utilization", e))?;
            let memory = handle.memory_info().map_err(|e| failed("memory info", e))?;
            let power_mw = handle.power_usage().map_err(|e| failed("power usage", e))?;

            let power_limit_watts = handle
                .enforced_power_limit()
                .map(|mw| mw as f64 / 1000.0)
                .unwrap_or(0.0);

            let pcie = |counter: PcieUtilCounter| {
                handle
                    .pcie_throughput(counter)
                    .map(|kb_s| kb_s as f64 / 1024.0)
                    .unwrap_or_else(|e| {
                        debug!(index, error = %e, "PCIe throughput unavailable");
                        0.0
                    })
            };

            Ok(MetricSnapshot {
                compute_utilization_pct: clamp_pct(utilization.gpu as f64),
                memory_controller_utilization_pct: clamp_pct(utilization.memory as f64),
                memory_used_gb: bytes_to_gb(memory.used),
                memory_total_gb: bytes_to_gb(memory.total),
                power_watts: power_mw as f64 / 1000.0,
                power_limit_watts,
                pcie_tx_mb_s: pcie(PcieUtilCounter::Send),
                pcie_rx_mb_s: pcie(PcieUtilCounter::Receive),
                graphics_clock_mhz: handle.clock_info(Clock::Graphics).ok(),
                sm_clock_mhz: handle.clock_info(Clock::SM).ok(),
            })
        }

        fn release(&mut self) {
            if let Some(nvml) = self.nvml.take() {
                match nvml.shutdown() {
                    Ok(()) => info!("NVML handle released"),
                    Err(e) => warn!(error = %e, "NVML shutdown failed"),
                }
            }
        }
    }
}

#[cfg(not(feature = "nvml"))]
mod unsupported {
    use super::*;

    /// Placeholder hardware source for builds without NVML support.
    #[derive(Debug)]
    pub struct NvmlSource;

    impl NvmlSource {
        pub fn initialize() -> Initialization<Self> {
            Initialization::Unavailable("compiled without NVML support".to_string())
        }

        pub fn driver_version(&self) -> Option<&str> {
            None
        }

        pub fn describe(&mut self) -> Result<Vec<DeviceDetails>> {
            Err(PulseError::source_unavailable("compiled without NVML support"))
        }
    }

    impl MetricSource for NvmlSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Hardware
        }

        fn devices(&mut self) -> Result<Vec<DeviceIdentity>> {
            Err(PulseError::source_unavailable("compiled without NVML support"))
        }

        fn probe(&mut self, device: &DeviceIdentity, _tick: u64) -> Result<MetricSnapshot> {
            Err(PulseError::probe_failed(device.index, "compiled without NVML support"))
        }
    }
}

#[cfg(feature = "nvml")]
pub use driver::NvmlSource;

#[cfg(not(feature = "nvml"))]
pub use unsupported::NvmlSource;
