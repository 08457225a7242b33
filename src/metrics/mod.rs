//! GPU metrics sources and data structures.
//!
//! This module provides the snapshot model, the [`MetricSource`] contract,
//! the NVML-backed hardware source and the deterministic synthetic source,
//! plus the one-time startup selection between them.

pub mod data;
pub mod nvml;
pub mod synthetic;
pub mod traits;

// Re-export commonly used items
pub use data::{Cycle, DeviceIdentity, DeviceReading, MetricSnapshot};
pub use nvml::{DeviceDetails, NvmlSource};
pub use synthetic::SyntheticSource;
pub use traits::{Initialization, MetricSource, SourceKind};

use crate::config::SourceMode;
use crate::error::{PulseError, Result};
use tracing::{info, warn};

/// The source chosen at startup, fixed for the whole run.
#[derive(Debug)]
pub enum ActiveSource {
    Hardware(NvmlSource),
    Synthetic(SyntheticSource),
}

impl ActiveSource {
    /// Installed driver version, for hardware sources.
    pub fn driver_version(&self) -> Option<&str> {
        match self {
            ActiveSource::Hardware(source) => source.driver_version(),
            ActiveSource::Synthetic(_) => None,
        }
    }

    /// Per-device details for the `info` report.
    pub fn describe(&mut self) -> Result<Vec<DeviceDetails>> {
        match self {
            ActiveSource::Hardware(source) => source.describe(),
            ActiveSource::Synthetic(source) => {
                let devices = source.devices()?;
                let mut details = Vec::with_capacity(devices.len());
                for device in devices {
                    let snapshot = source.probe(&device, 0)?;
                    details.push(DeviceDetails {
                        device,
                        pci_bus_id: None,
                        memory_used_gb: snapshot.memory_used_gb,
                        memory_total_gb: snapshot.memory_total_gb,
                    });
                }
                Ok(details)
            }
        }
    }
}

impl MetricSource for ActiveSource {
    fn kind(&self) -> SourceKind {
        match self {
            ActiveSource::Hardware(source) => source.kind(),
            ActiveSource::Synthetic(source) => source.kind(),
        }
    }

    fn devices(&mut self) -> Result<Vec<DeviceIdentity>> {
        match self {
            ActiveSource::Hardware(source) => source.devices(),
            ActiveSource::Synthetic(source) => source.devices(),
        }
    }

    fn probe(&mut self, device: &DeviceIdentity, tick: u64) -> Result<MetricSnapshot> {
        match self {
            ActiveSource::Hardware(source) => source.probe(device, tick),
            ActiveSource::Synthetic(source) => source.probe(device, tick),
        }
    }

    fn release(&mut self) {
        match self {
            ActiveSource::Hardware(source) => source.release(),
            ActiveSource::Synthetic(source) => source.release(),
        }
    }
}

/// What happened during source selection, so the caller can report it.
#[derive(Debug)]
pub struct Selection {
    pub source: ActiveSource,
    /// Why hardware was skipped, when `Auto` fell back to synthetic
    pub fallback_reason: Option<String>,
}

/// Choose the metric source once, at startup.
///
/// `Auto` tries hardware and falls back to synthetic when it is unavailable.
/// `Hardware` has no fallback and fails with `SourceUnavailable`.
pub fn select_source(
    mode: SourceMode,
    hardware: impl FnOnce() -> Initialization<NvmlSource>,
    synthetic: impl FnOnce() -> SyntheticSource,
) -> Result<Selection> {
    match mode {
        SourceMode::Synthetic => {
            info!("Synthetic source requested");
            Ok(Selection {
                source: ActiveSource::Synthetic(synthetic()),
                fallback_reason: None,
            })
        }
        SourceMode::Hardware => match hardware() {
            Initialization::Ready(source) => Ok(Selection {
                source: ActiveSource::Hardware(source),
                fallback_reason: None,
            }),
            Initialization::Unavailable(reason) => Err(PulseError::source_unavailable(reason)),
        },
        SourceMode::Auto => match hardware() {
            Initialization::Ready(source) => Ok(Selection {
                source: ActiveSource::Hardware(source),
                fallback_reason: None,
            }),
            Initialization::Unavailable(reason) => {
                warn!(reason = %reason, "Hardware source unavailable, falling back to synthetic");
                Ok(Selection {
                    source: ActiveSource::Synthetic(synthetic()),
                    fallback_reason: Some(reason),
                })
            }
        },
    }
}
