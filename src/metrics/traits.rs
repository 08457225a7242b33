//! Traits for GPU metrics collection.

use crate::error::Result;
use crate::metrics::data::{DeviceIdentity, MetricSnapshot};
use std::fmt;

/// Which kind of data source is feeding the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Real hardware through the vendor management library
    Hardware,
    /// Deterministic synthetic workload
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Hardware => write!(f, "hardware"),
            SourceKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Outcome of the one-time, startup capability check of a source.
#[derive(Debug)]
pub enum Initialization<S> {
    /// The source is usable for the whole run
    Ready(S),
    /// The source cannot be used; carries a human-readable reason
    Unavailable(String),
}

/// Trait for sources of per-device GPU metrics.
///
/// A source is owned by the sampler and never shared with the HTTP side.
pub trait MetricSource: Send {
    /// What kind of source this is.
    fn kind(&self) -> SourceKind;

    /// Enumerate the devices this source can probe.
    ///
    /// The sampler calls this exactly once at startup.
    fn devices(&mut self) -> Result<Vec<DeviceIdentity>>;

    /// Take one snapshot of `device` for cycle `tick`.
    ///
    /// An error means the device has no data this cycle; it never aborts the
    /// cycle for other devices.
    fn probe(&mut self, device: &DeviceIdentity, tick: u64) -> Result<MetricSnapshot>;

    /// Release any handle held on the underlying management interface.
    fn release(&mut self) {}
}
