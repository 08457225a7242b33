//! Deterministic synthetic GPU source.
//!
//! Models a smooth periodic workload so the rest of the system can run on
//! hosts without compatible hardware. Jitter comes from a `SmallRng` seeded
//! once, so a fixed seed and probe sequence always yields the same snapshots.

use crate::error::{PulseError, Result};
use crate::metrics::data::{clamp_pct, DeviceIdentity, MetricSnapshot};
use crate::metrics::traits::{MetricSource, SourceKind};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Name reported for every synthetic device.
pub const SYNTHETIC_DEVICE_NAME: &str = "NVIDIA H100 80GB HBM3";

/// Shape of the synthetic workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticProfile {
    /// Angular frequency in radians per tick
    pub omega: f64,
    /// Peak-to-trough utilization span (percent)
    pub scale: f64,
    /// Jitter is drawn uniformly from `[-jitter_bound, +jitter_bound]`
    pub jitter_bound: f64,
    /// Phase shift between consecutive device indices, in radians
    pub device_phase: f64,
    pub memory_total_gb: f64,
    pub idle_power_watts: f64,
    pub power_limit_watts: f64,
    pub max_pcie_tx_mb_s: f64,
    pub max_pcie_rx_mb_s: f64,
    pub max_graphics_clock_mhz: u32,
    pub max_sm_clock_mhz: u32,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            omega: 0.1,
            scale: 100.0,
            jitter_bound: 3.0,
            device_phase: 0.7,
            memory_total_gb: 80.0,
            idle_power_watts: 70.0,
            power_limit_watts: 700.0,
            max_pcie_tx_mb_s: 12_000.0,
            max_pcie_rx_mb_s: 20_000.0,
            max_graphics_clock_mhz: 1980,
            max_sm_clock_mhz: 1980,
        }
    }
}

/// Synthetic metric source.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    device_count: u32,
    rng: SmallRng,
    profile: SyntheticProfile,
}

impl SyntheticSource {
    /// Create a synthetic source exposing `device_count` devices.
    pub fn new(device_count: u32) -> Self {
        Self {
            device_count,
            rng: SmallRng::seed_from_u64(0),
            profile: SyntheticProfile::default(),
        }
    }

    /// Reseed the jitter generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn profile(&self) -> &SyntheticProfile {
        &self.profile
    }

    pub fn device_count(&self) -> u32 {
        self.device_count
    }

    /// Noiseless utilization curve for `device_index` at `tick`, in percent.
    pub fn baseline(&self, device_index: u32, tick: u64) -> f64 {
        let phase = tick as f64 * self.profile.omega + device_index as f64 * self.profile.device_phase;
        (phase.sin() + 1.0) / 2.0 * self.profile.scale
    }

    /// Uniform jitter in `[-jitter_bound, +jitter_bound]`.
    fn jitter(&mut self) -> f64 {
        let bound = self.profile.jitter_bound.abs();
        self.rng.gen_range(-bound..=bound)
    }
}

impl MetricSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn devices(&mut self) -> Result<Vec<DeviceIdentity>> {
        Ok((0..self.device_count)
            .map(|index| DeviceIdentity::new(index, SYNTHETIC_DEVICE_NAME))
            .collect())
    }

    fn probe(&mut self, device: &DeviceIdentity, tick: u64) -> Result<MetricSnapshot> {
        if device.index >= self.device_count {
            return Err(PulseError::probe_failed(device.index, "no such synthetic device"));
        }

        let base = self.baseline(device.index, tick);
        let compute = clamp_pct(base + self.jitter());
        let memory = clamp_pct(base * 0.8 + self.jitter());
        let power_jitter = self.jitter();

        let p = &self.profile;
        let load = (base / p.scale.max(f64::EPSILON)).clamp(0.0, 1.0);
        let power = (p.idle_power_watts + (p.power_limit_watts - p.idle_power_watts) * load + power_jitter)
            .clamp(0.0, p.power_limit_watts);

        Ok(MetricSnapshot {
            compute_utilization_pct: compute,
            memory_controller_utilization_pct: memory,
            memory_used_gb: p.memory_total_gb * (0.3 + 0.6 * load),
            memory_total_gb: p.memory_total_gb,
            power_watts: power,
            power_limit_watts: p.power_limit_watts,
            pcie_tx_mb_s: p.max_pcie_tx_mb_s * load,
            pcie_rx_mb_s: p.max_pcie_rx_mb_s * load,
            graphics_clock_mhz: Some(scale_clock(p.max_graphics_clock_mhz, load)),
            sm_clock_mhz: Some(scale_clock(p.max_sm_clock_mhz, load)),
        })
    }
}

/// Clocks idle at half speed and boost with load.
fn scale_clock(max_mhz: u32, load: f64) -> u32 {
    (max_mhz as f64 * (0.5 + 0.5 * load)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_seq(source: &mut SyntheticSource, ticks: std::ops::Range<u64>) -> Vec<MetricSnapshot> {
        let device = DeviceIdentity::new(0, SYNTHETIC_DEVICE_NAME);
        ticks.map(|t| source.probe(&device, t).unwrap()).collect()
    }

    #[test]
    fn test_enumerates_requested_devices() {
        let mut source = SyntheticSource::new(3);
        let devices = source.devices().unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[2].index, 2);
        assert!(devices.iter().all(|d| d.name.contains("H100")));
    }

    #[test]
    fn test_tick_zero_near_half_scale() {
        let mut source = SyntheticSource::new(1);
        let snap = &probe_seq(&mut source, 0..1)[0];
        let bound = source.profile().jitter_bound;
        let expected = source.profile().scale / 2.0;
        let diff = (snap.compute_utilization_pct as f64 - expected).abs();
        // +0.5 for rounding to an integer percentage
        assert!(diff <= bound + 0.5, "got {} expected {}", snap.compute_utilization_pct, expected);
    }

    #[test]
    fn test_values_within_bounds_and_tolerance() {
        let mut source = SyntheticSource::new(1).with_seed(99);
        let bound = source.profile().jitter_bound;
        for (tick, snap) in probe_seq(&mut source, 0..500).iter().enumerate() {
            assert!(snap.compute_utilization_pct <= 100);
            assert!(snap.memory_controller_utilization_pct <= 100);
            let noiseless = source.baseline(0, tick as u64).clamp(0.0, 100.0);
            let diff = (snap.compute_utilization_pct as f64 - noiseless).abs();
            assert!(diff <= bound + 0.5, "tick {} diff {}", tick, diff);
            assert!(snap.memory_used_gb <= snap.memory_total_gb);
            assert!(snap.power_watts >= 0.0 && snap.power_watts <= snap.power_limit_watts);
            assert!(snap.pcie_tx_mb_s >= 0.0 && snap.pcie_rx_mb_s >= 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = probe_seq(&mut SyntheticSource::new(1).with_seed(7), 0..50);
        let b = probe_seq(&mut SyntheticSource::new(1).with_seed(7), 0..50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_changes_jitter() {
        let a = probe_seq(&mut SyntheticSource::new(1).with_seed(1), 0..50);
        let b = probe_seq(&mut SyntheticSource::new(1).with_seed(2), 0..50);
        assert_ne!(a, b);
    }

    #[test]
    fn test_devices_are_phase_shifted() {
        let source = SyntheticSource::new(2);
        assert_ne!(source.baseline(0, 0), source.baseline(1, 0));
    }

    #[test]
    fn test_unknown_device_fails() {
        let mut source = SyntheticSource::new(1);
        let ghost = DeviceIdentity::new(5, "ghost");
        assert!(source.probe(&ghost, 0).is_err());
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let mut source = SyntheticSource::new(1).with_seed(3);
        let bound = source.profile().jitter_bound;
        for _ in 0..1000 {
            let j = source.jitter();
            assert!((-bound..=bound).contains(&j), "jitter {} out of bound", j);
        }
    }
}
