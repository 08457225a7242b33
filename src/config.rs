//! Sampler and source configuration.

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the metric source is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Try hardware, fall back to synthetic
    #[default]
    Auto,
    /// Hardware only; startup fails without a driver
    Hardware,
    /// Synthetic only
    Synthetic,
}

/// Configuration for the sampling loop and its sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,
    /// Source selection strategy
    pub source_mode: SourceMode,
    /// Number of devices the synthetic source exposes
    pub synthetic_devices: u32,
    /// Jitter seed for the synthetic source
    pub seed: u64,
    /// Pause after announcing a fallback so the operator can read it
    pub fallback_grace_ms: u64,
    /// Whether the terminal view is rendered each cycle
    pub terminal: bool,
    /// Whether the terminal view clears the screen before redrawing
    pub clear_screen: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: crate::DEFAULT_INTERVAL_MS,
            source_mode: SourceMode::Auto,
            synthetic_devices: 1,
            seed: 0,
            fallback_grace_ms: 2000,
            terminal: true,
            clear_screen: true,
        }
    }
}

impl MonitorConfig {
    /// Set the sampling interval in milliseconds.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the source selection strategy.
    pub fn with_source_mode(mut self, mode: SourceMode) -> Self {
        self.source_mode = mode;
        self
    }

    /// Set the number of synthetic devices.
    pub fn with_synthetic_devices(mut self, count: u32) -> Self {
        self.synthetic_devices = count;
        self
    }

    /// Set the synthetic jitter seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the fallback grace delay in milliseconds.
    pub fn with_fallback_grace_ms(mut self, grace_ms: u64) -> Self {
        self.fallback_grace_ms = grace_ms;
        self
    }

    /// Enable or disable the terminal view.
    pub fn with_terminal(mut self, enabled: bool) -> Self {
        self.terminal = enabled;
        self
    }

    /// Enable or disable screen clearing in the terminal view.
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn fallback_grace(&self) -> Duration {
        Duration::from_millis(self.fallback_grace_ms)
    }

    /// Dashboard meta-refresh period: the interval rounded up to whole seconds.
    pub fn refresh_secs(&self) -> u64 {
        self.interval_ms.div_ceil(1000).max(1)
    }

    /// Reject settings the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(PulseError::config_error("interval must be greater than 0 ms"));
        }
        if self.synthetic_devices == 0 {
            return Err(PulseError::config_error(
                "synthetic device count must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.source_mode, SourceMode::Auto);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = MonitorConfig::default().with_interval_ms(0);
        assert!(matches!(config.validate(), Err(PulseError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_synthetic_devices() {
        let config = MonitorConfig::default().with_synthetic_devices(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_secs_rounds_up() {
        assert_eq!(MonitorConfig::default().with_interval_ms(100).refresh_secs(), 1);
        assert_eq!(MonitorConfig::default().with_interval_ms(1000).refresh_secs(), 1);
        assert_eq!(MonitorConfig::default().with_interval_ms(1500).refresh_secs(), 2);
    }

    #[test]
    fn test_source_mode_serde() {
        let json = serde_json::to_string(&SourceMode::Synthetic).unwrap();
        assert_eq!(json, "\"synthetic\"");
    }
}
