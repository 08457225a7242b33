//! Refreshing terminal view.

use crate::error::Result;
use crate::metrics::data::{Cycle, DeviceReading, MetricSnapshot};
use crate::sampler::Publisher;
use std::fmt::Write as _;
use std::io::Write;

/// ANSI: clear screen and move the cursor home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Rendered in place of a value that is unknown or cannot be formatted.
pub const PLACEHOLDER: &str = "--";

const BAR_WIDTH: usize = 20;
const RULE_WIDTH: usize = 64;

/// Publisher that redraws the terminal each cycle.
pub struct TerminalPublisher<W: Write + Send> {
    out: W,
    clear_screen: bool,
}

impl TerminalPublisher<std::io::Stdout> {
    /// Publisher writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPublisher<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            clear_screen: true,
        }
    }

    /// Enable or disable clearing the screen before each redraw.
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    /// Consume the publisher and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Publisher for TerminalPublisher<W> {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn publish(&mut self, cycle: &Cycle) -> Result<()> {
        let text = render_cycle(cycle);
        if self.clear_screen {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Render a cycle as a fixed-width text block.
///
/// Never fails: anything that cannot be formatted shows as [`PLACEHOLDER`].
pub fn render_cycle(cycle: &Cycle) -> String {
    let mut out = String::new();

    let time = chrono::DateTime::from_timestamp_millis(cycle.timestamp as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    // Writing into a String cannot fail.
    let _ = writeln!(out, "GPU Pulse | tick {} | {}", cycle.tick, time);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));

    if cycle.is_empty() {
        let _ = writeln!(out, "No device data this cycle");
        return out;
    }

    for reading in &cycle.devices {
        render_device(&mut out, reading);
    }

    out
}

fn render_device(out: &mut String, reading: &DeviceReading) {
    let snap = &reading.snapshot;

    let _ = writeln!(out, "[{}] {}", reading.device.index, reading.device.name);
    let _ = writeln!(
        out,
        "    Compute {} {:>3}%   Memory {} {:>3}%",
        bar(snap.compute_utilization_pct),
        snap.compute_utilization_pct,
        bar(snap.memory_controller_utilization_pct),
        snap.memory_controller_utilization_pct,
    );
    let _ = writeln!(
        out,
        "    VRAM    {} / {} GB   Power {} / {} W",
        number(snap.memory_used_gb, 1),
        number(snap.memory_total_gb, 1),
        number(snap.power_watts, 1),
        power_limit(snap),
    );
    let _ = writeln!(
        out,
        "    PCIe    TX {} MB/s  RX {} MB/s   Clocks {} / {} MHz",
        number(snap.pcie_tx_mb_s, 1),
        number(snap.pcie_rx_mb_s, 1),
        optional(snap.graphics_clock_mhz),
        optional(snap.sm_clock_mhz),
    );
}

/// `[#####---------------]` style bar for a percentage.
pub(crate) fn bar(pct: u8) -> String {
    let filled = (pct.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Format a non-negative finite number; anything else is a placeholder.
pub(crate) fn number(value: f64, precision: usize) -> String {
    if value.is_finite() && value >= 0.0 {
        format!("{:.*}", precision, value)
    } else {
        PLACEHOLDER.to_string()
    }
}

/// Power limit, or a placeholder when the source reported none.
pub(crate) fn power_limit(snap: &MetricSnapshot) -> String {
    if snap.has_power_limit() {
        number(snap.power_limit_watts, 1)
    } else {
        PLACEHOLDER.to_string()
    }
}

fn optional(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::{DeviceIdentity, MetricSnapshot};

    fn cycle_with(snapshot: MetricSnapshot) -> Cycle {
        let mut cycle = Cycle::new(7);
        cycle.devices.push(DeviceReading {
            device: DeviceIdentity::new(0, "NVIDIA H100 80GB HBM3"),
            snapshot,
        });
        cycle
    }

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            compute_utilization_pct: 75,
            memory_controller_utilization_pct: 30,
            memory_used_gb: 40.0,
            memory_total_gb: 80.0,
            power_watts: 512.25,
            power_limit_watts: 700.0,
            pcie_tx_mb_s: 1200.0,
            pcie_rx_mb_s: 800.0,
            graphics_clock_mhz: Some(1755),
            sm_clock_mhz: Some(1755),
        }
    }

    #[test]
    fn test_render_includes_headline_metrics() {
        let text = render_cycle(&cycle_with(snapshot()));
        assert!(text.contains("tick 7"));
        assert!(text.contains("[0] NVIDIA H100 80GB HBM3"));
        assert!(text.contains(" 75%"));
        assert!(text.contains("40.0 / 80.0 GB"));
        assert!(text.contains("512.2 / 700.0 W") || text.contains("512.3 / 700.0 W"));
        assert!(text.contains("TX 1200.0 MB/s"));
        assert!(text.contains("1755 / 1755 MHz"));
    }

    #[test]
    fn test_unknown_values_render_placeholders() {
        let mut snap = snapshot();
        snap.power_limit_watts = 0.0;
        snap.pcie_tx_mb_s = f64::NAN;
        snap.graphics_clock_mhz = None;
        let text = render_cycle(&cycle_with(snap));
        assert!(text.contains("512.2 / -- W") || text.contains("512.3 / -- W"));
        assert!(text.contains("TX -- MB/s"));
        assert!(text.contains("Clocks -- / 1755 MHz"));
    }

    #[test]
    fn test_empty_cycle() {
        let text = render_cycle(&Cycle::new(0));
        assert!(text.contains("No device data this cycle"));
    }

    #[test]
    fn test_bar_width() {
        assert_eq!(bar(0), format!("[{}]", "-".repeat(20)));
        assert_eq!(bar(100), format!("[{}]", "#".repeat(20)));
        assert_eq!(bar(50).matches('#').count(), 10);
    }

    #[test]
    fn test_publish_writes_and_clears() {
        let mut publisher = TerminalPublisher::new(Vec::new());
        publisher.publish(&cycle_with(snapshot())).unwrap();
        let written = String::from_utf8(publisher.into_inner()).unwrap();
        assert!(written.starts_with(CLEAR_SCREEN));
        assert!(written.contains("NVIDIA H100"));
    }

    #[test]
    fn test_publish_without_clear() {
        let mut publisher = TerminalPublisher::new(Vec::new()).with_clear_screen(false);
        publisher.publish(&Cycle::new(1)).unwrap();
        let written = String::from_utf8(publisher.into_inner()).unwrap();
        assert!(written.starts_with("GPU Pulse"));
    }
}
