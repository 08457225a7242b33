//! Server-side rendering of the auto-refreshing dashboard page.

use crate::metrics::data::{Cycle, DeviceReading};
use crate::publish::terminal::{number, power_limit, PLACEHOLDER};
use std::fmt::Write as _;

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #1f2937 0%, #111827 100%);
            color: #e5e7eb;
            min-height: 100vh;
            padding: 20px;
        }
        .container { max-width: 1200px; margin: 0 auto; }
        .header { text-align: center; margin-bottom: 30px; }
        .header h1 { font-size: 2.5rem; margin-bottom: 8px; }
        .header p { opacity: 0.7; }
        .dashboard {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(320px, 1fr));
            gap: 20px;
        }
        .card {
            background: #1f2937;
            border: 1px solid #374151;
            border-radius: 12px;
            padding: 22px;
        }
        .card h3 { color: #76b900; margin-bottom: 4px; }
        .card .index { opacity: 0.6; font-size: 0.9rem; margin-bottom: 14px; }
        .bar-label { display: flex; justify-content: space-between; margin-top: 10px; }
        .bar { background: #374151; border-radius: 6px; height: 12px; overflow: hidden; margin-top: 4px; }
        .bar .fill { background: #76b900; height: 100%; }
        .bar .fill.memory { background: #3b82f6; }
        .detail { margin-top: 10px; font-family: monospace; }
        .status { text-align: center; padding: 20px; opacity: 0.8; }
"#;

/// Render the dashboard for the latest cycle.
///
/// `refresh_secs` drives the meta-refresh so the page reloads on the
/// sampling cadence.
pub fn render_dashboard(cycle: Option<&Cycle>, refresh_secs: u64) -> String {
    let mut body = String::new();

    match cycle {
        None => {
            body.push_str(r#"<div class="status">Waiting for first sample...</div>"#);
        }
        Some(cycle) if cycle.is_empty() => {
            let _ = write!(
                body,
                r#"<div class="status">No device data in cycle {}</div>"#,
                cycle.tick
            );
        }
        Some(cycle) => {
            body.push_str(r#"<div class="dashboard">"#);
            for reading in &cycle.devices {
                render_card(&mut body, reading);
            }
            body.push_str("</div>");
        }
    }

    let updated = cycle
        .and_then(|c| chrono::DateTime::from_timestamp_millis(c.timestamp as i64))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="refresh" content="{refresh}">
    <title>GPU Pulse</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>GPU Pulse</h1>
            <p>Last updated: {updated}</p>
        </div>
        {body}
    </div>
</body>
</html>
"#,
        refresh = refresh_secs.max(1),
        style = STYLE,
        updated = updated,
        body = body,
    )
}

fn render_card(out: &mut String, reading: &DeviceReading) {
    let snap = &reading.snapshot;
    let compute = snap.compute_utilization_pct.min(100);
    let memory = snap.memory_controller_utilization_pct.min(100);

    let _ = write!(
        out,
        r#"
        <div class="card">
            <h3>{name}</h3>
            <div class="index">GPU {index}</div>
            <div class="bar-label"><span>Compute</span><span>{compute}%</span></div>
            <div class="bar"><div class="fill" style="width: {compute}%"></div></div>
            <div class="bar-label"><span>Memory</span><span>{memory}%</span></div>
            <div class="bar"><div class="fill memory" style="width: {memory}%"></div></div>
            <div class="detail">VRAM: {used} / {total} GB</div>
            <div class="detail">Power: {power} / {limit} W</div>
            <div class="detail">PCIe: TX {tx} MB/s | RX {rx} MB/s</div>
        </div>"#,
        name = escape(&reading.device.name),
        index = reading.device.index,
        compute = compute,
        memory = memory,
        used = number(snap.memory_used_gb, 1),
        total = number(snap.memory_total_gb, 1),
        power = number(snap.power_watts, 1),
        limit = power_limit(snap),
        tx = number(snap.pcie_tx_mb_s, 1),
        rx = number(snap.pcie_rx_mb_s, 1),
    );
}

/// Minimal HTML escaping for text content.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
