use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use gpu_pulse::{
    error::PulseError,
    publish::registry::{COMPUTE_UTILIZATION, GAUGE_NAMES},
    web::create_app,
    AppState, DashboardState, DeviceIdentity, MetricSnapshot, MetricSource, MetricsRegistry,
    Result, Sampler, SourceKind, SyntheticSource, WebConfig, WebServer,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tower::ServiceExt;

fn state() -> (MetricsRegistry, DashboardState, AppState) {
    let registry = MetricsRegistry::new().expect("Should create registry");
    let dashboard = DashboardState::new();
    let state = AppState::new(registry.clone(), dashboard.clone(), 1);
    (registry, dashboard, state)
}

async fn fetch(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("Should get a response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    (status, String::from_utf8(body.to_vec()).expect("Should be UTF-8"))
}

/// Lines of the exposition that are samples, not `# HELP`/`# TYPE`.
fn sample_lines<'a>(text: &'a str, metric: &'a str) -> Vec<&'a str> {
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .filter(|l| l.starts_with(metric) && l[metric.len()..].starts_with('{'))
        .collect()
}

#[tokio::test]
async fn test_synthetic_end_to_end() {
    let (registry, dashboard, state) = state();
    let app = create_app(&WebConfig::default(), state);

    let sampler = Sampler::new(SyntheticSource::new(1), Duration::from_millis(100))
        .expect("Should create sampler")
        .with_publisher(registry.clone())
        .with_publisher(dashboard.clone())
        .spawn();

    tokio::time::sleep(Duration::from_millis(350)).await;

    let (status, metrics) = fetch(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    for name in GAUGE_NAMES {
        let lines = sample_lines(&metrics, name);
        assert_eq!(lines.len(), 1, "expected one series for {}", name);
        assert!(lines[0].contains("gpu_index=\"0\""));
    }

    let (status, page) = fetch(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("H100"));
    assert!(page.contains("http-equiv=\"refresh\""));

    let summary = sampler.stop().await.expect("Sampler task should join");
    assert!(summary.cycles >= 2, "expected several cycles, got {}", summary.cycles);

    // Nothing publishes after stop, so scrapes are stable.
    let (_, first) = fetch(&app, "/metrics").await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let (_, second) = fetch(&app, "/metrics").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_before_first_cycle() {
    let (_, _, state) = state();
    let app = create_app(&WebConfig::default(), state);

    let (status, page) = fetch(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Waiting for first sample"));

    let (status, metrics) = fetch(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics.is_empty());
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (_, _, state) = state();
    let app = create_app(&WebConfig::default(), state);

    let (status, body) = fetch(&app, "/favicon.ico").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

/// Two devices; device 1 fails on odd ticks.
struct FlakySource;

impl MetricSource for FlakySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    fn devices(&mut self) -> Result<Vec<DeviceIdentity>> {
        Ok(vec![
            DeviceIdentity::new(0, "steady"),
            DeviceIdentity::new(1, "flaky"),
        ])
    }

    fn probe(&mut self, device: &DeviceIdentity, tick: u64) -> Result<MetricSnapshot> {
        if device.index == 1 && tick % 2 == 1 {
            return Err(PulseError::probe_failed(device.index, "GPU is lost"));
        }
        Ok(MetricSnapshot {
            compute_utilization_pct: (tick * 10).min(100) as u8,
            memory_controller_utilization_pct: 5,
            memory_used_gb: 1.0,
            memory_total_gb: 16.0,
            power_watts: 100.0,
            power_limit_watts: 0.0,
            pcie_tx_mb_s: 0.0,
            pcie_rx_mb_s: 0.0,
            graphics_clock_mhz: None,
            sm_clock_mhz: None,
        })
    }
}

#[tokio::test]
async fn test_failed_probe_omits_device_and_keeps_stale_gauges() {
    let (registry, dashboard, _) = state();
    let mut sampler = Sampler::new(FlakySource, Duration::from_millis(10))
        .expect("Should create sampler")
        .with_publisher(registry.clone())
        .with_publisher(dashboard.clone());

    let (first, _) = sampler.step();
    assert_eq!(first.len(), 2);

    let (second, report) = sampler.step();
    assert!(report.is_clean());
    assert_eq!(second.len(), 1);
    assert!(second.device(1).is_none());

    let latest = dashboard.latest().expect("Should have a cycle");
    assert_eq!(latest.tick, 1);
    assert_eq!(latest.len(), 1);

    // Device 1 keeps its tick 0 value; device 0 moved on.
    assert_eq!(registry.gauge_value(COMPUTE_UTILIZATION, 1, "flaky"), Some(0.0));
    assert_eq!(registry.gauge_value(COMPUTE_UTILIZATION, 0, "steady"), Some(10.0));
    assert_eq!(sampler.summary().probe_failures, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scrapes_while_sampling() {
    let (registry, dashboard, state) = state();
    let app = create_app(&WebConfig::default(), state);

    let sampler = Sampler::new(SyntheticSource::new(4), Duration::from_millis(5))
        .expect("Should create sampler")
        .with_publisher(registry)
        .with_publisher(dashboard)
        .spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let scrapes = (0..16).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { fetch(&app, "/metrics").await })
    });
    let results = futures_util::future::join_all(scrapes).await;

    for result in results {
        let (status, text) = result.expect("Scrape task should join");
        assert_eq!(status, StatusCode::OK);
        // Whole cycles only: every gauge carries all four devices.
        for name in GAUGE_NAMES {
            assert_eq!(sample_lines(&text, name).len(), 4, "partial series for {}", name);
        }
    }

    sampler.stop().await.expect("Sampler task should join");
}

#[tokio::test]
async fn test_real_listener_serves_metrics() {
    let (registry, dashboard, state) = state();
    let server = WebServer::bind(&WebConfig::new("127.0.0.1", 0), state)
        .await
        .expect("Should bind ephemeral port");
    let addr = server.local_addr();
    let server = server.spawn();

    let mut sampler = Sampler::new(SyntheticSource::new(1), Duration::from_millis(10))
        .expect("Should create sampler")
        .with_publisher(registry)
        .with_publisher(dashboard);
    sampler.step();

    let mut stream = TcpStream::connect(addr).await.expect("Should connect");
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("Should send request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("Should read response");

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("gpu_power_watts{"));

    server.shutdown().await.expect("Server should shut down");
}
