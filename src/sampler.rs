//! Fixed-interval sampling loop and publisher fan-out.
//!
//! The sampler owns the [`MetricSource`]. Each iteration it probes every
//! device enumerated at startup, assembles a [`Cycle`] and hands the same
//! cycle to every [`Publisher`] in registration order. A failing probe only
//! drops that device from the cycle; a failing publisher is logged and the
//! rest still run.

use crate::error::Result;
use crate::metrics::data::{Cycle, DeviceIdentity, DeviceReading};
use crate::metrics::traits::MetricSource;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A consumer of completed cycles.
///
/// Implementations must not perform unbounded I/O; only the terminal view
/// is allowed to block on the console.
pub trait Publisher: Send {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Consume one cycle.
    fn publish(&mut self, cycle: &Cycle) -> Result<()>;
}

/// Where the sampler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
    Publishing,
    Sleeping,
    Stopped,
}

/// Outcome of fanning one cycle out to every publisher.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishReport {
    /// Publishers that accepted the cycle
    pub published: Vec<&'static str>,
    /// Publishers that failed, with the reason
    pub failed: Vec<(&'static str, String)>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Running totals over the life of a sampler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSummary {
    pub cycles: u64,
    pub probe_failures: u64,
    pub publish_failures: u64,
}

/// Drives sampling and publishing on a fixed cadence.
pub struct Sampler<S: MetricSource> {
    source: S,
    devices: Vec<DeviceIdentity>,
    publishers: Vec<Box<dyn Publisher>>,
    interval: Duration,
    next_tick: u64,
    state: SamplerState,
    summary: SamplerSummary,
}

impl<S: MetricSource> Sampler<S> {
    /// Create a sampler, enumerating the source's devices once.
    pub fn new(mut source: S, interval: Duration) -> Result<Self> {
        let mut devices = source.devices()?;
        devices.sort_by_key(|d| d.index);

        if devices.is_empty() {
            warn!(source = %source.kind(), "Source reported no devices; cycles will be empty");
        } else {
            info!(source = %source.kind(), count = devices.len(), "Enumerated devices");
        }

        Ok(Self {
            source,
            devices,
            publishers: Vec::new(),
            interval,
            next_tick: 0,
            state: SamplerState::Idle,
            summary: SamplerSummary::default(),
        })
    }

    /// Append a publisher. Publishers run in the order they were added.
    pub fn with_publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.publishers.push(Box::new(publisher));
        self
    }

    pub fn devices(&self) -> &[DeviceIdentity] {
        &self.devices
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn summary(&self) -> SamplerSummary {
        self.summary
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe every device and assemble the next cycle.
    pub fn sample(&mut self) -> Cycle {
        self.state = SamplerState::Sampling;
        let mut cycle = Cycle::new(self.next_tick);

        for device in &self.devices {
            match self.source.probe(device, cycle.tick) {
                Ok(snapshot) => cycle.devices.push(DeviceReading {
                    device: device.clone(),
                    snapshot,
                }),
                Err(e) => {
                    self.summary.probe_failures += 1;
                    warn!(
                        tick = cycle.tick,
                        device = device.index,
                        error = %e,
                        "Probe failed; device omitted from this cycle"
                    );
                }
            }
        }

        self.next_tick += 1;
        cycle
    }

    /// Hand `cycle` to every publisher, isolating failures.
    pub fn publish(&mut self, cycle: &Cycle) -> PublishReport {
        self.state = SamplerState::Publishing;
        let mut report = PublishReport::default();

        for publisher in self.publishers.iter_mut() {
            let name = publisher.name();
            let outcome = catch_unwind(AssertUnwindSafe(|| publisher.publish(cycle)));
            match outcome {
                Ok(Ok(())) => report.published.push(name),
                Ok(Err(e)) => {
                    warn!(publisher = name, tick = cycle.tick, error = %e, "Publisher failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    warn!(publisher = name, tick = cycle.tick, "Publisher panicked");
                    report.failed.push((name, "publisher panicked".to_string()));
                }
            }
        }

        self.summary.publish_failures += report.failed.len() as u64;
        self.summary.cycles += 1;
        report
    }

    /// One full Sampling and Publishing pass.
    pub fn step(&mut self) -> (Cycle, PublishReport) {
        let cycle = self.sample();
        let report = self.publish(&cycle);
        debug!(
            tick = cycle.tick,
            devices = cycle.len(),
            failed_publishers = report.failed.len(),
            "Cycle complete"
        );
        (cycle, report)
    }

    /// Enter `Stopped` and release the source's hardware handle.
    pub fn finish(&mut self) -> SamplerSummary {
        if self.state != SamplerState::Stopped {
            self.state = SamplerState::Stopped;
            self.source.release();
        }
        self.summary
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// Shutdown is only observed while sleeping, so a cycle that has started
    /// publishing always completes. Missed ticks are skipped, never replayed.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> SamplerSummary {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            publishers = self.publishers.len(),
            "Sampler started"
        );

        loop {
            self.state = SamplerState::Sleeping;
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Sampler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.step();
                }
            }
        }

        let summary = self.finish();
        info!(
            cycles = summary.cycles,
            probe_failures = summary.probe_failures,
            publish_failures = summary.publish_failures,
            "Sampler stopped"
        );
        summary
    }
}

impl<S: MetricSource + 'static> Sampler<S> {
    /// Spawn the run loop on the tokio runtime.
    pub fn spawn(self) -> SamplerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));
        SamplerHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }
}

/// Handle to a spawned sampler.
pub struct SamplerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<SamplerSummary>,
}

impl SamplerHandle {
    /// Request shutdown and wait for the in-flight cycle to finish.
    pub async fn stop(mut self) -> std::result::Result<SamplerSummary, tokio::task::JoinError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.join.await
    }
}
