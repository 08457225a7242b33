//! Cycle consumers fed by the sampler.
//!
//! - [`TerminalPublisher`] redraws a fixed-width text view.
//! - [`MetricsRegistry`] keeps Prometheus gauges for `/metrics`.
//! - [`DashboardState`] keeps the latest cycle for the HTML dashboard.
//!
//! The registry and dashboard state are cheap cloneable handles: one clone
//! goes to the sampler as a publisher, another to the HTTP handlers.

pub mod dashboard;
pub mod registry;
pub mod terminal;

pub use dashboard::DashboardState;
pub use registry::MetricsRegistry;
pub use terminal::{render_cycle, TerminalPublisher};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Every critical section leaves the guarded value consistent, so a poisoned
// lock is still safe to use.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
