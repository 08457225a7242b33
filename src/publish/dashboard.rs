//! Latest-cycle state backing the HTML dashboard.

use crate::error::Result;
use crate::metrics::data::Cycle;
use crate::publish::{read_lock, write_lock};
use crate::sampler::Publisher;
use std::sync::{Arc, RwLock};

/// Shared handle holding exactly one cycle, the most recent.
///
/// Publishing swaps an `Arc` under the write lock, so readers get either the
/// previous cycle or the new one in full.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    latest: Arc<RwLock<Option<Arc<Cycle>>>>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent cycle, or `None` before the first publish.
    pub fn latest(&self) -> Option<Arc<Cycle>> {
        read_lock(&self.latest).clone()
    }

    /// Replace the held cycle.
    pub fn replace(&self, cycle: Cycle) {
        let cycle = Arc::new(cycle);
        *write_lock(&self.latest) = Some(cycle);
    }
}

impl Publisher for DashboardState {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn publish(&mut self, cycle: &Cycle) -> Result<()> {
        self.replace(cycle.clone());
        Ok(())
    }
}
