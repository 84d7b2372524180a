//! Render timing counters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of completed renders plus counts of requests that produced nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Successful renders.
    pub count: u64,
    /// Sum of all successful render times.
    pub total_time: Duration,
    /// Fastest render, zero until the first one completes.
    pub min_time: Duration,
    /// Slowest render.
    pub max_time: Duration,
    /// Requests dropped because no ready document was available at execution.
    pub dropped: u64,
    /// Requests whose render call returned an error.
    pub failed: u64,
    /// Results thrown away because the document changed while rendering.
    pub discarded: u64,
}

impl PerformanceStats {
    /// Fold one successful render into the counters.
    pub fn record(&mut self, elapsed: Duration) {
        if self.count == 0 || elapsed < self.min_time {
            self.min_time = elapsed;
        }
        if elapsed > self.max_time {
            self.max_time = elapsed;
        }
        self.total_time += elapsed;
        self.count += 1;
    }

    /// Mean render time, zero when nothing was rendered yet.
    #[must_use]
    pub fn average_time(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_time / count,
            Err(_) => Duration::from_secs_f64(self.total_time.as_secs_f64() / self.count as f64),
        }
    }
}
