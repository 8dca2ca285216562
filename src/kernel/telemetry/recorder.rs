use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot};

/// Events kept per controller before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded log of one controller's telemetry, oldest first.
#[derive(Debug)]
pub struct TelemetryRecorder {
    log: VecDeque<TelemetryEvent>,
    capacity: usize,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TelemetryRecorder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            log: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.log.len() == self.capacity {
            self.log.pop_front();
        }
        self.log.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.log.iter()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Counters over whatever is still retained.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.log)
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }
}
