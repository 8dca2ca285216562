use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handles of in-flight timer tasks, keyed by dwell generation.
///
/// The controller already ignores stale generations; aborting here just
/// stops dead timers from waking the reactor.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    timers: HashMap<u64, JoinHandle<()>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, generation: u64, handle: JoinHandle<()>) {
        self.timers.retain(|_, h| !h.is_finished());
        if let Some(old) = self.timers.insert(generation, handle) {
            old.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (generation, handle) in self.timers.drain() {
            if !handle.is_finished() {
                debug!("Cancelling dwell timer {}", generation);
                handle.abort();
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}
