use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use super::cancel::CancellationRegistry;
use super::event::{Event, Notification};

/// Work a reactor step hands to the async driver. Steps never await.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    ArmDwellTimer { generation: u64, after: Duration },
    CancelTimers,
    Notify(Notification),
}

/// Executes side effects: spawns wall-clock timers that report back into
/// the reactor channel and forwards notifications to the UI.
pub struct Scheduler {
    tx: mpsc::Sender<Event>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    timers: CancellationRegistry,
}

impl Scheduler {
    pub fn new(tx: mpsc::Sender<Event>, notify_tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            tx,
            notify_tx,
            timers: CancellationRegistry::new(),
        }
    }

    pub fn execute(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::ArmDwellTimer { generation, after } => {
                    // Real timer: the engine's time observer is silent while paused.
                    let tx = self.tx.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        if tx.send(Event::DwellElapsed { generation }).await.is_err() {
                            warn!("Reactor gone before dwell timer {} fired", generation);
                        }
                    });
                    self.timers.track(generation, handle);
                }
                SideEffect::CancelTimers => self.timers.cancel_all(),
                SideEffect::Notify(notification) => {
                    // Receiver dropped means nobody is watching; not an error.
                    let _ = self.notify_tx.send(notification);
                }
            }
        }
    }

    pub fn timers_in_flight(&self) -> usize {
        self.timers.in_flight()
    }
}
