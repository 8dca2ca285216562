use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::PlaybackStatus;
use super::segment::Track;
use crate::config::HeartbeatConfig;
use crate::error::Result;

/// Listening time reported to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub job_id: String,
    pub language: String,
    pub track_kind: Track,
    pub delta_seconds: f64,
}

/// Who the accumulated seconds belong to, resolved at flush time.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatAttribution {
    pub job_id: String,
    pub language: String,
    pub track_kind: Track,
}

pub trait HeartbeatSink: Send + Sync + 'static {
    fn send_heartbeat(&self, heartbeat: Heartbeat) -> impl Future<Output = Result<()>> + Send;
}

/// Sums playing time between flushes.
#[derive(Debug, Clone)]
pub struct HeartbeatAccumulator {
    pending: f64,
    since_flush: Duration,
    flush_interval: Duration,
    min_delta: f64,
}

impl HeartbeatAccumulator {
    pub fn new(config: &HeartbeatConfig) -> Self {
        Self {
            pending: 0.0,
            since_flush: Duration::ZERO,
            flush_interval: config.flush_interval(),
            min_delta: config.min_delta,
        }
    }

    /// Record `elapsed` wall time. Returns a delta when the flush interval is due.
    pub fn sample(&mut self, is_playing: bool, elapsed: Duration) -> Option<f64> {
        self.since_flush += elapsed;
        if is_playing {
            self.pending += elapsed.as_secs_f64();
        }
        if self.since_flush >= self.flush_interval {
            return self.flush();
        }
        None
    }

    /// Take the pending seconds. Amounts under `min_delta` stay pending.
    pub fn flush(&mut self) -> Option<f64> {
        self.since_flush = Duration::ZERO;
        if self.pending < self.min_delta {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    pub fn pending(&self) -> f64 {
        self.pending
    }
}

/// Run the heartbeat loop until `cancel` fires, then flush what is left.
///
/// Samples the published playback status every `sample_interval`, flushes
/// every `flush_interval` and whenever playback stops.
pub fn spawn<S, F>(
    config: HeartbeatConfig,
    status: watch::Receiver<PlaybackStatus>,
    resolve: F,
    sink: S,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: HeartbeatSink,
    F: Fn(&PlaybackStatus) -> Option<HeartbeatAttribution> + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut accumulator = HeartbeatAccumulator::new(&config);
        let mut ticker = interval(config.sample_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // A suspended process must not bill its sleep as listening time.
        let max_elapsed = config.sample_interval() * 2;
        let mut last = Instant::now();
        let mut was_playing = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last).min(max_elapsed);
                    last = now;

                    let snapshot = status.borrow().clone();
                    let playing = snapshot.is_playing;
                    let mut due = accumulator.sample(playing, elapsed);
                    if due.is_none() && was_playing && !playing {
                        due = accumulator.flush();
                    }
                    was_playing = playing;

                    if let Some(delta) = due {
                        deliver(&sink, &resolve, &snapshot, delta).await;
                    }
                }
            }
        }

        let snapshot = status.borrow().clone();
        if let Some(delta) = accumulator.flush() {
            deliver(&sink, &resolve, &snapshot, delta).await;
        }
        info!("Heartbeat loop stopped");
    })
}

async fn deliver<S, F>(sink: &S, resolve: &F, status: &PlaybackStatus, delta: f64)
where
    S: HeartbeatSink,
    F: Fn(&PlaybackStatus) -> Option<HeartbeatAttribution>,
{
    let Some(attribution) = resolve(status) else {
        debug!("No attribution for {:.1}s of playback, dropping", delta);
        return;
    };
    let heartbeat = Heartbeat {
        job_id: attribution.job_id,
        language: attribution.language,
        track_kind: attribution.track_kind,
        delta_seconds: delta,
    };
    if let Err(e) = sink.send_heartbeat(heartbeat).await {
        warn!("Heartbeat of {:.1}s not delivered: {}", delta, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator() -> HeartbeatAccumulator {
        HeartbeatAccumulator::new(&HeartbeatConfig {
            sample_interval_ms: 1000,
            flush_interval_secs: 5,
            min_delta: 1.0,
        })
    }

    #[test]
    fn paused_time_is_not_counted() {
        let mut acc = accumulator();
        assert_eq!(acc.sample(false, Duration::from_secs(1)), None);
        assert_eq!(acc.sample(true, Duration::from_secs(1)), None);
        assert!((acc.pending() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flushes_on_interval_and_keeps_small_amounts() {
        let mut acc = accumulator();
        for _ in 0..4 {
            assert_eq!(acc.sample(true, Duration::from_secs(1)), None);
        }
        assert_eq!(acc.sample(true, Duration::from_secs(1)), Some(5.0));
        assert_eq!(acc.pending(), 0.0);

        acc.sample(true, Duration::from_millis(500));
        assert_eq!(acc.flush(), None);
        assert!((acc.pending() - 0.5).abs() < 1e-9);
    }
}
