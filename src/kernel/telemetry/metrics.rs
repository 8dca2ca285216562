use std::collections::VecDeque;

use super::event::TelemetryEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub clock_stats: ClockStats,
    pub boundary_stats: BoundaryStats,
    pub plans_built: u64,
    pub sequences_ended: u64,
}

/// How unreliable the engine clock has been.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockStats {
    pub stale_rejected: u64,
    pub stale_abandoned: u64,
    pub resettled: u64,
    pub seeks_confirmed: u64,
    pub settling_timeouts: u64,
    pub settling_abandoned: u64,
    /// Stale ticks per confirmed seek.
    pub avg_stale_per_seek: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryStats {
    pub dwells_started: u64,
    pub dwells_cancelled: u64,
    pub track_switches: u64,
    pub same_sentence_switches: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    for event in events {
        match event {
            TelemetryEvent::PlanBuilt { .. } => snap.plans_built += 1,
            TelemetryEvent::StaleTimeRejected { .. } => snap.clock_stats.stale_rejected += 1,
            TelemetryEvent::StaleTimeAbandoned { resettled, .. } => {
                snap.clock_stats.stale_abandoned += 1;
                if *resettled {
                    snap.clock_stats.resettled += 1;
                }
            }
            TelemetryEvent::SeekConfirmed { .. } => snap.clock_stats.seeks_confirmed += 1,
            TelemetryEvent::SettlingTimeout { .. } => snap.clock_stats.settling_timeouts += 1,
            TelemetryEvent::SettlingAbandoned => snap.clock_stats.settling_abandoned += 1,
            TelemetryEvent::DwellStarted { .. } => snap.boundary_stats.dwells_started += 1,
            TelemetryEvent::DwellCancelled => snap.boundary_stats.dwells_cancelled += 1,
            TelemetryEvent::TrackSwitch { same_sentence, .. } => {
                snap.boundary_stats.track_switches += 1;
                if *same_sentence {
                    snap.boundary_stats.same_sentence_switches += 1;
                }
            }
            TelemetryEvent::SequenceEnded => snap.sequences_ended += 1,
        }
    }

    if snap.clock_stats.seeks_confirmed > 0 {
        snap.clock_stats.avg_stale_per_seek =
            snap.clock_stats.stale_rejected as f64 / snap.clock_stats.seeks_confirmed as f64;
    }

    snap
}
