//! Sequence playback controller.
//!
//! # CURSOR INVARIANT
//! The cursor (`current_segment_index`) is moved only by
//! `advance_to_next_segment` and `commit_target` (plus the settling re-seek,
//! which always targets segment 0). It is **never** inferred from a reported
//! time value: the engine clock is eventually consistent and recomputing
//! the cursor from a stale time jumps to the wrong sentence.
//!
//! The controller performs no I/O. Every decision that needs the outside
//! world is queued as a `SequenceSignal`, drained by the owner with
//! `take_signals` in firing order.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::plan::{AudioMode, Plan, PlanRequest};
use super::segment::{Segment, Track};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::recorder::TelemetryRecorder;
use crate::config::SequenceTuning;

/// External predicate marking a track as hidden (skipped on advance).
pub type SkipPredicate = Box<dyn Fn(Track) -> bool + Send + Sync>;

/// Requests and notifications queued by the controller, in firing order.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceSignal {
    /// Fired before a navigation commit so consumers can freeze rendering.
    WillBeginTransition,
    /// Pause the engine now; the segment end has been reached.
    PauseForDwell { segment_index: usize },
    /// Arm a wall-clock timer; call `dwell_elapsed(generation)` when it fires.
    StartDwellTimer { generation: u64, after: Duration },
    /// Reload the engine on `track` and seek to `time`, then `end_transition`.
    TrackSwitch { track: Track, time: f64 },
    /// Same track continues at `time`; seek if needed, then `end_transition`.
    ResumeAfterDwell { time: f64 },
    /// Plan exhausted. Fired at most once per plan.
    SequenceEnded,
    /// Reported time is trustworthy again.
    TimeStabilized,
    /// Seek the engine to `time` on the current track.
    SeekRequest { time: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    /// No plan, or sequence mode not available.
    Idle,
    Playing,
    /// Waiting for the post-load time to reach the first segment.
    Settling,
    /// Track switch or re-seek outstanding; ticks are ignored.
    Transitioning,
    /// Grace period at a segment end.
    Dwelling,
    Ended,
}

pub struct SequenceController {
    tuning: SequenceTuning,
    plan: Plan,
    /// Plan qualifies for sequence mode. Survives end-of-sequence.
    eligible: bool,
    enabled: bool,
    current_segment_index: usize,
    current_track: Track,
    transitioning: bool,
    expected_position: Option<f64>,
    stale_time_count: u32,
    valid_time_count: u32,
    settling: bool,
    settling_count: u32,
    reseek_attempts: u32,
    /// Generation of the armed dwell timer.
    dwelling: Option<u64>,
    /// Monotonic across resets so an old timer can never match a new dwell.
    next_generation: u64,
    same_sentence_track_switch: bool,
    ended: bool,
    skip_track: Option<SkipPredicate>,
    signals: Vec<SequenceSignal>,
    pub telemetry: TelemetryRecorder,
}

impl SequenceController {
    pub fn new(tuning: SequenceTuning) -> Self {
        Self {
            tuning,
            plan: Plan::default(),
            eligible: false,
            enabled: false,
            current_segment_index: 0,
            current_track: Track::Original,
            transitioning: false,
            expected_position: None,
            stale_time_count: 0,
            valid_time_count: 0,
            settling: false,
            settling_count: 0,
            reseek_attempts: 0,
            dwelling: None,
            next_generation: 0,
            same_sentence_track_switch: false,
            ended: false,
            skip_track: None,
            signals: Vec::new(),
            telemetry: TelemetryRecorder::default(),
        }
    }

    pub fn set_skip_predicate(&mut self, predicate: Option<SkipPredicate>) {
        self.skip_track = predicate;
    }

    fn should_skip(&self, track: Track) -> bool {
        self.skip_track.as_ref().map_or(false, |skip| skip(track))
    }

    // --- Plan lifecycle ---

    /// (Re)initialize for a new session. Invalidates any armed dwell timer.
    pub fn build_plan(&mut self, request: &PlanRequest) {
        let plan = Plan::build(
            &request.sentences,
            request.duration(Track::Original),
            request.duration(Track::Translation),
        );
        let eligible = plan.sequence_eligible(request);

        self.clear_session();
        self.eligible = eligible;
        self.enabled = eligible;
        self.current_track = match (eligible, request.mode) {
            (false, AudioMode::SingleTrack(track)) => track,
            _ => plan.get(0).map(|s| s.track).unwrap_or(Track::Original),
        };
        // The first ticks after a load report wherever the engine was before.
        self.settling = eligible;

        self.telemetry.record(TelemetryEvent::PlanBuilt {
            segments: plan.len(),
            sentences: plan.sentence_indices().len(),
            sequence_enabled: eligible,
        });
        info!(
            "Plan built: {} segments, sequence mode {}",
            plan.len(),
            if eligible { "on" } else { "off" }
        );
        self.plan = plan;
    }

    /// Tear down all playback bookkeeping. Pending timers become no-ops.
    pub fn reset(&mut self) {
        self.clear_session();
        self.plan = Plan::default();
        debug!("Sequence controller reset");
    }

    fn clear_session(&mut self) {
        if self.dwelling.take().is_some() {
            self.telemetry.record(TelemetryEvent::DwellCancelled);
        }
        self.eligible = false;
        self.enabled = false;
        self.current_segment_index = 0;
        self.current_track = Track::Original;
        self.transitioning = false;
        self.expected_position = None;
        self.stale_time_count = 0;
        self.valid_time_count = 0;
        self.settling = false;
        self.settling_count = 0;
        self.reseek_attempts = 0;
        self.same_sentence_track_switch = false;
        self.ended = false;
        self.signals.clear();
    }

    // --- Time tracking ---

    /// Feed one engine time tick. Returns true when the tick caused a
    /// track switch (only possible with a zero dwell).
    pub fn update_for_time(&mut self, time: f64, is_playing: bool) -> bool {
        if !self.enabled || !is_playing || self.transitioning {
            return false;
        }
        let Some(segment) = self.plan.get(self.current_segment_index).copied() else {
            return false;
        };

        // === 1. SETTLING ===
        if self.settling && !self.settle(time) {
            return false;
        }

        // === 2. POST-SEEK VALIDATION ===
        if let Some(expected) = self.expected_position {
            if self.is_stale(time, expected, &segment) {
                self.reject_stale(expected, &segment);
                return false;
            }
            self.stale_time_count = 0;
            self.valid_time_count += 1;
            if self.valid_time_count >= self.tuning.valid_ticks_to_confirm {
                self.expected_position = None;
                self.valid_time_count = 0;
                self.telemetry.record(TelemetryEvent::SeekConfirmed {
                    segment_index: self.current_segment_index,
                });
                self.signals.push(SequenceSignal::TimeStabilized);
            }
        }

        // === 3. BOUNDARY ===
        if time >= segment.end - self.tuning.boundary_tolerance {
            if self.dwelling.is_some() {
                return false;
            }
            return self.begin_dwell();
        }

        if self.dwelling.take().is_some() {
            debug!("Time {:.3} back inside segment, dropping dwell", time);
            self.telemetry.record(TelemetryEvent::DwellCancelled);
        }
        false
    }

    /// Returns true once the reported time can be tracked normally.
    fn settle(&mut self, time: f64) -> bool {
        let Some(first) = self.plan.get(self.current_segment_index).copied() else {
            return false;
        };
        let tol = self.tuning.boundary_tolerance;
        if time >= first.start - tol && time <= first.start + self.tuning.settle_window {
            self.settling = false;
            self.settling_count = 0;
            self.reseek_attempts = 0;
            self.signals.push(SequenceSignal::TimeStabilized);
            debug!("Settled at {:.3}", time);
            return true;
        }

        self.settling_count += 1;
        if self.settling_count < self.tuning.max_settling_count {
            return false;
        }
        self.settling_count = 0;

        if self.reseek_attempts < self.tuning.max_reseek_attempts {
            self.reseek_attempts += 1;
            let Some(start) = self.plan.get(0).copied() else {
                return false;
            };
            self.current_segment_index = 0;
            self.current_track = start.track;
            warn!(
                "Time never settled (last {:.3}), re-seeking to {:.3} (attempt {})",
                time, start.start, self.reseek_attempts
            );
            self.telemetry.record(TelemetryEvent::SettlingTimeout {
                attempt: self.reseek_attempts,
            });
            self.signals.push(SequenceSignal::SeekRequest { time: start.start });
            return false;
        }

        // Out of re-seeks: trusting a stale time beats looping forever.
        warn!("Settling abandoned after {} re-seeks, trusting time {:.3}", self.reseek_attempts, time);
        self.settling = false;
        self.reseek_attempts = 0;
        self.telemetry.record(TelemetryEvent::SettlingAbandoned);
        true
    }

    fn is_stale(&self, time: f64, expected: f64, segment: &Segment) -> bool {
        (time - expected).abs() > self.tuning.stale_deviation
            || time > segment.end.max(expected) + self.tuning.stale_overrun
            || time < segment.start - self.tuning.boundary_tolerance
    }

    fn reject_stale(&mut self, expected: f64, segment: &Segment) {
        self.valid_time_count = 0;
        self.stale_time_count += 1;
        self.telemetry.record(TelemetryEvent::StaleTimeRejected {
            segment_index: self.current_segment_index,
        });
        if self.stale_time_count < self.tuning.max_stale_time_count {
            return;
        }

        self.expected_position = None;
        self.stale_time_count = 0;
        let at_plan_start = self.current_segment_index == 0
            && expected <= segment.start + self.tuning.boundary_tolerance;
        if at_plan_start {
            self.settling = true;
            self.settling_count = 0;
        } else {
            warn!(
                "Expected position {:.3} never confirmed, keeping cursor at segment {}",
                expected, self.current_segment_index
            );
        }
        self.telemetry.record(TelemetryEvent::StaleTimeAbandoned {
            segment_index: self.current_segment_index,
            resettled: at_plan_start,
        });
    }

    // --- Dwell ---

    fn begin_dwell(&mut self) -> bool {
        let dwell = self.tuning.dwell();
        if dwell.is_zero() {
            return self.advance_to_next_segment();
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.dwelling = Some(generation);

        self.telemetry.record(TelemetryEvent::DwellStarted {
            segment_index: self.current_segment_index,
        });
        // Pause first: the engine would otherwise run into the next segment.
        self.signals.push(SequenceSignal::PauseForDwell {
            segment_index: self.current_segment_index,
        });
        self.signals.push(SequenceSignal::StartDwellTimer {
            generation,
            after: dwell,
        });
        false
    }

    /// Dwell timer fired. Stale generations are ignored.
    pub fn dwell_elapsed(&mut self, generation: u64) -> bool {
        if self.dwelling != Some(generation) {
            debug!("Ignoring stale dwell timer {}", generation);
            return false;
        }
        self.advance_to_next_segment()
    }

    // --- Advancement ---

    /// Move to the next visible segment. Returns true if the track changed.
    pub fn advance_to_next_segment(&mut self) -> bool {
        // Set before anything else so observers never see a half-moved cursor.
        self.transitioning = true;
        self.dwelling = None;

        if !self.enabled {
            self.transitioning = false;
            return false;
        }

        let previous = self.plan.get(self.current_segment_index).copied();
        let next = (self.current_segment_index + 1..self.plan.len())
            .find(|&i| !self.should_skip(self.plan.segments()[i].track));

        let Some(next) = next else {
            self.enabled = false;
            self.transitioning = false;
            self.same_sentence_track_switch = false;
            if !self.ended {
                self.ended = true;
                info!("Sequence ended after segment {}", self.current_segment_index);
                self.telemetry.record(TelemetryEvent::SequenceEnded);
                self.signals.push(SequenceSignal::SequenceEnded);
            }
            return false;
        };

        let segment = self.plan.segments()[next];
        self.current_segment_index = next;
        let switched = previous.map_or(true, |p| p.track != segment.track);
        self.same_sentence_track_switch =
            switched && previous.map_or(false, |p| p.sentence_index == segment.sentence_index);
        let from = self.current_track;
        self.current_track = segment.track;

        if switched {
            self.telemetry.record(TelemetryEvent::TrackSwitch {
                from,
                to: segment.track,
                sentence_index: segment.sentence_index,
                same_sentence: self.same_sentence_track_switch,
            });
            self.signals.push(SequenceSignal::TrackSwitch {
                track: segment.track,
                time: segment.start,
            });
        } else {
            self.signals.push(SequenceSignal::ResumeAfterDwell { time: segment.start });
        }
        debug!(
            "Advanced to segment {} ({:?} sentence {})",
            next, segment.track, segment.sentence_index
        );
        switched
    }

    // --- Transitions ---

    pub fn begin_transition(&mut self) {
        self.transitioning = true;
        if self.dwelling.take().is_some() {
            self.telemetry.record(TelemetryEvent::DwellCancelled);
        }
    }

    /// Close a seek or reload. `expected_time` opens the stale-time window.
    pub fn end_transition(&mut self, expected_time: Option<f64>) {
        self.transitioning = false;
        self.expected_position = expected_time;
        self.stale_time_count = 0;
        self.valid_time_count = 0;
        self.settling = false;
        self.settling_count = 0;
        self.reseek_attempts = 0;
    }

    // --- Navigation ---

    /// Pure lookup. With a preferred track, that track's segment wins and
    /// the other track is the fallback; without one, the sentence's first
    /// visible segment is chosen.
    pub fn find_sentence_target(&self, sentence: usize, preferred: Option<Track>) -> Option<usize> {
        if !self.eligible {
            return None;
        }
        let mut visible = self
            .plan
            .segments_for_sentence(sentence)
            .filter(|(_, s)| !self.should_skip(s.track));
        match preferred {
            None => visible.next().map(|(i, _)| i),
            Some(track) => {
                let candidates: Vec<(usize, Track)> = visible.map(|(i, s)| (i, s.track)).collect();
                candidates
                    .iter()
                    .find(|(_, t)| *t == track)
                    .or_else(|| candidates.iter().find(|(_, t)| *t == track.other()))
                    .map(|(i, _)| *i)
            }
        }
    }

    /// Move the cursor to `index`. Leaves the controller transitioning; the
    /// caller seeks and then calls `end_transition`.
    pub fn commit_target(&mut self, index: usize) -> Option<Segment> {
        let segment = *self.plan.get(index)?;
        self.begin_transition();

        let previous = self.plan.get(self.current_segment_index).copied();
        self.current_segment_index = index;
        self.current_track = segment.track;
        self.same_sentence_track_switch = previous.map_or(false, |p| {
            p.track != segment.track && p.sentence_index == segment.sentence_index
        });
        self.enabled = self.eligible;
        self.ended = false;
        self.settling = false;
        self.settling_count = 0;
        Some(segment)
    }

    pub fn seek_to_sentence(&mut self, sentence: usize, preferred: Option<Track>) -> Option<Segment> {
        let index = self.find_sentence_target(sentence, preferred)?;
        self.seek_to_target(index, None)
    }

    /// Seek to an absolute `time` on `track`. The cursor is committed to the
    /// sentence holding that time and the offset is kept, clamped to the
    /// segment. A time before the first gate lands on the first sentence.
    pub fn seek_to_time(&mut self, track: Track, time: f64) -> Option<Segment> {
        let sentence = self.plan.sentence_at(track, time).or_else(|| {
            self.plan
                .segments()
                .iter()
                .find(|s| s.track == track)
                .map(|s| s.sentence_index)
        })?;
        let index = self.find_sentence_target(sentence, Some(track))?;
        self.seek_to_target(index, Some((track, time)))
    }

    fn seek_to_target(&mut self, index: usize, at: Option<(Track, f64)>) -> Option<Segment> {
        let previous_track = self.current_track;
        self.signals.push(SequenceSignal::WillBeginTransition);
        let segment = self.commit_target(index)?;
        let time = match at {
            // Hidden track: the fallback segment plays from its start.
            Some((track, time)) if track == segment.track => time.clamp(segment.start, segment.end),
            _ => segment.start,
        };
        if segment.track != previous_track {
            self.signals.push(SequenceSignal::TrackSwitch {
                track: segment.track,
                time,
            });
        } else {
            self.signals.push(SequenceSignal::SeekRequest { time });
        }
        Some(segment)
    }

    pub fn next_sentence(&mut self) -> Option<Segment> {
        let current = self.current_sentence_index()?;
        let indices = self.plan.sentence_indices();
        let target = indices
            .iter()
            .skip_while(|&&s| s != current)
            .skip(1)
            .copied()
            .find(|&s| self.find_sentence_target(s, None).is_some())?;
        self.seek_to_sentence(target, None)
    }

    /// Previous sentence, or the start of the current one when already first.
    pub fn previous_sentence(&mut self) -> Option<Segment> {
        let current = self.current_sentence_index()?;
        let indices = self.plan.sentence_indices();
        let target = indices
            .iter()
            .rev()
            .skip_while(|&&s| s != current)
            .skip(1)
            .copied()
            .find(|&s| self.find_sentence_target(s, None).is_some())
            .unwrap_or(current);
        self.seek_to_sentence(target, None)
    }

    pub fn first_sentence(&mut self) -> Option<Segment> {
        let target = self
            .plan
            .sentence_indices()
            .into_iter()
            .find(|&s| self.find_sentence_target(s, None).is_some())?;
        self.seek_to_sentence(target, None)
    }

    pub fn last_sentence(&mut self) -> Option<Segment> {
        let target = self
            .plan
            .sentence_indices()
            .into_iter()
            .rev()
            .find(|&s| self.find_sentence_target(s, None).is_some())?;
        self.seek_to_sentence(target, None)
    }

    /// Jump to the first playable sentence at or after a chapter start.
    pub fn jump_to_chapter(&mut self, start_sentence: usize) -> Option<Segment> {
        let target = self
            .plan
            .sentence_indices()
            .into_iter()
            .filter(|&s| s >= start_sentence)
            .find(|&s| self.find_sentence_target(s, None).is_some())?;
        self.seek_to_sentence(target, None)
    }

    // --- Observation ---

    pub fn take_signals(&mut self) -> Vec<SequenceSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn phase(&self) -> SequencePhase {
        if self.ended {
            SequencePhase::Ended
        } else if !self.enabled || self.plan.is_empty() {
            SequencePhase::Idle
        } else if self.transitioning {
            SequencePhase::Transitioning
        } else if self.dwelling.is_some() {
            SequencePhase::Dwelling
        } else if self.settling {
            SequencePhase::Settling
        } else {
            SequencePhase::Playing
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn tuning(&self) -> &SequenceTuning {
        &self.tuning
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn is_settling(&self) -> bool {
        self.settling
    }

    pub fn is_dwelling(&self) -> bool {
        self.dwelling.is_some()
    }

    pub fn is_same_sentence_track_switch(&self) -> bool {
        self.same_sentence_track_switch
    }

    pub fn expected_position(&self) -> Option<f64> {
        self.expected_position
    }

    pub fn current_segment_index(&self) -> usize {
        self.current_segment_index
    }

    pub fn current_segment(&self) -> Option<&Segment> {
        self.plan.get(self.current_segment_index)
    }

    pub fn current_track(&self) -> Track {
        self.current_track
    }

    pub fn current_sentence_index(&self) -> Option<usize> {
        self.current_segment().map(|s| s.sentence_index)
    }
}
