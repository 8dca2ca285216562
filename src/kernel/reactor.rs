use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event::{Event, Intent, Notification, PlaybackStatus, SessionRequest};
use super::plan::{AudioMode, PlanRequest};
use super::registry::{OwnerId, PlaybackRegistry, PrimaryAudio};
use super::scheduler::{Scheduler, SideEffect};
use super::segment::Track;
use super::sequence::{SequenceController, SequencePhase, SequenceSignal};
use crate::config::Config;
use crate::engine::adapter::{EngineEvent, LoadOptions, MediaEngineAdapter};
use crate::engine::backend::{BackendEvent, MediaBackend};
use crate::outputs::now_playing::{NowPlayingBridge, NowPlayingCenter};

/// Cloneable entry point into a running reactor.
pub struct ReactorHandle {
    id: OwnerId,
    tx: mpsc::Sender<Event>,
}

impl ReactorHandle {
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Returns false if the reactor is gone.
    pub async fn send(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

impl PrimaryAudio for ReactorHandle {
    fn owner_id(&self) -> OwnerId {
        self.id
    }

    fn preempt(&self, by: OwnerId) {
        // Called from whatever context started the other session; never block.
        if let Err(e) = self.tx.try_send(Event::Preempted { by }) {
            warn!("Could not deliver preemption to {}: {}", self.id, e);
        }
    }
}

struct ActiveSession {
    request: PlanRequest,
    job_id: Option<String>,
    /// Track currently loaded in the engine.
    active_track: Track,
}

enum NavTarget {
    First,
    Previous,
    Next,
    Last,
    Sentence(usize, Option<Track>),
    Chapter(usize),
}

/// One playback session, driven by a single task.
///
/// Every input (engine callbacks, dwell timers, intents, remote commands)
/// arrives as an `Event` and is handled to completion by `step` before the
/// next one is read, so controller and engine state are never observed
/// half-updated.
pub struct Reactor<B: MediaBackend, C: NowPlayingCenter> {
    pub receiver: mpsc::Receiver<Event>,
    handle: Arc<ReactorHandle>,
    config: Config,
    pub controller: SequenceController,
    pub engine: MediaEngineAdapter<B>,
    now_playing: NowPlayingBridge<C>,
    registry: PlaybackRegistry,
    scheduler: Scheduler,
    session: Option<ActiveSession>,
    /// Target time of an outstanding track reload.
    pending_transition: Option<f64>,
    status_tx: watch::Sender<PlaybackStatus>,
    notifications: Option<mpsc::UnboundedReceiver<Notification>>,
}

impl<B: MediaBackend, C: NowPlayingCenter> Reactor<B, C> {
    pub fn new(
        receiver: mpsc::Receiver<Event>,
        tx: mpsc::Sender<Event>,
        backend: B,
        center: C,
        registry: PlaybackRegistry,
        config: Config,
    ) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(PlaybackStatus::default());
        Self {
            receiver,
            handle: Arc::new(ReactorHandle {
                id: Uuid::new_v4(),
                tx: tx.clone(),
            }),
            controller: SequenceController::new(config.sequence.clone()),
            engine: MediaEngineAdapter::new(backend, config.engine.default_volume),
            now_playing: NowPlayingBridge::new(center, config.engine.skip_interval),
            registry,
            scheduler: Scheduler::new(tx, notify_tx),
            session: None,
            pending_transition: None,
            status_tx,
            notifications: Some(notify_rx),
            config,
        }
    }

    pub fn handle(&self) -> Arc<ReactorHandle> {
        self.handle.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    /// The notification stream. Can be taken once.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.notifications.take()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status_tx.borrow().clone()
    }

    pub fn now_playing(&self) -> &NowPlayingBridge<C> {
        &self.now_playing
    }

    /// Handle one event. Never awaits; timers and notifications come back
    /// as side effects for the driver.
    pub fn step(&mut self, event: Event) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        match event {
            Event::Load(request) => self.load_session(*request, &mut effects),
            Event::Engine(raw) => self.on_engine_event(raw, &mut effects),
            Event::TimeTick => self.on_time_tick(&mut effects),
            Event::DwellElapsed { generation } => {
                self.controller.dwell_elapsed(generation);
                self.apply_signals(&mut effects);
            }
            Event::Intent(intent) => self.on_intent(intent, &mut effects),
            Event::Remote(command) => {
                let intent = self.now_playing.command_to_intent(command);
                self.on_intent(intent, &mut effects);
            }
            Event::Preempted { by } => {
                info!("Reactor {} preempted by {}, pausing", self.handle.id, by);
                self.engine.pause();
            }
            Event::Stop | Event::Shutdown => self.stop_session(&mut effects),
        }
        self.publish_status();
        effects
    }

    /// `step` plus immediate execution of its side effects.
    pub fn dispatch(&mut self, event: Event) {
        let effects = self.step(event);
        self.scheduler.execute(effects);
    }

    pub fn timers_in_flight(&self) -> usize {
        self.scheduler.timers_in_flight()
    }

    pub async fn run(mut self) {
        info!("Reactor {} started", self.handle.id);
        let mut cadence = interval(Duration::from_millis(self.config.engine.time_observer_ms));
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.receiver.recv() => {
                    let Some(event) = event else { break };
                    let shutdown = matches!(event, Event::Shutdown);
                    self.dispatch(event);
                    if shutdown {
                        break;
                    }
                }
                _ = cadence.tick() => {
                    let mut effects = Vec::new();
                    for raw in self.engine.backend_mut().drain_events() {
                        effects.extend(self.step(Event::Engine(raw)));
                    }
                    effects.extend(self.step(Event::TimeTick));
                    self.scheduler.execute(effects);
                }
            }
        }
        info!("Reactor {} stopped", self.handle.id);
    }

    // --- Session lifecycle ---

    fn load_session(&mut self, request: SessionRequest, effects: &mut Vec<SideEffect>) {
        self.stop_session(effects);
        self.controller.build_plan(&request.plan);

        let track = if self.controller.is_enabled() {
            self.controller.current_track()
        } else {
            let fallback = request.plan.mode.fallback_track();
            // Sequence mode without one of the files plays whichever exists.
            if request.plan.mode == AudioMode::Sequence && request.plan.media(fallback).is_none() {
                fallback.other()
            } else {
                fallback
            }
        };
        let Some(media) = request.plan.media(track).cloned() else {
            warn!("No media url for {:?} track, nothing to play", track);
            effects.push(SideEffect::Notify(Notification::MediaFailed {
                message: format!("no {} media", track.as_str()),
            }));
            return;
        };

        info!("Loading session on {:?} track, sequence {}", track, self.controller.is_enabled());
        let start = match self.controller.current_segment() {
            Some(first) if self.controller.is_enabled() => first.start,
            _ => 0.0,
        };
        self.engine.load_at(
            media.urls(),
            LoadOptions {
                auto_play: request.auto_play,
                ..LoadOptions::default()
            },
            start,
            media.file_durations().as_deref(),
        );
        if request.auto_play {
            self.registry.begin_playback(self.handle.clone());
        }
        self.now_playing.set_metadata(request.metadata);
        self.session = Some(ActiveSession {
            request: request.plan,
            job_id: request.job_id,
            active_track: track,
        });
    }

    fn stop_session(&mut self, effects: &mut Vec<SideEffect>) {
        effects.push(SideEffect::CancelTimers);
        self.controller.reset();
        self.engine.pause();
        self.pending_transition = None;
        if self.session.take().is_some() {
            self.registry.end_playback(self.handle.id);
            self.now_playing.clear();
            debug!("Session stopped");
        }
    }

    // --- Engine ---

    fn on_engine_event(&mut self, raw: BackendEvent, effects: &mut Vec<SideEffect>) {
        let Some(event) = self.engine.handle_backend_event(raw) else {
            return;
        };
        match event {
            EngineEvent::Ready { .. } => {
                if let Some(time) = self.pending_transition.take() {
                    self.controller.end_transition(Some(time));
                    self.engine.resume_if_requested();
                }
            }
            EngineEvent::AllEnded => {
                if self.controller.is_enabled() {
                    // Gate past the end of the file: the file end is the boundary.
                    if !self.controller.is_transitioning() && !self.controller.is_dwelling() {
                        debug!("Track ended inside a segment, advancing");
                        self.controller.advance_to_next_segment();
                        self.apply_signals(effects);
                    }
                } else if self.session.is_some() {
                    self.engine.pause();
                    effects.push(SideEffect::Notify(Notification::SequenceEnded));
                }
            }
            EngineEvent::Failed { message } => {
                self.pending_transition = None;
                effects.push(SideEffect::Notify(Notification::MediaFailed { message }));
            }
            EngineEvent::FileEnded { next_index } => {
                debug!("Timeline continues in file {}", next_index);
            }
            EngineEvent::Interrupted
            | EngineEvent::InterruptionEnded { .. } => {}
        }
    }

    fn on_time_tick(&mut self, effects: &mut Vec<SideEffect>) {
        if !self.engine.is_playing() || !self.controller.is_enabled() {
            return;
        }
        let time = self.engine_time();
        self.controller.update_for_time(time, true);
        self.apply_signals(effects);
    }

    /// Carry out what the controller asked for, in order.
    fn apply_signals(&mut self, effects: &mut Vec<SideEffect>) {
        for signal in self.controller.take_signals() {
            let notification = match signal {
                SequenceSignal::WillBeginTransition => Notification::WillBeginTransition,
                SequenceSignal::PauseForDwell { .. } => {
                    self.engine.pause_transient();
                    Notification::PausedForDwell
                }
                SequenceSignal::StartDwellTimer { generation, after } => {
                    effects.push(SideEffect::ArmDwellTimer { generation, after });
                    continue;
                }
                SequenceSignal::TrackSwitch { track, time } => {
                    self.switch_track(track, time);
                    Notification::TrackSwitched { track, time }
                }
                SequenceSignal::ResumeAfterDwell { time } => {
                    self.resume_at(time);
                    Notification::ResumedAfterDwell { time }
                }
                SequenceSignal::SequenceEnded => {
                    self.engine.pause();
                    Notification::SequenceEnded
                }
                SequenceSignal::TimeStabilized => Notification::TimeStabilized,
                SequenceSignal::SeekRequest { time } => {
                    if self.controller.is_transitioning() {
                        self.resume_at(time);
                    } else {
                        // Settling re-seek; the controller keeps validating.
                        self.seek_engine(time);
                    }
                    Notification::SeekRequested { time }
                }
            };
            effects.push(SideEffect::Notify(notification));
        }
    }

    fn switch_track(&mut self, track: Track, time: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(media) = session.request.media(track).cloned() else {
            warn!("No media for {:?} track, staying put", track);
            self.controller.end_transition(None);
            return;
        };
        session.active_track = track;
        self.engine.pause_transient();
        self.engine.load_at(
            media.urls(),
            LoadOptions {
                auto_play: false,
                force_no_auto_play: true,
                preserve_playback_requested: true,
            },
            time,
            media.file_durations().as_deref(),
        );
        self.pending_transition = Some(time);
    }

    /// Same-track continuation: seek if the playhead drifted, then close
    /// the transition and continue if the user still wants playback.
    fn resume_at(&mut self, time: f64) {
        let tolerance = self.controller.tuning().boundary_tolerance;
        if (self.engine_time() - time).abs() > tolerance {
            self.seek_engine(time);
        }
        self.controller.end_transition(Some(time));
        self.engine.resume_if_requested();
    }

    // --- Intents ---

    fn on_intent(&mut self, intent: Intent, effects: &mut Vec<SideEffect>) {
        if self.session.is_none() {
            debug!("Ignoring {:?} without a session", intent);
            return;
        }
        match intent {
            Intent::Play => self.play(effects),
            Intent::Pause => self.engine.pause(),
            Intent::PlayToggle => {
                if self.engine.playback_requested() {
                    self.engine.pause();
                } else {
                    self.play(effects);
                }
            }
            Intent::First => self.navigate(NavTarget::First, effects),
            Intent::Previous => self.navigate(NavTarget::Previous, effects),
            Intent::Next => self.navigate(NavTarget::Next, effects),
            Intent::Last => self.navigate(NavTarget::Last, effects),
            Intent::SeekToSentence { sentence, track } => {
                self.navigate(NavTarget::Sentence(sentence, track), effects)
            }
            Intent::JumpToChapter { start_sentence } => {
                self.navigate(NavTarget::Chapter(start_sentence), effects)
            }
            Intent::ResumeAt(position) => self.navigate(
                NavTarget::Sentence(position.sentence_index, position.track),
                effects,
            ),
            Intent::SeekTo(time) => self.seek_to_time(time, effects),
            Intent::SkipBy(delta) => {
                let target = self.engine_time() + delta;
                self.seek_to_time(target, effects);
            }
            Intent::SetRate(rate) => self.engine.set_playback_rate(rate),
            Intent::SetVolume(volume) => self.engine.set_target_volume(volume),
        }
    }

    fn play(&mut self, effects: &mut Vec<SideEffect>) {
        if self.controller.phase() == SequencePhase::Ended {
            self.engine.request_playback();
            self.controller.first_sentence();
            self.apply_signals(effects);
        } else if self.controller.is_dwelling() || self.pending_transition.is_some() {
            // The dwell timer or reload completion starts the engine.
            self.engine.request_playback();
        } else {
            self.engine.play();
        }
        self.registry.begin_playback(self.handle.clone());
    }

    fn navigate(&mut self, target: NavTarget, effects: &mut Vec<SideEffect>) {
        if !self.controller.is_eligible() {
            self.navigate_single_track(target, effects);
            return;
        }
        let moved = match target {
            NavTarget::First => self.controller.first_sentence(),
            NavTarget::Previous => self.controller.previous_sentence(),
            NavTarget::Next => self.controller.next_sentence(),
            NavTarget::Last => self.controller.last_sentence(),
            NavTarget::Sentence(sentence, track) => self.controller.seek_to_sentence(sentence, track),
            NavTarget::Chapter(start) => self.controller.jump_to_chapter(start),
        };
        if moved.is_some() {
            // Any armed dwell timer belongs to the abandoned segment.
            effects.push(SideEffect::CancelTimers);
        }
        self.apply_signals(effects);
    }

    /// Sentence navigation over the active track's gates when sequence
    /// mode is off. Seeks only; there is no cursor to move.
    fn navigate_single_track(&mut self, target: NavTarget, effects: &mut Vec<SideEffect>) {
        let Some(track) = self.session.as_ref().map(|s| s.active_track) else {
            return;
        };
        let plan = self.controller.plan();
        let sentences: Vec<usize> = plan
            .segments()
            .iter()
            .filter(|s| s.track == track)
            .map(|s| s.sentence_index)
            .collect();
        let current = plan.sentence_at(track, self.engine_time());

        let sentence = match target {
            NavTarget::First => sentences.first().copied(),
            NavTarget::Last => sentences.last().copied(),
            NavTarget::Next => match current {
                Some(c) => sentences.iter().copied().find(|&s| s > c),
                None => sentences.first().copied(),
            },
            NavTarget::Previous => current
                .and_then(|c| sentences.iter().rev().copied().find(|&s| s < c))
                .or(current),
            NavTarget::Sentence(s, _) => sentences.contains(&s).then_some(s),
            NavTarget::Chapter(start) => sentences.iter().copied().find(|&s| s >= start),
        };
        let Some(start) = sentence.and_then(|sentence| {
            plan.segments_for_sentence(sentence)
                .find(|(_, s)| s.track == track)
                .map(|(_, s)| s.start)
        }) else {
            return;
        };

        effects.push(SideEffect::Notify(Notification::WillBeginTransition));
        self.seek_engine(start);
        effects.push(SideEffect::Notify(Notification::SeekRequested { time: start }));
    }

    /// Absolute seek on the active track's timeline. In sequence mode the
    /// cursor moves explicitly to the sentence holding `time` and playback
    /// lands on `time` itself.
    fn seek_to_time(&mut self, time: f64, effects: &mut Vec<SideEffect>) {
        let duration = self.engine_duration();
        let time = if duration > 0.0 { time.clamp(0.0, duration) } else { time.max(0.0) };

        if self.controller.is_eligible() {
            let track = self.controller.current_track();
            if self.controller.seek_to_time(track, time).is_some() {
                effects.push(SideEffect::CancelTimers);
            }
            self.apply_signals(effects);
            return;
        }
        self.seek_engine(time);
        effects.push(SideEffect::Notify(Notification::SeekRequested { time }));
    }

    // --- Timeline ---

    /// File durations of the loaded track, when all are known.
    fn timeline(&self) -> Option<Vec<f64>> {
        let session = self.session.as_ref()?;
        session.request.media(session.active_track)?.file_durations()
    }

    /// Playhead on the loaded track's whole timeline.
    fn engine_time(&self) -> f64 {
        match self.timeline() {
            Some(durations) => self.engine.timeline_time(&durations),
            None => self.engine.current_time(),
        }
    }

    fn engine_duration(&self) -> f64 {
        self.timeline()
            .map(|durations| durations.iter().sum::<f64>())
            .unwrap_or_else(|| self.engine.duration())
    }

    fn seek_engine(&mut self, time: f64) {
        match self.timeline() {
            Some(durations) if durations.len() > 1 => {
                self.engine.seek_across_files(time, &durations);
            }
            _ => self.engine.seek(time),
        }
    }

    // --- Observation ---

    fn publish_status(&mut self) {
        let time = self.engine_time();
        let (current_track, current_sentence_index) = if self.controller.is_eligible() {
            (self.controller.current_track(), self.controller.current_sentence_index())
        } else {
            let track = self
                .session
                .as_ref()
                .map_or(self.controller.current_track(), |s| s.active_track);
            (track, self.controller.plan().sentence_at(track, time))
        };

        let status = PlaybackStatus {
            is_playing: self.engine.is_playing(),
            current_time: time,
            duration: self.engine_duration(),
            rate: self.engine.rate(),
            current_track,
            current_sentence_index,
            is_dwelling: self.controller.is_dwelling(),
            is_same_sentence_track_switch: self.controller.is_same_sentence_track_switch(),
            sequence_enabled: self.controller.is_enabled(),
            job_id: self.session.as_ref().and_then(|s| s.job_id.clone()),
        };
        self.now_playing.update(&status);
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}
