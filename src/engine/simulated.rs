use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;

use super::backend::{BackendEvent, MediaBackend};

/// Every call the adapter made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    LoadQueue(Vec<String>),
    Play,
    Pause,
    Seek(f64),
    AdvanceItem,
    SetRate(f32),
    SetVolume(f32),
    ConfigureSession { mix_with_others: bool },
}

/// In-process stand-in for a platform player.
///
/// Manual mode (`new`) only moves when told to, which lets tests inject
/// stale or lagging clock reports. Realtime mode (`realtime`) advances with
/// the tokio clock on every `drain_events` and emits ready/ended callbacks.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    commands: Vec<BackendCommand>,
    queue: Vec<String>,
    durations: HashMap<String, f64>,
    position: f64,
    /// Overrides what `current_time` reports, simulating a lagging clock.
    reported: Option<f64>,
    playing: bool,
    rate: f32,
    pending: VecDeque<BackendEvent>,
    realtime: bool,
    last_poll: Option<Instant>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            ..Self::default()
        }
    }

    pub fn realtime(durations: HashMap<String, f64>) -> Self {
        Self {
            rate: 1.0,
            durations,
            realtime: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_position(&mut self, seconds: f64) {
        self.position = seconds;
    }

    pub fn report_time(&mut self, reported: Option<f64>) {
        self.reported = reported;
    }

    pub fn push_event(&mut self, event: BackendEvent) {
        self.pending.push_back(event);
    }

    /// Move the playhead by `seconds` of wall time.
    pub fn advance(&mut self, seconds: f64) {
        if !self.playing {
            return;
        }
        self.position += seconds * self.rate as f64;
        let Some(duration) = self.current_duration() else {
            return;
        };
        if self.position >= duration {
            self.position = 0.0;
            self.queue.remove(0);
            self.pending.push_back(BackendEvent::ItemEnded);
            match self.current_duration() {
                Some(next) => self.pending.push_back(BackendEvent::ItemReady { duration: next }),
                None => self.playing = false,
            }
        }
    }

    fn current_duration(&self) -> Option<f64> {
        self.queue.first().and_then(|url| self.durations.get(url)).copied()
    }
}

impl MediaBackend for SimulatedBackend {
    fn load_queue(&mut self, urls: &[String]) {
        self.commands.push(BackendCommand::LoadQueue(urls.to_vec()));
        self.queue = urls.to_vec();
        self.position = 0.0;
        self.playing = false;
        if self.realtime {
            match self.current_duration() {
                Some(duration) => self.pending.push_back(BackendEvent::ItemReady { duration }),
                None => self.pending.push_back(BackendEvent::ItemFailed {
                    message: format!("unknown media {:?}", self.queue.first()),
                }),
            }
        }
    }

    fn play(&mut self) {
        self.commands.push(BackendCommand::Play);
        self.playing = !self.queue.is_empty();
    }

    fn pause(&mut self) {
        self.commands.push(BackendCommand::Pause);
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.commands.push(BackendCommand::Seek(seconds));
        self.position = seconds;
    }

    fn advance_item(&mut self) {
        self.commands.push(BackendCommand::AdvanceItem);
        if !self.queue.is_empty() {
            self.queue.remove(0);
        }
        self.position = 0.0;
    }

    fn set_rate(&mut self, rate: f32) {
        self.commands.push(BackendCommand::SetRate(rate));
        self.rate = rate;
    }

    fn set_volume(&mut self, volume: f32) {
        self.commands.push(BackendCommand::SetVolume(volume));
    }

    fn current_time(&self) -> f64 {
        self.reported.unwrap_or(self.position)
    }

    fn configure_session(&mut self, mix_with_others: bool) {
        self.commands.push(BackendCommand::ConfigureSession { mix_with_others });
        self.pending.push_back(BackendEvent::InterruptionBegan);
        self.pending.push_back(BackendEvent::InterruptionEnded { should_resume: true });
        self.pending.push_back(BackendEvent::SessionConfigured);
    }

    fn drain_events(&mut self) -> Vec<BackendEvent> {
        if self.realtime {
            let now = Instant::now();
            if let Some(last) = self.last_poll {
                self.advance(now.duration_since(last).as_secs_f64());
            }
            self.last_poll = Some(now);
        }
        self.pending.drain(..).collect()
    }
}
