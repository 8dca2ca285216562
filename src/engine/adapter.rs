use tracing::{debug, error, info};

use super::backend::{BackendEvent, MediaBackend};
use crate::kernel::time::{file_start, locate_in_files, FilePosition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub auto_play: bool,
    /// Never start on ready, whatever else says so.
    pub force_no_auto_play: bool,
    /// Keep the caller's play/pause intent across the reload (track switches).
    pub preserve_playback_requested: bool,
}

/// Adapter-level events derived from raw backend callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Ready { duration: f64 },
    /// A queued file finished and the next one is now active.
    FileEnded { next_index: usize },
    AllEnded,
    Failed { message: String },
    Interrupted,
    InterruptionEnded { resumed: bool },
}

/// One continuous timeline over several consecutive files.
pub struct MediaEngineAdapter<B: MediaBackend> {
    backend: B,
    urls: Vec<String>,
    current_file_index: usize,
    is_ready: bool,
    is_playing: bool,
    playback_requested: bool,
    autoplay_on_ready: bool,
    pending_seek: Option<f64>,
    duration: f64,
    rate: f32,
    volume: f32,
    target_volume: f32,
    ignoring_session_interruptions: bool,
}

impl<B: MediaBackend> MediaEngineAdapter<B> {
    pub fn new(backend: B, default_volume: f32) -> Self {
        Self {
            backend,
            urls: Vec::new(),
            current_file_index: 0,
            is_ready: false,
            is_playing: false,
            playback_requested: false,
            autoplay_on_ready: false,
            pending_seek: None,
            duration: 0.0,
            rate: 1.0,
            volume: default_volume,
            target_volume: default_volume,
            ignoring_session_interruptions: false,
        }
    }

    pub fn load(&mut self, urls: Vec<String>, options: LoadOptions) {
        self.reset_for_load(urls, options);
        info!("Loading {} file(s), autoplay {}", self.urls.len(), self.autoplay_on_ready);
        self.backend.load_queue(&self.urls);
    }

    /// Load `urls` as one timeline and start at absolute time `at`.
    ///
    /// With `file_durations` for every file of a multi-file queue, the native
    /// queue starts at the file holding `at`; otherwise `at` is an offset into
    /// the first file.
    pub fn load_at(
        &mut self,
        urls: Vec<String>,
        options: LoadOptions,
        at: f64,
        file_durations: Option<&[f64]>,
    ) {
        self.reset_for_load(urls, options);
        let mut target = match file_durations {
            Some(durations) if durations.len() > 1 && durations.len() == self.urls.len() => {
                locate_in_files(at, durations)
            }
            _ => FilePosition {
                index: 0,
                offset: at.max(0.0),
            },
        };
        target.index = target.index.min(self.urls.len().saturating_sub(1));
        self.current_file_index = target.index;
        if target.offset > 0.0 {
            self.pending_seek = Some(target.offset);
        }

        info!(
            "Loading {} file(s) from file {} at {:.2}s, autoplay {}",
            self.urls.len(),
            target.index,
            target.offset,
            self.autoplay_on_ready
        );
        self.backend.load_queue(&self.urls[target.index..]);
    }

    fn reset_for_load(&mut self, urls: Vec<String>, options: LoadOptions) {
        let requested = if options.preserve_playback_requested {
            self.playback_requested
        } else {
            options.auto_play
        };
        self.playback_requested = requested;
        self.autoplay_on_ready = requested && !options.force_no_auto_play;
        self.is_ready = false;
        self.is_playing = false;
        self.pending_seek = None;
        self.duration = 0.0;
        self.current_file_index = 0;
        self.urls = urls;
    }

    pub fn play(&mut self) {
        self.playback_requested = true;
        if self.is_ready {
            self.start();
        } else {
            self.autoplay_on_ready = true;
        }
    }

    pub fn pause(&mut self) {
        self.playback_requested = false;
        self.autoplay_on_ready = false;
        self.stop();
    }

    /// Pause without dropping the play intent (dwell, track reload).
    pub fn pause_transient(&mut self) {
        self.stop();
    }

    /// Record the play intent without starting the engine.
    pub fn request_playback(&mut self) {
        self.playback_requested = true;
    }

    /// Continue if the user still wants playback.
    pub fn resume_if_requested(&mut self) {
        if self.playback_requested && !self.is_playing {
            if self.is_ready {
                self.start();
            } else {
                self.autoplay_on_ready = true;
            }
        }
    }

    pub fn toggle_playback(&mut self) {
        if self.playback_requested {
            self.pause();
        } else {
            self.play();
        }
    }

    fn start(&mut self) {
        self.backend.set_rate(self.rate);
        self.backend.play();
        self.is_playing = true;
    }

    fn stop(&mut self) {
        if self.is_playing {
            self.backend.pause();
        }
        self.is_playing = false;
    }

    /// Seek inside the current file. Deferred until the file is ready.
    pub fn seek(&mut self, to: f64) {
        let to = to.max(0.0);
        if self.is_ready {
            self.backend.seek(to);
        } else {
            self.pending_seek = Some(to);
        }
    }

    /// Seek to an absolute time on the multi-file timeline.
    ///
    /// The native queue only moves forward, so a target in an earlier file
    /// reloads the queue starting from that file.
    pub fn seek_across_files(&mut self, to: f64, file_durations: &[f64]) -> Option<FilePosition> {
        if self.urls.is_empty() {
            return None;
        }
        let mut target = locate_in_files(to, file_durations);
        target.index = target.index.min(self.urls.len() - 1);

        if target.index < self.current_file_index {
            debug!("Backward cross-file seek to file {}, reloading queue", target.index);
            self.current_file_index = target.index;
            self.is_ready = false;
            self.autoplay_on_ready = self.playback_requested;
            self.is_playing = false;
            self.pending_seek = Some(target.offset);
            self.backend.load_queue(&self.urls[target.index..]);
        } else {
            while self.current_file_index < target.index {
                self.backend.advance_item();
                self.current_file_index += 1;
            }
            self.seek(target.offset);
        }
        Some(target)
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.5, 2.0);
        if self.is_playing {
            self.backend.set_rate(self.rate);
        }
    }

    /// Apply a volume without remembering it (forced mutes, ducking).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.volume);
    }

    /// The user's mix setting; `restore_volume` returns to it.
    pub fn set_target_volume(&mut self, volume: f32) {
        self.target_volume = volume.clamp(0.0, 1.0);
        self.set_volume(self.target_volume);
    }

    pub fn restore_volume(&mut self) {
        self.set_volume(self.target_volume);
    }

    /// Switch session mixing. The platform answers with an interruption of
    /// our own making, which is ignored until `SessionConfigured`.
    pub fn reconfigure_session(&mut self, mix_with_others: bool) {
        self.ignoring_session_interruptions = true;
        self.backend.configure_session(mix_with_others);
    }

    pub fn handle_backend_event(&mut self, event: BackendEvent) -> Option<EngineEvent> {
        match event {
            BackendEvent::ItemReady { duration } => {
                self.is_ready = true;
                self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                if let Some(to) = self.pending_seek.take() {
                    self.backend.seek(to);
                }
                if self.autoplay_on_ready {
                    self.autoplay_on_ready = false;
                    self.start();
                }
                Some(EngineEvent::Ready { duration: self.duration })
            }
            BackendEvent::ItemEnded => {
                if self.current_file_index + 1 < self.urls.len() {
                    self.current_file_index += 1;
                    debug!("File ended, now on file {}", self.current_file_index);
                    Some(EngineEvent::FileEnded {
                        next_index: self.current_file_index,
                    })
                } else {
                    // The owner decides whether this ends playback.
                    self.is_playing = false;
                    info!("All files ended");
                    Some(EngineEvent::AllEnded)
                }
            }
            BackendEvent::ItemFailed { message } => {
                error!("Media failed to load: {}", message);
                self.is_ready = false;
                self.is_playing = false;
                self.autoplay_on_ready = false;
                Some(EngineEvent::Failed { message })
            }
            BackendEvent::InterruptionBegan => {
                if self.ignoring_session_interruptions {
                    debug!("Ignoring self-triggered interruption");
                    return None;
                }
                self.stop();
                info!("Audio interrupted");
                Some(EngineEvent::Interrupted)
            }
            BackendEvent::InterruptionEnded { should_resume } => {
                if self.ignoring_session_interruptions {
                    return None;
                }
                let resumed = should_resume && self.playback_requested && self.is_ready;
                if resumed {
                    self.start();
                }
                info!("Interruption ended, resumed {}", resumed);
                Some(EngineEvent::InterruptionEnded { resumed })
            }
            BackendEvent::SessionConfigured => {
                self.ignoring_session_interruptions = false;
                None
            }
        }
    }

    /// Position inside the current file.
    pub fn current_time(&self) -> f64 {
        self.backend.current_time()
    }

    /// Position on the whole multi-file timeline.
    pub fn timeline_time(&self, file_durations: &[f64]) -> f64 {
        file_start(self.current_file_index, file_durations) + self.current_time()
    }

    pub fn active_url(&self) -> Option<&str> {
        self.urls.get(self.current_file_index).map(String::as_str)
    }

    pub fn current_file_index(&self) -> usize {
        self.current_file_index
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn playback_requested(&self) -> bool {
        self.playback_requested
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn target_volume(&self) -> f32 {
        self.target_volume
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
