/// Primitives of a platform audio player with a forward-only item queue.
///
/// Implementations wrap the native player (AVQueuePlayer, MediaPlayer, an
/// HTML audio element). All calls happen on the reactor task.
pub trait MediaBackend: Send {
    /// Replace the queue. The first url becomes the current item.
    fn load_queue(&mut self, urls: &[String]);
    fn play(&mut self);
    fn pause(&mut self);
    /// Seek inside the current item.
    fn seek(&mut self, seconds: f64);
    /// Drop the current item and continue with the next queued one.
    fn advance_item(&mut self);
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: f32);
    /// Position inside the current item as last reported by the platform.
    /// May lag behind a seek for several ticks.
    fn current_time(&self) -> f64;
    /// Change the audio session mixing mode. Platforms report this as an
    /// interruption of our own making.
    fn configure_session(&mut self, mix_with_others: bool);

    /// Events for backends polled by the reactor cadence. Backends that
    /// deliver callbacks push `Event::Engine` into the reactor channel instead.
    fn drain_events(&mut self) -> Vec<BackendEvent> {
        Vec::new()
    }
}

/// Raw callbacks from the platform player.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    ItemReady { duration: f64 },
    ItemEnded,
    ItemFailed { message: String },
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    /// Session reconfiguration finished.
    SessionConfigured,
}
