use interlinear::kernel::event::{Intent, PlaybackStatus};
use interlinear::outputs::now_playing::{
    NowPlayingBridge, NowPlayingCenter, NowPlayingInfo, RemoteCommand, TrackMetadata,
};

#[derive(Default)]
struct RecordingCenter {
    published: Vec<NowPlayingInfo>,
    cleared: usize,
}

impl NowPlayingCenter for RecordingCenter {
    fn publish(&mut self, info: &NowPlayingInfo) {
        self.published.push(info.clone());
    }

    fn clear(&mut self) {
        self.cleared += 1;
    }
}

fn bridge() -> NowPlayingBridge<RecordingCenter> {
    let mut bridge = NowPlayingBridge::new(RecordingCenter::default(), 15.0);
    bridge.set_metadata(Some(TrackMetadata {
        title: "Chapter 1".into(),
        artist: Some("Reader".into()),
        artwork_url: None,
    }));
    bridge
}

fn status(is_playing: bool, current_time: f64) -> PlaybackStatus {
    PlaybackStatus {
        is_playing,
        current_time,
        duration: 120.0,
        ..PlaybackStatus::default()
    }
}

#[test]
fn test_publishes_only_meaningful_changes() {
    let mut bridge = bridge();

    assert!(bridge.update(&status(true, 0.0)));
    assert!(!bridge.update(&status(true, 0.5)), "Sub-second drift is extrapolated by the OS");
    assert!(bridge.update(&status(true, 1.2)));
    assert!(bridge.update(&status(false, 1.3)), "Rate change publishes immediately");

    let published = &bridge.center().published;
    assert_eq!(published.len(), 3);
    assert_eq!(published[0].title, "Chapter 1");
    assert_eq!(published[0].rate, 1.0);
    assert_eq!(published[2].rate, 0.0);
}

#[test]
fn test_elapsed_is_clamped_to_duration() {
    let mut bridge = bridge();
    bridge.update(&status(true, 500.0));
    assert_eq!(bridge.center().published[0].elapsed, 120.0);
}

#[test]
fn test_nothing_published_without_metadata() {
    let mut bare = NowPlayingBridge::new(RecordingCenter::default(), 15.0);
    assert!(!bare.update(&status(true, 3.0)));

    let mut bridge = bridge();
    bridge.update(&status(true, 3.0));
    bridge.clear();
    assert!(!bridge.update(&status(true, 10.0)));
    assert_eq!(bridge.center().cleared, 1);
}

#[test]
fn test_remote_commands_map_to_intents() {
    let bridge = bridge();

    assert_eq!(bridge.command_to_intent(RemoteCommand::Toggle), Intent::PlayToggle);
    assert_eq!(bridge.command_to_intent(RemoteCommand::Next), Intent::Next);
    assert_eq!(bridge.command_to_intent(RemoteCommand::Seek(42.0)), Intent::SeekTo(42.0));
    assert_eq!(bridge.command_to_intent(RemoteCommand::SkipForward(None)), Intent::SkipBy(15.0));
    assert_eq!(
        bridge.command_to_intent(RemoteCommand::SkipBackward(Some(5.0))),
        Intent::SkipBy(-5.0)
    );
}
