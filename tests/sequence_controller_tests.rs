use std::time::Duration;

use interlinear::config::SequenceTuning;
use interlinear::kernel::plan::{AudioMode, PlanRequest, SentenceGates, TrackMedia};
use interlinear::kernel::segment::Track;
use interlinear::kernel::sequence::{SequenceController, SequencePhase, SequenceSignal};

fn request() -> PlanRequest {
    PlanRequest {
        sentences: vec![
            SentenceGates::new(Some((0.0, 2.0)), Some((2.0, 4.0))),
            SentenceGates::new(Some((4.0, 6.0)), Some((6.0, 8.0))),
        ],
        original: TrackMedia::single("orig.mp3", Some(8.0)),
        translation: TrackMedia::single("trans.mp3", Some(8.0)),
        mode: AudioMode::Sequence,
    }
}

fn controller(tuning: SequenceTuning) -> SequenceController {
    let mut controller = SequenceController::new(tuning);
    controller.build_plan(&request());
    controller
}

/// Controller past settling, with signals drained.
fn playing_controller(tuning: SequenceTuning) -> SequenceController {
    let mut controller = controller(tuning);
    controller.update_for_time(0.0, true);
    assert_eq!(controller.take_signals(), vec![SequenceSignal::TimeStabilized]);
    controller
}

#[test]
fn test_advancing_walks_the_plan_and_ends_once() {
    let mut controller = controller(SequenceTuning::default());
    assert!(controller.is_enabled());
    assert_eq!(controller.current_track(), Track::Original);

    // 1. Orig(s0) -> Trans(s0): same-sentence switch
    assert!(controller.advance_to_next_segment());
    assert!(controller.is_same_sentence_track_switch());
    assert_eq!(
        controller.take_signals(),
        vec![SequenceSignal::TrackSwitch { track: Track::Translation, time: 2.0 }]
    );

    // 2. Two more advances land on Trans(s1)
    controller.advance_to_next_segment();
    assert!(!controller.is_same_sentence_track_switch());
    controller.advance_to_next_segment();
    assert_eq!(controller.current_segment_index(), 3);
    assert_eq!(controller.current_track(), Track::Translation);
    assert_eq!(controller.current_sentence_index(), Some(1));
    controller.take_signals();

    // 3. Fourth advance ends the sequence without a track switch
    assert!(!controller.advance_to_next_segment());
    assert!(!controller.is_enabled());
    assert!(!controller.is_transitioning());
    assert_eq!(controller.take_signals(), vec![SequenceSignal::SequenceEnded]);
    assert_eq!(controller.phase(), SequencePhase::Ended);

    // 4. Further advances never fire it again
    controller.advance_to_next_segment();
    assert!(controller.take_signals().is_empty());
    assert_eq!(controller.telemetry.snapshot().sequences_ended, 1);
}

#[test]
fn test_skip_predicate_hides_a_track() {
    let mut controller = controller(SequenceTuning::default());
    controller.set_skip_predicate(Some(Box::new(|track: Track| track == Track::Translation)));

    // Orig(s0) -> Orig(s1) is a same-track continuation.
    assert!(!controller.advance_to_next_segment());
    assert_eq!(controller.current_segment_index(), 2);
    assert_eq!(controller.take_signals(), vec![SequenceSignal::ResumeAfterDwell { time: 4.0 }]);
}

#[test]
fn test_settling_accepts_time_near_first_segment() {
    let mut controller = controller(SequenceTuning::default());
    assert_eq!(controller.phase(), SequencePhase::Settling);

    // Leftover position from the previous session is ignored.
    controller.update_for_time(37.0, true);
    assert!(controller.is_settling());
    assert!(controller.take_signals().is_empty());

    controller.update_for_time(0.05, true);
    assert!(!controller.is_settling());
    assert_eq!(controller.take_signals(), vec![SequenceSignal::TimeStabilized]);
    assert_eq!(controller.phase(), SequencePhase::Playing);
}

#[test]
fn test_settling_reseeks_then_gives_up() {
    let tuning = SequenceTuning {
        max_settling_count: 3,
        max_reseek_attempts: 2,
        ..SequenceTuning::default()
    };
    let mut controller = controller(tuning);

    let mut reseeks = 0;
    for _ in 0..8 {
        controller.update_for_time(50.0, true);
        reseeks += controller
            .take_signals()
            .iter()
            .filter(|s| **s == SequenceSignal::SeekRequest { time: 0.0 })
            .count();
    }
    assert_eq!(reseeks, 2);
    assert!(controller.is_settling(), "Still waiting before the last timeout");

    // Out of re-seeks: the stale time is trusted.
    controller.update_for_time(50.0, true);
    assert!(!controller.is_settling());
    assert_eq!(controller.current_segment_index(), 0);

    let snapshot = controller.telemetry.snapshot();
    assert_eq!(snapshot.clock_stats.settling_timeouts, 2);
    assert_eq!(snapshot.clock_stats.settling_abandoned, 1);
}

#[test]
fn test_dwell_pauses_exactly_once_then_advances() {
    let mut controller = playing_controller(SequenceTuning::default());

    // 1. Boundary reached (within tolerance)
    controller.update_for_time(1.95, true);
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::PauseForDwell { segment_index: 0 },
            SequenceSignal::StartDwellTimer { generation: 0, after: Duration::from_millis(250) },
        ]
    );
    assert!(controller.is_dwelling());

    // 2. Late ticks past the boundary don't pause again
    controller.update_for_time(1.98, true);
    controller.update_for_time(2.01, true);
    assert!(controller.take_signals().is_empty());

    // 3. Timer fires
    assert!(controller.dwell_elapsed(0));
    assert!(!controller.is_dwelling());
    assert_eq!(
        controller.take_signals(),
        vec![SequenceSignal::TrackSwitch { track: Track::Translation, time: 2.0 }]
    );

    // 4. A duplicate fire is ignored
    assert!(!controller.dwell_elapsed(0));
    assert!(controller.take_signals().is_empty());
}

#[test]
fn test_reset_invalidates_armed_dwell_timer() {
    let mut controller = playing_controller(SequenceTuning::default());
    controller.update_for_time(1.95, true);
    controller.take_signals();

    controller.reset();
    controller.build_plan(&request());
    assert!(!controller.dwell_elapsed(0));
    assert!(controller.take_signals().is_empty());
    assert_eq!(controller.current_segment_index(), 0);

    // The next dwell gets a fresh generation, so the old timer still can't match.
    controller.update_for_time(0.0, true);
    controller.update_for_time(1.95, true);
    let signals = controller.take_signals();
    assert!(signals.contains(&SequenceSignal::StartDwellTimer {
        generation: 1,
        after: Duration::from_millis(250),
    }));
    assert!(!controller.dwell_elapsed(0));
    assert!(controller.is_dwelling());
}

#[test]
fn test_zero_dwell_advances_on_the_boundary_tick() {
    let tuning = SequenceTuning {
        dwell_ms: 0,
        ..SequenceTuning::default()
    };
    let mut controller = playing_controller(tuning);

    assert!(controller.update_for_time(1.95, true));
    assert_eq!(
        controller.take_signals(),
        vec![SequenceSignal::TrackSwitch { track: Track::Translation, time: 2.0 }]
    );
}

#[test]
fn test_ticks_are_ignored_while_paused_or_transitioning() {
    let mut controller = playing_controller(SequenceTuning::default());

    controller.update_for_time(1.95, false);
    assert!(controller.take_signals().is_empty());

    controller.begin_transition();
    controller.update_for_time(1.95, true);
    assert!(controller.take_signals().is_empty());
    assert_eq!(controller.phase(), SequencePhase::Transitioning);
}

#[test]
fn test_stale_time_threshold_boundary() {
    let mut controller = playing_controller(SequenceTuning::default());

    // 1. Navigate to Orig(s1) and land the seek
    controller.seek_to_sentence(1, Some(Track::Original));
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::SeekRequest { time: 4.0 },
        ]
    );
    controller.end_transition(Some(4.0));

    // 2. N-1 stale ticks keep the expected position
    for _ in 0..9 {
        controller.update_for_time(0.5, true);
    }
    assert_eq!(controller.expected_position(), Some(4.0));

    // 3. The Nth drops it without moving the cursor
    controller.update_for_time(0.5, true);
    assert_eq!(controller.expected_position(), None);
    assert_eq!(controller.current_segment_index(), 2);
    assert!(!controller.is_settling());

    let snapshot = controller.telemetry.snapshot();
    assert_eq!(snapshot.clock_stats.stale_rejected, 10);
    assert_eq!(snapshot.clock_stats.stale_abandoned, 1);
}

#[test]
fn test_stale_abandonment_at_plan_start_settles_again() {
    let mut controller = playing_controller(SequenceTuning::default());

    // 1. Restart from the first sentence and land the seek at 0
    controller.first_sentence();
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::SeekRequest { time: 0.0 },
        ]
    );
    controller.end_transition(Some(0.0));

    // 2. The clock keeps reporting the old position until the threshold
    for _ in 0..10 {
        controller.update_for_time(5.0, true);
    }
    assert!(controller.is_settling());
    assert_eq!(controller.expected_position(), None);
    assert_eq!(controller.current_segment_index(), 0);
    assert!(controller.take_signals().is_empty());

    let snapshot = controller.telemetry.snapshot();
    assert_eq!(snapshot.clock_stats.stale_abandoned, 1);
    assert_eq!(snapshot.clock_stats.resettled, 1);

    // 3. A tick near the first segment settles normally
    controller.update_for_time(0.05, true);
    assert!(!controller.is_settling());
    assert_eq!(controller.take_signals(), vec![SequenceSignal::TimeStabilized]);
    assert_eq!(controller.current_segment_index(), 0);
}

#[test]
fn test_out_of_range_times_never_move_the_cursor() {
    let mut controller = playing_controller(SequenceTuning::default());
    controller.seek_to_sentence(1, Some(Track::Original));
    controller.end_transition(Some(4.0));
    controller.take_signals();

    for time in [0.3, 7.5, 100.0, -3.0, 3.0] {
        controller.update_for_time(time, true);
        assert_eq!(controller.current_segment_index(), 2, "time {} moved the cursor", time);
    }
}

#[test]
fn test_valid_ticks_confirm_the_seek() {
    let mut controller = playing_controller(SequenceTuning::default());
    controller.seek_to_sentence(1, Some(Track::Original));
    controller.end_transition(Some(4.0));
    controller.take_signals();

    controller.update_for_time(4.0, true);
    controller.update_for_time(4.05, true);
    assert_eq!(controller.expected_position(), Some(4.0));
    controller.update_for_time(4.1, true);

    assert_eq!(controller.expected_position(), None);
    assert_eq!(controller.take_signals(), vec![SequenceSignal::TimeStabilized]);
    assert_eq!(controller.telemetry.snapshot().clock_stats.seeks_confirmed, 1);
}

#[test]
fn test_seek_to_sentence_prefers_requested_track() {
    let mut controller = playing_controller(SequenceTuning::default());

    assert_eq!(controller.find_sentence_target(1, Some(Track::Translation)), Some(3));
    assert_eq!(controller.find_sentence_target(1, None), Some(2));
    assert_eq!(controller.find_sentence_target(9, None), None);

    let segment = controller.seek_to_sentence(1, Some(Track::Translation));
    assert_eq!(segment.map(|s| s.start), Some(6.0));
    assert!(controller.is_transitioning());
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::TrackSwitch { track: Track::Translation, time: 6.0 },
        ]
    );

    controller.end_transition(Some(6.0));
    assert_eq!(controller.phase(), SequencePhase::Playing);
    assert_eq!(controller.current_sentence_index(), Some(1));
}

#[test]
fn test_seek_to_time_keeps_the_offset_inside_its_sentence() {
    let mut controller = playing_controller(SequenceTuning::default());

    // 1. Onto the other track: reload at the requested time
    let segment = controller.seek_to_time(Track::Translation, 7.0);
    assert_eq!(segment.map(|s| s.sentence_index), Some(1));
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::TrackSwitch { track: Track::Translation, time: 7.0 },
        ]
    );
    controller.end_transition(Some(7.0));
    assert_eq!(controller.current_segment_index(), 3);

    // 2. Same track, earlier sentence: plain seek
    controller.seek_to_time(Track::Translation, 3.5);
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::SeekRequest { time: 3.5 },
        ]
    );
    controller.end_transition(Some(3.5));
    assert_eq!(controller.current_segment_index(), 1);

    // 3. Before the track's first gate: its first segment start
    controller.seek_to_time(Track::Translation, 0.5);
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::SeekRequest { time: 2.0 },
        ]
    );
    controller.end_transition(Some(2.0));

    // 4. Hidden track: the sentence's visible segment plays from its start
    controller.set_skip_predicate(Some(Box::new(|track: Track| track == Track::Translation)));
    controller.seek_to_time(Track::Translation, 7.0);
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::TrackSwitch { track: Track::Original, time: 4.0 },
        ]
    );
    assert_eq!(controller.current_segment_index(), 2);
}

#[test]
fn test_sentence_navigation() {
    let mut controller = playing_controller(SequenceTuning::default());

    controller.next_sentence();
    assert_eq!(controller.current_segment_index(), 2);
    controller.end_transition(Some(4.0));

    // At the last sentence `next` is a no-op.
    assert!(controller.next_sentence().is_none());

    controller.previous_sentence();
    assert_eq!(controller.current_segment_index(), 0);
    controller.end_transition(Some(0.0));

    // Previous on the first sentence restarts it.
    controller.previous_sentence();
    assert_eq!(controller.current_segment_index(), 0);
    controller.end_transition(Some(0.0));

    controller.last_sentence();
    assert_eq!(controller.current_sentence_index(), Some(1));
    controller.first_sentence();
    assert_eq!(controller.current_sentence_index(), Some(0));
    controller.jump_to_chapter(1);
    assert_eq!(controller.current_segment_index(), 2);
}

#[test]
fn test_navigation_after_end_reenables_sequence() {
    let mut controller = playing_controller(SequenceTuning::default());
    for _ in 0..4 {
        controller.advance_to_next_segment();
    }
    assert_eq!(controller.phase(), SequencePhase::Ended);
    controller.take_signals();

    controller.first_sentence();
    assert!(controller.is_enabled());
    assert_eq!(controller.current_track(), Track::Original);
    assert_eq!(
        controller.take_signals(),
        vec![
            SequenceSignal::WillBeginTransition,
            SequenceSignal::TrackSwitch { track: Track::Original, time: 0.0 },
        ]
    );
}

#[test]
fn test_single_track_mode_has_no_sequence() {
    let mut controller = SequenceController::new(SequenceTuning::default());
    let mut single = request();
    single.mode = AudioMode::SingleTrack(Track::Translation);
    controller.build_plan(&single);

    assert!(!controller.is_enabled());
    assert_eq!(controller.current_track(), Track::Translation);
    assert_eq!(controller.phase(), SequencePhase::Idle);
    assert!(controller.seek_to_sentence(1, None).is_none());
    assert!(!controller.update_for_time(1.95, true));
    assert!(controller.take_signals().is_empty());
}
