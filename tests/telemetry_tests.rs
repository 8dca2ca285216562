use interlinear::config::SequenceTuning;
use interlinear::kernel::plan::{AudioMode, PlanRequest, SentenceGates, TrackMedia};
use interlinear::kernel::sequence::SequenceController;
use interlinear::kernel::telemetry::event::TelemetryEvent;

fn controller() -> SequenceController {
    let mut controller = SequenceController::new(SequenceTuning::default());
    controller.build_plan(&PlanRequest {
        sentences: vec![
            SentenceGates::new(Some((0.0, 2.0)), Some((2.0, 4.0))),
            SentenceGates::new(Some((4.0, 6.0)), Some((6.0, 8.0))),
        ],
        original: TrackMedia::single("orig.mp3", None),
        translation: TrackMedia::single("trans.mp3", None),
        mode: AudioMode::Sequence,
        ..PlanRequest::default()
    });
    controller
}

#[test]
fn test_track_switch_counts() {
    let mut controller = controller();
    for _ in 0..4 {
        controller.advance_to_next_segment();
    }

    let snapshot = controller.telemetry.snapshot();
    assert_eq!(snapshot.plans_built, 1);
    assert_eq!(snapshot.boundary_stats.track_switches, 3);
    assert_eq!(snapshot.boundary_stats.same_sentence_switches, 2);
    assert_eq!(snapshot.sequences_ended, 1);
}

#[test]
fn test_stale_ticks_per_confirmed_seek() {
    let mut controller = controller();
    controller.update_for_time(0.0, true);
    controller.seek_to_sentence(1, None);
    controller.end_transition(Some(4.0));

    // Two stale reports, then the clock catches up.
    for time in [0.4, 0.5, 4.0, 4.05, 4.1] {
        controller.update_for_time(time, true);
    }

    let snapshot = controller.telemetry.snapshot();
    assert_eq!(snapshot.clock_stats.stale_rejected, 2);
    assert_eq!(snapshot.clock_stats.seeks_confirmed, 1);
    assert_eq!(snapshot.clock_stats.avg_stale_per_seek, 2.0);
}

#[test]
fn test_events_carry_no_content() {
    let controller = controller();
    let first = controller.telemetry.events().next().cloned();
    assert_eq!(
        first,
        Some(TelemetryEvent::PlanBuilt {
            segments: 4,
            sentences: 2,
            sequence_enabled: true,
        })
    );
}
