//! Integration tests for the assessment session workflow
//!
//! These tests drive complete sessions through `SequenceRunner` with the
//! virtual singer and a manual clock:
//! - Full sequences and tessitura derivation
//! - Onset timeouts and device failures
//! - Abort handling
//! - Retry eligibility, rejection and in-place replacement
//! - Frame and lifecycle event streams

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use vocal_range_trainer::analysis::Grade;
use vocal_range_trainer::engine::{Clock, Collaborators, SilentTonePlayer, UnavailableCapture};
use vocal_range_trainer::error::{AudioError, RetryRejection, SessionError};
use vocal_range_trainer::session::{
    RunOutcome, SequenceRunner, SessionEvent, SessionStatus,
};
use vocal_range_trainer::testing::{
    quick_config, virtual_singer, ManualClock, Response, SingerScript, ToneLog,
};

struct Harness {
    runner: SequenceRunner,
    clock: Arc<ManualClock>,
    script: SingerScript,
    tones: ToneLog,
}

fn harness(script: Vec<(i32, Response)>) -> Harness {
    let (capture, player) = virtual_singer(script, 44_100.0);
    let clock = Arc::new(ManualClock::new());
    let script = capture.script();
    let tones = player.log();
    let collaborators = Collaborators::new(Box::new(capture), Box::new(player), clock.clone());
    let runner = SequenceRunner::new(quick_config(), collaborators).expect("valid config");
    Harness {
        runner,
        clock,
        script,
        tones,
    }
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// C4 strong, D4 weak, E4 strong, F4 fail, G4 strong
fn mixed_script() -> Vec<(i32, Response)> {
    vec![(62, Response::Detuned(50.0)), (65, Response::Detuned(150.0))]
}

#[test]
fn test_full_session_all_in_tune() {
    let mut h = harness(Vec::new());
    let mut events = h.runner.subscribe_events();

    let report = match h.runner.run_sequence().unwrap() {
        RunOutcome::Finished(report) => report,
        RunOutcome::Aborted => panic!("session should not abort"),
    };

    assert_eq!(report.results.len(), 5);
    for result in &report.results {
        assert_eq!(result.grade, Grade::Strong, "{}", result.note.name);
        assert_eq!(result.frame_count, 5);
    }

    let tessitura = report.tessitura.expect("tessitura expected");
    assert_eq!(tessitura.low.name, "C4");
    assert_eq!(tessitura.high.name, "G4");
    assert_eq!(tessitura.length, 5);

    let summary = report.summary.unwrap();
    assert_eq!(summary.midi_min, 60);
    assert_eq!(summary.midi_median, 64.0);
    assert_eq!(summary.midi_max, 67);

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&SessionEvent::Started { note_count: 5 }));
    assert!(matches!(events.last(), Some(SessionEvent::Completed { .. })));
    assert_eq!(h.runner.state().status(), SessionStatus::Done);
    assert_eq!(h.tones.frequencies().len(), 5);
}

#[test]
fn test_session_timing_uses_injected_clock() {
    let mut h = harness(Vec::new());
    h.runner.run_sequence().unwrap();

    // Per note: 1000 count-in + 2300 reference wait + 5 x 60 measuring;
    // 800 ms between notes
    let per_note = Duration::from_millis(1000 + 2300 + 300);
    let expected = per_note * 5 + Duration::from_millis(800) * 4;
    assert_eq!(h.clock.now(), expected);
}

#[test]
fn test_mixed_grades_and_gap_bridging_tessitura() {
    let mut h = harness(mixed_script());
    let report = h.runner.run_sequence().unwrap().finished().unwrap();

    let grades: Vec<Grade> = report.results.iter().map(|r| r.grade).collect();
    assert_eq!(
        grades,
        vec![Grade::Strong, Grade::Weak, Grade::Strong, Grade::Fail, Grade::Strong]
    );

    // Single gaps are bridged but not counted
    let tessitura = report.tessitura.unwrap();
    assert_eq!(tessitura.included_midi, vec![60, 64, 67]);
    assert_eq!(tessitura.length, 3);
    assert_eq!(report.segments.len(), 1);
}

#[test]
fn test_silent_note_grades_fail_after_onset_deadline() {
    let mut h = harness(vec![(64, Response::Silent)]);
    let mut events = h.runner.subscribe_events();
    let report = h.runner.run_sequence().unwrap().finished().unwrap();

    let e4 = &report.results[2];
    assert_eq!(e4.grade, Grade::Fail);
    assert_eq!(e4.frame_count, 0);
    assert_eq!(e4.strong_ratio, 0.0);
    assert_eq!(e4.weak_ratio, 0.0);

    let timeouts: Vec<SessionEvent> = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::OnsetTimeout { .. }))
        .collect();
    assert_eq!(timeouts, vec![SessionEvent::OnsetTimeout { index: 2 }]);
}

#[test]
fn test_background_noise_does_not_trigger_onset() {
    let (capture, player) = virtual_singer(vec![(60, Response::Silent)], 44_100.0);
    let capture = capture.with_noise(0.005);
    let collaborators = Collaborators::new(
        Box::new(capture),
        Box::new(player),
        Arc::new(ManualClock::new()),
    );
    let mut runner = SequenceRunner::new(quick_config(), collaborators).unwrap();
    let report = runner.run_sequence().unwrap().finished().unwrap();

    assert_eq!(report.results[0].frame_count, 0);
    assert_eq!(report.results[0].grade, Grade::Fail);
    assert_eq!(report.results[1].grade, Grade::Strong);
}

#[test]
fn test_device_failure_prevents_start() {
    let collaborators = Collaborators::new(
        Box::new(UnavailableCapture::new(AudioError::PermissionDenied)),
        Box::new(SilentTonePlayer::new()),
        Arc::new(ManualClock::new()),
    );
    let mut runner = SequenceRunner::new(quick_config(), collaborators).unwrap();
    let mut events = runner.subscribe_events();

    let err = runner.run_sequence().unwrap_err();
    assert!(matches!(
        err,
        SessionError::DeviceUnavailable {
            source: AudioError::PermissionDenied
        }
    ));
    assert_eq!(runner.state().status(), SessionStatus::Idle);
    assert!(runner.state().results().is_empty());

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SessionEvent::Failed { .. }));
}

#[test]
fn test_abort_halts_and_keeps_graded_notes() {
    let mut h = harness(Vec::new());
    let mut events = h.runner.subscribe_events();
    let frames = h.runner.subscribe_frames();

    // First note ends at 3.6 s, second note's reference wait runs 5.4..7.7 s
    h.clock
        .abort_at(Duration::from_millis(6000), h.runner.abort_handle());

    let outcome = h.runner.run_sequence().unwrap();
    assert!(outcome.is_aborted());
    assert_eq!(h.runner.state().status(), SessionStatus::Idle);
    assert_eq!(h.runner.state().results().len(), 1);
    assert!(h.runner.state().current_note().is_none());
    assert_eq!(h.tones.stop_count(), 1);

    let events = drain(&mut events);
    assert_eq!(events.last(), Some(&SessionEvent::Aborted));
    assert!(!events
        .iter()
        .any(|event| matches!(event, SessionEvent::Completed { .. })));

    // Frame stream ends with the aborted run
    assert_eq!(frames.count(), 5);
}

#[test]
fn test_new_session_after_abort_starts_clean() {
    let mut h = harness(Vec::new());
    h.clock
        .abort_at(Duration::from_millis(2000), h.runner.abort_handle());
    assert!(h.runner.run_sequence().unwrap().is_aborted());
    assert!(h.runner.state().results().is_empty());

    let report = h.runner.run_sequence().unwrap().finished().unwrap();
    assert_eq!(report.results.len(), 5);
}

#[test]
fn test_retry_eligibility_after_session() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();

    let eligible: Vec<i32> = h.runner.eligible_retries().into_iter().collect();
    assert_eq!(eligible, vec![62, 65]);
}

#[test]
fn test_retry_replaces_result_in_place() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();
    let mut events = h.runner.subscribe_events();

    h.script.set(65, Response::Exact);
    let result = h.runner.retry_note(65).unwrap().finished().unwrap();
    assert_eq!(result.grade, Grade::Strong);

    let results = h.runner.state().results();
    assert_eq!(results.len(), 5);
    assert_eq!(results[3].note.midi, 65);
    assert_eq!(results[3].grade, Grade::Strong);
    assert!(h.runner.state().retried().contains(&65));
    assert_eq!(h.runner.state().status(), SessionStatus::Done);

    // F4 now strong: the tessitura absorbs it
    let tessitura = h.runner.state().tessitura().unwrap();
    assert_eq!(tessitura.included_midi, vec![60, 64, 65, 67]);

    let events = drain(&mut events);
    assert!(matches!(events.first(), Some(SessionEvent::RetryStarted { index: 3, .. })));
    assert!(events.contains(&SessionEvent::NoteGraded {
        index: 3,
        result: result.clone()
    }));
    assert!(matches!(events.last(), Some(SessionEvent::Completed { .. })));
}

#[test]
fn test_second_retry_of_same_note_rejected() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();
    h.runner.retry_note(62).unwrap();
    let before = h.runner.state().results().to_vec();

    let err = h.runner.retry_note(62).unwrap_err();
    assert_eq!(
        err,
        SessionError::RetryRejected {
            midi: 62,
            reason: RetryRejection::AlreadyRetried
        }
    );
    assert_eq!(h.runner.state().results(), before.as_slice());
}

#[test]
fn test_retry_of_ineligible_note_rejected() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();
    let opens_before = h.tones.frequencies().len();

    let err = h.runner.retry_note(64).unwrap_err();
    assert_eq!(
        err,
        SessionError::RetryRejected {
            midi: 64,
            reason: RetryRejection::NotEligible
        }
    );
    // No tone played, no state touched
    assert_eq!(h.tones.frequencies().len(), opens_before);
    assert!(h.runner.state().retried().is_empty());
}

#[test]
fn test_retry_plays_only_the_retried_note() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();
    let start = h.clock.now();

    h.runner.retry_note(62).unwrap();
    let tones = h.tones.frequencies();
    assert_eq!(tones.len(), 6);
    assert!((tones[5] - 293.66).abs() < 0.01);

    // No count-in: reference wait + measuring only
    assert_eq!(h.clock.now() - start, Duration::from_millis(2300 + 300));
}

#[test]
fn test_aborted_retry_does_not_consume_the_retry() {
    let mut h = harness(mixed_script());
    h.runner.run_sequence().unwrap();
    let start = h.clock.now();

    h.clock
        .abort_at(start + Duration::from_millis(1000), h.runner.abort_handle());
    assert!(h.runner.retry_note(65).unwrap().is_aborted());
    assert_eq!(h.runner.state().status(), SessionStatus::Idle);
    assert!(!h.runner.state().retried().contains(&65));
    assert_eq!(h.runner.state().results()[3].grade, Grade::Fail);

    h.script.set(65, Response::Exact);
    let result = h.runner.retry_note(65).unwrap().finished().unwrap();
    assert_eq!(result.grade, Grade::Strong);
}

#[test]
fn test_retry_rejected_after_aborted_session() {
    let mut h = harness(mixed_script());
    let mut events = h.runner.subscribe_events();

    // Third note ends at 12.4 s; the pause before the fourth crosses 13 s
    h.clock
        .abort_at(Duration::from_millis(13_000), h.runner.abort_handle());
    assert!(h.runner.run_sequence().unwrap().is_aborted());
    assert_eq!(h.runner.state().results().len(), 3);
    assert!(h.runner.eligible_retries().is_empty());
    drain(&mut events);

    let err = h.runner.retry_note(62).unwrap_err();
    assert_eq!(
        err,
        SessionError::RetryRejected {
            midi: 62,
            reason: RetryRejection::SessionIncomplete
        }
    );
    assert_eq!(h.runner.state().status(), SessionStatus::Idle);
    assert!(h.runner.state().retried().is_empty());
    assert_eq!(h.runner.state().results()[1].grade, Grade::Weak);
    assert!(drain(&mut events).is_empty());
    assert_eq!(h.tones.frequencies().len(), 3);
}

#[test]
fn test_frame_stream_is_finite_and_matches_results() {
    let mut h = harness(vec![(64, Response::Silent)]);
    let frames = h.runner.subscribe_frames();
    let report = h.runner.run_sequence().unwrap().finished().unwrap();

    let collected: Vec<_> = frames.collect();
    let total: usize = report.results.iter().map(|r| r.frame_count).sum();
    assert_eq!(collected.len(), total);
    assert!(collected.iter().all(|event| event.note_index != 2));
    assert!(collected
        .windows(2)
        .all(|pair| pair[0].note_index <= pair[1].note_index));
    assert!(collected
        .iter()
        .all(|event| event.frame.cents_deviation <= 30.0));
}

#[test]
fn test_frame_subscription_covers_one_run() {
    let mut h = harness(Vec::new());
    let first = h.runner.subscribe_frames();
    h.runner.run_sequence().unwrap();
    assert_eq!(first.count(), 25);

    // No subscription for the second run
    let report = h.runner.run_sequence().unwrap().finished().unwrap();
    assert_eq!(report.results.len(), 5);
}

#[test]
fn test_snapshot_watch_tracks_results() {
    let mut h = harness(mixed_script());
    let snapshots = h.runner.subscribe_snapshots();
    let report = h.runner.run_sequence().unwrap().finished().unwrap();

    let snapshot = snapshots.borrow().clone();
    assert_eq!(snapshot.status, SessionStatus::Done);
    assert_eq!(snapshot.results, report.results);
    assert_eq!(snapshot.tessitura, report.tessitura);
}

#[test]
fn test_capture_opened_once_per_run() {
    let (capture, player) = virtual_singer(mixed_script(), 44_100.0);
    let opens = capture.open_count();
    let collaborators = Collaborators::new(
        Box::new(capture),
        Box::new(player),
        Arc::new(ManualClock::new()),
    );
    let mut runner = SequenceRunner::new(quick_config(), collaborators).unwrap();

    runner.run_sequence().unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    runner.retry_note(62).unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_frame_stream_as_async_stream() {
    let mut h = harness(Vec::new());
    let frames = h.runner.subscribe_frames().into_stream();
    h.runner.run_sequence().unwrap();

    let collected: Vec<_> = frames.collect().await;
    assert_eq!(collected.len(), 25);
    assert_eq!(collected[0].note_index, 0);
    assert_eq!(collected[24].note_index, 4);
}
