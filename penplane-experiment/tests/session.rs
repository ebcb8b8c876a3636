use crossbeam_channel::{Sender, unbounded};
use penplane_core::{
    ClickSource, FeedbackCommand, FrameResult, MarkerFrame, MarkerLayout, PipelineEvent,
    SessionEnd, SessionPhase, Side, Vec3,
};
use penplane_experiment::{
    ButtonListener, ChannelSource, ClickLedger, ExperimentConfig, FeedbackMode, FrameCursor,
    PipelineBus, PipelineRunner, RunnerError, RunnerOptions, StopCause, TrialLog,
};
use penplane_timing::ManualTimer;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// 1000 x 1000 mm display in z = 0; with a 1000 px canvas one px is one mm.
// Right target spans 675..725 mm, left target 275..325 mm.
fn config(trials: usize) -> ExperimentConfig {
    ExperimentConfig {
        participant_id: "p01".to_string(),
        target_widths_px: vec![50.0],
        target_distances_px: vec![400.0],
        canvas_width_px: 1000.0,
        screen_width_mm: 1000.0,
        trial_count: trials,
        warmup_trials: 0,
        layout: MarkerLayout::COMPACT,
        ..ExperimentConfig::default()
    }
}

fn frame(n: u64, pen: Vec3) -> MarkerFrame {
    MarkerFrame::new(
        n,
        vec![
            Vec3::new(1000.0, 1000.0, 0.0),
            Vec3::new(1000.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1000.0, 0.0),
            pen,
        ],
    )
}

fn broken_corner(n: u64) -> MarkerFrame {
    let mut f = frame(n, Vec3::new(500.0, 500.0, 1.0));
    f.markers[2] = Vec3::ZERO;
    f
}

/// Hover in the middle, then dwell on the active target for `dwell` frames.
fn reach(tx: &Sender<MarkerFrame>, next: &mut u64, target_x: f64, dwell: usize) {
    for _ in 0..3 {
        *next += 1;
        tx.send(frame(*next, Vec3::new(500.0, 500.0, 30.0))).unwrap();
    }
    for _ in 0..dwell {
        *next += 1;
        tx.send(frame(*next, Vec3::new(target_x, 500.0, 1.0))).unwrap();
    }
}

fn options() -> RunnerOptions {
    RunnerOptions {
        config_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
    }
}

fn collect(stream: penplane_bus::EventStream<PipelineEvent>) -> Vec<PipelineEvent> {
    stream.iter().collect()
}

#[test]
fn full_session_triggers_once_per_entry() {
    let bus = Arc::new(PipelineBus::new(64));
    let events = bus.subscribe_events();
    bus.publish_config(config(4)).unwrap();

    let (tx, rx) = unbounded();
    let mut n = 0;
    for (i, dwell) in [2usize, 30, 1, 12].into_iter().enumerate() {
        let x = if i % 2 == 0 { 700.0 } else { 300.0 };
        reach(&tx, &mut n, x, dwell);
        tx.send(broken_corner(n + 1)).unwrap();
        n += 1;
    }

    let runner = PipelineRunner::new(
        Arc::clone(&bus),
        ChannelSource::new(rx),
        ManualTimer::new(),
        options(),
    );
    let report = runner.spawn().unwrap().join().unwrap().unwrap();

    assert_eq!(report.end, SessionEnd::Completed { triggers: 4 });
    assert_eq!(report.phase, SessionPhase::Complete);
    assert!(bus.is_closed());

    let events = collect(events);
    let triggers: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Trigger(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(triggers.len(), 4);
    assert_eq!(
        triggers.iter().map(|t| t.side).collect::<Vec<_>>(),
        vec![Side::Right, Side::Left, Side::Right, Side::Left]
    );
    assert!(triggers.windows(2).all(|w| w[0].frame_number < w[1].frame_number));
    assert_eq!(
        &events[events.len() - 2..],
        &[
            PipelineEvent::TrialComplete { triggers: 4 },
            PipelineEvent::Ended(SessionEnd::Completed { triggers: 4 }),
        ]
    );
}

#[test]
fn invalid_frames_leave_the_target_alone() {
    let bus = Arc::new(PipelineBus::new(1024));
    let frames = bus.subscribe_frames();
    bus.publish_config(config(10)).unwrap();

    let (tx, rx) = unbounded();
    for n in 1..=40u64 {
        let f = if n % 2 == 0 {
            broken_corner(n)
        } else {
            frame(n, Vec3::new(500.0, 500.0, 1.0))
        };
        tx.send(f).unwrap();
    }
    drop(tx);

    let runner = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), ManualTimer::new(), options());
    let report = runner.run().unwrap();
    assert_eq!(report.counters.invalid, 20);
    assert_eq!(report.counters.valid, 20);

    let mut seen = 0;
    while let Ok(Some(outcome)) = frames.recv_timeout(Duration::from_millis(10)) {
        seen += 1;
        assert_eq!(outcome.target.low_mm, 675.0);
        assert!(outcome.trigger.is_none());
        if outcome.frame_number % 2 == 0 {
            assert!(matches!(outcome.result, FrameResult::Skipped(_)));
        }
    }
    assert_eq!(seen, 40);
}

#[test]
fn disconnect_reports_an_incomplete_session() {
    let bus = Arc::new(PipelineBus::new(64));
    let events = bus.subscribe_events();
    bus.publish_config(config(5)).unwrap();

    let (tx, rx) = unbounded();
    let mut n = 0;
    reach(&tx, &mut n, 700.0, 4);
    drop(tx);

    let report = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), ManualTimer::new(), options())
        .run()
        .unwrap();
    let expected = SessionEnd::Disconnected {
        triggers: 1,
        expected: 5,
    };
    assert_eq!(report.end, expected);
    assert_eq!(report.phase, SessionPhase::Aborted);

    let events = collect(events);
    assert_eq!(events.last(), Some(&PipelineEvent::Ended(expected)));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::TrialComplete { .. })));

    let mut log = TrialLog::new(&config(5), 0);
    for e in &events {
        match e {
            PipelineEvent::Trigger(t) => {
                log.record(t);
            }
            PipelineEvent::Ended(end) => log.end(*end),
            _ => {}
        }
    }
    let summary = log.summary();
    assert!(!summary.complete);
    assert_eq!(summary.completed_trials, 1);
}

#[test]
fn missing_configuration_times_out() {
    let bus = Arc::new(PipelineBus::new(4));
    let (_tx, rx) = unbounded::<MarkerFrame>();
    let runner = PipelineRunner::new(
        Arc::clone(&bus),
        ChannelSource::new(rx),
        ManualTimer::new(),
        RunnerOptions {
            config_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        },
    );
    assert!(matches!(runner.run(), Err(RunnerError::ConfigNotReceived(_))));
    assert!(bus.is_closed());
}

#[test]
fn invalid_configuration_is_fatal_before_streaming() {
    let bus = Arc::new(PipelineBus::new(4));
    let mut bad = config(3);
    bad.target_widths_px = vec![-1.0];
    bus.publish_config(bad).unwrap();

    let (tx, rx) = unbounded();
    tx.send(frame(1, Vec3::new(700.0, 500.0, 1.0))).unwrap();
    let frames = bus.subscribe_frames();
    let result = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), ManualTimer::new(), options()).run();
    assert!(matches!(result, Err(RunnerError::InvalidConfig(_))));
    assert!(frames.recv_timeout(Duration::from_millis(10)).is_err());
}

#[test]
fn config_published_after_start_is_picked_up() {
    let bus = Arc::new(PipelineBus::new(16));
    let events = bus.subscribe_events();
    let (tx, rx) = unbounded();

    let runner = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), ManualTimer::new(), options());
    let handle = runner.spawn().unwrap();

    thread::sleep(Duration::from_millis(20));
    bus.publish_config(config(1)).unwrap();
    let mut n = 0;
    reach(&tx, &mut n, 700.0, 3);

    let report = handle.join().unwrap().unwrap();
    assert!(report.end.is_complete());
    assert!(collect(events).contains(&PipelineEvent::TrialComplete { triggers: 1 }));
}

#[test]
fn stop_ends_the_session_and_flushes_feedback() {
    let bus = Arc::new(PipelineBus::new(16));
    let events = bus.subscribe_events();
    let mut cfg = config(3);
    cfg.feedback = FeedbackMode::Continuous;
    bus.publish_config(cfg).unwrap();

    let (tx, rx) = unbounded();
    // pen resting on the display, away from the targets
    tx.send(frame(1, Vec3::new(100.0, 500.0, 1.0))).unwrap();

    let runner = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), ManualTimer::new(), options());
    let stop = runner.stop_signal();
    let handle = runner.spawn().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(stop.stop());
    assert!(!stop.stop());
    let report = handle.join().unwrap().unwrap();
    drop(tx);

    assert_eq!(
        report.end,
        SessionEnd::Stopped {
            triggers: 0,
            expected: 3
        }
    );
    let events = collect(events);
    assert_eq!(
        events,
        vec![
            PipelineEvent::Feedback {
                frame: 1,
                command: FeedbackCommand::StartContinuous
            },
            PipelineEvent::Feedback {
                frame: 1,
                command: FeedbackCommand::StopContinuous
            },
            PipelineEvent::Ended(report.end),
        ]
    );
}

#[test]
fn button_presses_land_on_processed_frames() {
    let bus = Arc::new(PipelineBus::new(16));
    bus.publish_config(config(1)).unwrap();
    let timer = ManualTimer::new();
    let cursor = FrameCursor::new(256);
    let ledger = ClickLedger::new();

    let (tx, rx) = unbounded();
    let mut n = 0;
    reach(&tx, &mut n, 700.0, 2);

    let report = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), timer.clone(), options())
        .with_clicks(cursor.clone(), ledger.clone())
        .run()
        .unwrap();
    assert!(report.end.is_complete());
    // trigger on the first dwell frame (frame 4)
    assert_eq!(ledger.count(ClickSource::Trigger), 1);
    assert!(ledger.is_clicked(4));

    // the manual clock never moved, so every frame is at t = 0 and the press
    // resolves to the newest one
    let listener = ButtonListener::new(timer, cursor, ledger.clone());
    let presses = listener.spawn(Cursor::new("1\n")).unwrap().join().unwrap();
    assert!(presses.is_err());
    assert_eq!(ledger.count(ClickSource::Button), 1);
    assert!(ledger.snapshot().iter().any(|r| r.source == ClickSource::Button && r.frame_number == 4));
}

#[test]
fn late_frame_does_not_capture_a_press() {
    let bus = Arc::new(PipelineBus::new(16));
    bus.publish_config(config(3)).unwrap();
    let timer = ManualTimer::new();
    let cursor = FrameCursor::new(16);
    let ledger = ClickLedger::new();

    let (tx, rx) = unbounded();
    tx.send(frame(10, Vec3::new(100.0, 500.0, 1.0))).unwrap();
    tx.send(frame(9, Vec3::new(700.0, 500.0, 1.0))).unwrap();
    drop(tx);

    let report = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), timer.clone(), options())
        .with_clicks(cursor.clone(), ledger.clone())
        .run()
        .unwrap();
    assert_eq!(report.counters.out_of_order, 1);

    let record = ButtonListener::new(timer, cursor, ledger)
        .handle_line("1")
        .unwrap();
    assert_eq!(record.frame_number, 10);
    assert!(record.sample.is_some());
}

#[test]
fn button_feed_closing_mid_session_ends_it_as_disconnected() {
    let bus = Arc::new(PipelineBus::new(16));
    let events = bus.subscribe_events();
    bus.publish_config(config(3)).unwrap();
    let timer = ManualTimer::new();
    let cursor = FrameCursor::new(16);
    let ledger = ClickLedger::new();

    let (tx, rx) = unbounded();
    tx.send(frame(1, Vec3::new(700.0, 500.0, 1.0))).unwrap();

    let runner = PipelineRunner::new(Arc::clone(&bus), ChannelSource::new(rx), timer.clone(), options())
        .with_clicks(cursor.clone(), ledger.clone());
    let stop = runner.stop_signal();
    let handle = runner.spawn().unwrap();

    while cursor.latest().is_none() {
        thread::sleep(Duration::from_millis(2));
    }
    let listener = ButtonListener::new(timer, cursor, ledger.clone()).with_stop(stop.clone());
    assert!(listener.run(Cursor::new("1\n")).is_err());

    let report = handle.join().unwrap().unwrap();
    drop(tx);
    let expected = SessionEnd::Disconnected {
        triggers: 1,
        expected: 3,
    };
    assert_eq!(stop.cause(), Some(StopCause::Disconnected));
    assert_eq!(report.end, expected);
    assert_eq!(report.phase, SessionPhase::Aborted);
    assert_eq!(collect(events).last(), Some(&PipelineEvent::Ended(expected)));
    assert_eq!(ledger.count(ClickSource::Button), 1);
}
