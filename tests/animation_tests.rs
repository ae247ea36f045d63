//! Integration tests for AnimationEngine

mod common;
use common::*;

use core::time::Duration;
use led_strip_engine::color::{BLACK, BLUE, RED};
use led_strip_engine::{
    AnimationEngine, AnimationSpec, Color, EngineError, EngineState, Pattern, RenderError,
    RunOutcome, StopFlag, StripBackend, wheel,
};

const DELAY: Duration = Duration::from_millis(50);

fn rainbow_frame(frame: u32, n: usize) -> Vec<Color> {
    (0..n)
        .map(|i| wheel(((i * 256 / n) as u32 + frame) % 256))
        .collect()
}

#[test]
fn color_wipe_fills_one_more_pixel_per_frame() {
    let mut strip = MockBackend::new(12);
    let log = strip.log();
    let prior: Vec<Color> = (0..12).map(|i| wheel(i * 20)).collect();
    for (i, color) in prior.iter().enumerate() {
        strip.set_pixel(i, *color);
    }

    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::color_wipe(RED, DELAY), 12);
    let outcome = engine.run(&mut strip, &mut CountingStop::never());
    assert_eq!(outcome, Ok(RunOutcome::Completed { frames: 12 }));

    let frames = frames(&log);
    assert_eq!(frames.len(), 12);
    for (k, frame) in frames.iter().enumerate() {
        assert!(frame[..=k].iter().all(|c| *c == RED), "frame {}", k);
        assert_eq!(&frame[k + 1..], &prior[k + 1..], "frame {}", k);
    }
    assert_eq!(frames[11], vec![RED; 12]);
}

#[test]
fn every_frame_gap_waits_the_frame_delay() {
    let mut strip = MockBackend::new(4);
    let mut stop = CountingStop::never();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::color_wipe(RED, DELAY), 4);

    engine.run(&mut strip, &mut stop).unwrap();
    assert_eq!(stop.waits, vec![DELAY; 4]);
}

#[test]
fn theater_chase_runs_three_phases_per_repeat() {
    let mut strip = MockBackend::new(7);
    let log = strip.log();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::theater_chase(BLUE, DELAY).with_repeats(2), 7);

    let outcome = engine.run(&mut strip, &mut CountingStop::never());
    assert_eq!(outcome, Ok(RunOutcome::Completed { frames: 6 }));

    for (k, frame) in frames(&log).iter().enumerate() {
        let phase = k % 3;
        for (i, pixel) in frame.iter().enumerate() {
            let expected = if i % 3 == phase { BLUE } else { BLACK };
            assert_eq!(*pixel, expected, "frame {} pixel {}", k, i);
        }
    }
}

#[test]
fn chase_rainbow_walks_the_wheel_once() {
    let mut strip = MockBackend::new(5);
    let log = strip.log();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::theater_chase_rainbow(DELAY), 5);

    let outcome = engine.run(&mut strip, &mut CountingStop::never());
    assert_eq!(outcome, Ok(RunOutcome::Completed { frames: 768 }));

    let frames = frames(&log);
    // hue 100, phase 1
    let frame = &frames[301];
    assert_eq!(frame[0], BLACK);
    assert_eq!(frame[1], wheel(101));
    assert_eq!(frame[4], wheel(104));
}

#[test]
fn cancelled_rainbow_leaves_whole_frames_and_stops_cleanly() {
    let mut strip = MockBackend::new(12);
    let log = strip.log();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::rainbow_cycle(Duration::from_millis(10)), 12);

    let outcome = engine.run(&mut strip, &mut CountingStop::after_waits(5));
    assert_eq!(outcome, Ok(RunOutcome::Cancelled { frames: 5 }));
    assert_eq!(engine.state(), EngineState::Cancelled);

    let frames = frames(&log);
    assert_eq!(frames.len(), 5);
    for (k, frame) in frames.iter().enumerate() {
        assert_eq!(*frame, rainbow_frame(k as u32, 12));
    }
    assert_eq!(strip.buffer().as_slice(), rainbow_frame(4, 12).as_slice());
}

#[test]
fn render_failure_reports_last_good_frame() {
    let mut strip = MockBackend::new(12).failing_on(3);
    let log = strip.log();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::color_wipe(RED, DELAY), 12);

    let err = engine
        .run(&mut strip, &mut CountingStop::never())
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::RenderFailure {
            pattern: Pattern::Wipe,
            last_frame: Some(2),
            reason: RenderError::Disconnected,
        }
    );
    assert_eq!(engine.state(), EngineState::Failed);
    // no retry
    assert_eq!(log.lock().unwrap().attempts, 4);
    assert_eq!(frame_count(&log), 3);
}

#[test]
fn failure_on_first_frame_has_no_last_frame() {
    let mut strip = MockBackend::new(3).failing_on(0);
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::rainbow_cycle(DELAY), 3);

    let err = engine.step(&mut strip).unwrap_err();
    assert!(matches!(
        err,
        EngineError::RenderFailure {
            last_frame: None,
            ..
        }
    ));
    assert!(err.to_string().contains("before its first frame"));
}

#[test]
fn failed_run_can_be_restarted() {
    let mut strip = MockBackend::new(4).failing_on(1);
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::color_wipe(RED, DELAY), 4);
    assert!(engine.run(&mut strip, &mut CountingStop::never()).is_err());

    engine.restart().unwrap();
    let outcome = engine.run(&mut strip, &mut CountingStop::never());
    assert_eq!(outcome, Ok(RunOutcome::Completed { frames: 4 }));
}

#[test]
fn stop_flag_interrupts_from_another_thread() {
    let mut strip = MockBackend::new(12);
    let mut stop = StopFlag::new();
    let remote = stop.clone();
    let mut engine = AnimationEngine::new();
    engine.start(AnimationSpec::rainbow_cycle(Duration::from_millis(1)), 12);

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        remote.request_stop();
    });

    let outcome = engine.run(&mut strip, &mut stop).unwrap();
    stopper.join().unwrap();
    match outcome {
        RunOutcome::Cancelled { frames } => assert!(frames < 1280),
        other => panic!("expected cancellation, got {:?}", other),
    }
}
