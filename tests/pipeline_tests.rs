//! End-to-end tests for detection through the orchestrator


use emotion_overlay::camera::{CaptureDevice, CaptureSession};
use emotion_overlay::classifier::{score, stream_label, STREAM_ROTATION};
use emotion_overlay::confidence::confidence_range;
use emotion_overlay::emotion::EmotionAnalyzer;
use emotion_overlay::pipeline::{Orchestrator, PipelineState};
use emotion_overlay::sampler::RegionSampler;
use emotion_overlay::{Emotion, Frame, SourceKind};
use chrono::{Local, Timelike};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ops::ControlFlow;
use std::time::Duration;
use test_helpers::{at, checkerboard};

#[test]
fn dark_high_contrast_upload_scores_fearful() {
    // 96x96 frame: 32x32 central region, half 0 and half 150
    let frame = checkerboard(96, 96, 0, 150);
    let stats = RegionSampler::new().sample(&frame).unwrap();

    assert_eq!(stats.brightness, 75.0);
    assert_eq!(stats.color_variance, 75.0);
    assert_eq!(stats.red_green_ratio, 1.0);

    let scores = score(&stats);
    assert_eq!(scores.get(Emotion::Fearful), 13);
    assert_eq!(scores.get(Emotion::Sad), 9);
    assert_eq!(scores.resolve(), Emotion::Fearful);
}

#[test]
fn solid_near_black_upload_scores_sad() {
    // No contrast: the low-variance rule adds to sad on top of the dark rule
    let frame = Frame::solid(96, 96, [12, 12, 12]);
    let scores = score(&RegionSampler::new().sample(&frame).unwrap());

    assert_eq!(scores.get(Emotion::Sad), 12);
    assert_eq!(scores.get(Emotion::Fearful), 10);
    assert_eq!(scores.resolve(), Emotion::Sad);
}

#[tokio::test(start_paused = true)]
async fn upload_end_to_end_yields_fearful_with_range_confidence() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::with_rng(StdRng::seed_from_u64(3)));
    let mut results = pipeline.subscribe();

    let applied = pipeline
        .submit_image(checkerboard(96, 96, 0, 150), at(0))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(applied.emotion, Emotion::Fearful);
    assert!((82..=97).contains(&applied.confidence));
    assert!(confidence_range(Emotion::Fearful).contains(&applied.confidence));
    assert_eq!(results.recv().await.unwrap(), applied);
    assert_eq!(pipeline.state().current_emotion, Some(Emotion::Fearful));
}

#[tokio::test(start_paused = true)]
async fn camera_stream_is_rate_limited_and_clock_driven() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::with_rng(StdRng::seed_from_u64(9)));
    let frame = Frame::solid(48, 48, [200, 10, 10]);
    let mut applied = Vec::new();

    // 30 FPS for 5 seconds of stream time
    for tick in 0..150 {
        let now = at(tick * 33);
        if let Some(task) = pipeline.submit_frame(frame.clone(), now) {
            applied.push(task.await.unwrap().unwrap());
        }
    }

    // Accepted at 0, 2013 (61 * 33) and 4026
    assert_eq!(applied.len(), 3);
    for result in &applied {
        let observed = result.observed_at;
        assert_eq!(result.emotion, stream_label(observed.minute(), observed.second()));
        assert!(STREAM_ROTATION.contains(&result.emotion));
    }
}

#[tokio::test(start_paused = true)]
async fn switching_sources_resets_state() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::new());

    pipeline
        .submit_image(Frame::solid(30, 30, [220, 220, 220]), at(0))
        .await
        .unwrap();
    assert_eq!(pipeline.state().current_emotion, Some(Emotion::Happy));

    pipeline.activate(SourceKind::Camera);
    assert_eq!(pipeline.state(), PipelineState::default());

    pipeline.deactivate();
    assert_eq!(pipeline.active_source(), None);
}

#[tokio::test(start_paused = true)]
async fn stale_camera_result_is_not_applied_after_upload() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::new());

    let camera = pipeline
        .submit_frame(Frame::solid(30, 30, [0, 0, 0]), at(0))
        .unwrap();
    let upload = pipeline.submit_image(Frame::solid(30, 30, [220, 220, 220]), at(10));

    assert!(camera.await.unwrap_err().is_cancelled());
    let applied = upload.await.unwrap().unwrap();
    assert_eq!(applied.emotion, Emotion::Happy);
    assert_eq!(pipeline.latest(), Some(applied));
}

#[tokio::test(start_paused = true)]
async fn newer_upload_supersedes_pending_one() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::new());

    let first = pipeline.submit_image(Frame::solid(30, 30, [220, 220, 220]), at(0));
    let second = pipeline.submit_image(checkerboard(96, 96, 0, 150), at(5));

    assert!(first.await.unwrap_err().is_cancelled());
    assert_eq!(second.await.unwrap().unwrap().emotion, Emotion::Fearful);
}

/// Device whose `frame()` blocks for longer than the capture interval
struct SlowCamera;

impl CaptureDevice for SlowCamera {
    fn start(&mut self) -> emotion_overlay::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn frame(&mut self) -> emotion_overlay::Result<Frame> {
        std::thread::sleep(Duration::from_millis(40));
        Ok(Frame::solid(48, 48, [90, 90, 90]))
    }
}

#[tokio::test]
async fn blocking_capture_device_still_publishes_detections() {
    let pipeline = Orchestrator::new(EmotionAnalyzer::with_rng(StdRng::seed_from_u64(5)));
    let mut results = pipeline.subscribe();
    let mut session = CaptureSession::acquire(SlowCamera).unwrap();
    let mut delivered = 0;
    let mut published = Vec::new();

    session
        .run(|frame| {
            pipeline.submit_frame(frame, Local::now());
            while let Ok(result) = results.try_recv() {
                published.push(result);
            }

            delivered += 1;
            if !published.is_empty() || delivered >= 100 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();
    session.release();

    assert!(!published.is_empty(), "no detection completed after {delivered} frames");
    assert!(STREAM_ROTATION.contains(&published[0].emotion));
    assert!(!pipeline.state().is_processing);
    assert_eq!(pipeline.state().current_emotion, Some(published[0].emotion));
}

proptest! {
    #[test]
    fn stream_label_is_a_function_of_minute_and_quantized_second(
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let label = stream_label(minute, second);
        prop_assert!(STREAM_ROTATION.contains(&label));

        let block_start = second - second % 4;
        for s in block_start..(block_start + 4).min(60) {
            prop_assert_eq!(stream_label(minute, s), label);
        }
    }
}
