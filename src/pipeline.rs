// Orchestrator: owns pipeline state and wires frames through detection

use crate::constants::{RATE_LIMIT_INTERVAL_MS, RESULT_CHANNEL_CAPACITY};
use crate::emotion::EmotionAnalyzer;
use crate::models::{DetectionResult, Emotion, Frame, SourceKind};
use crate::overlay::{Canvas, OverlayRenderer};
use crate::rate_limit::should_process;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State shared with presentation collaborators
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineState {
    /// Most recently applied emotion, `None` until the active source resolves one
    pub current_emotion: Option<Emotion>,
    /// True while a detection is in flight
    pub is_processing: bool,
    /// Start time of the last accepted detection; `None` acts as minus infinity
    pub last_processed_at: Option<DateTime<Local>>,
}

/// Handle to one in-flight detection.
///
/// Resolves to `Some(result)` when the result was applied, `None` when it was
/// discarded because the input source changed in the meantime.
pub type DetectionTask = JoinHandle<Option<DetectionResult>>;

struct Shared {
    state: PipelineState,
    latest: Option<DetectionResult>,
    source: Option<SourceKind>,
    /// Bumped on every source change; results from older generations are stale
    generation: u64,
    pending: Option<tokio::task::AbortHandle>,
}

/// Owns current-emotion state and routes frames through detection.
///
/// Cloning yields another handle onto the same pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    analyzer: Arc<EmotionAnalyzer>,
    renderer: OverlayRenderer,
    shared: Arc<Mutex<Shared>>,
    result_sender: broadcast::Sender<DetectionResult>,
}

impl Orchestrator {
    pub fn new(analyzer: EmotionAnalyzer) -> Self {
        let (result_sender, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        Self {
            analyzer: Arc::new(analyzer),
            renderer: OverlayRenderer::new(),
            shared: Arc::new(Mutex::new(Shared {
                state: PipelineState::default(),
                latest: None,
                source: None,
                generation: 0,
                pending: None,
            })),
            result_sender,
        }
    }

    /// Receiver for every applied detection result
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionResult> {
        self.result_sender.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the pipeline state
    pub fn state(&self) -> PipelineState {
        self.lock().state.clone()
    }

    /// Last applied detection for the active source
    pub fn latest(&self) -> Option<DetectionResult> {
        self.lock().latest.clone()
    }

    pub fn active_source(&self) -> Option<SourceKind> {
        self.lock().source
    }

    /// Makes `source` the active input. Switching resets state and discards
    /// any in-flight detection; re-activating the current source is a no-op.
    pub fn activate(&self, source: SourceKind) {
        let mut shared = self.lock();
        if shared.source != Some(source) {
            info!(%source, "switching input source");
            reset(&mut shared, Some(source));
        }
    }

    /// Drops the active source, e.g. when the hosting view is torn down
    pub fn deactivate(&self) {
        let mut shared = self.lock();
        if shared.source.is_some() {
            info!("deactivating input source");
            reset(&mut shared, None);
        }
    }

    /// Offers a continuous-stream frame. Returns `None` when the frame is
    /// dropped by the rate limiter or because a detection is still running.
    pub fn submit_frame(&self, frame: Frame, now: DateTime<Local>) -> Option<DetectionTask> {
        let mut shared = self.lock();
        if shared.source != Some(SourceKind::Camera) {
            info!(source = %SourceKind::Camera, "switching input source");
            reset(&mut shared, Some(SourceKind::Camera));
        }

        let last = shared
            .state
            .last_processed_at
            .map(|at| at.timestamp_millis());
        if shared.state.is_processing
            || !should_process(now.timestamp_millis(), last, RATE_LIMIT_INTERVAL_MS)
        {
            debug!("frame dropped by rate limiter");
            return None;
        }

        Some(self.start_detection(&mut shared, frame, SourceKind::Camera, now))
    }

    /// Runs exactly one detection for an uploaded image. A newer upload
    /// supersedes a pending one.
    pub fn submit_image(&self, frame: Frame, now: DateTime<Local>) -> DetectionTask {
        let mut shared = self.lock();
        if shared.source != Some(SourceKind::Upload) {
            info!(source = %SourceKind::Upload, "switching input source");
            reset(&mut shared, Some(SourceKind::Upload));
        } else if let Some(pending) = shared.pending.take() {
            debug!("superseding pending upload detection");
            pending.abort();
            shared.generation += 1;
        }

        self.start_detection(&mut shared, frame, SourceKind::Upload, now)
    }

    fn start_detection(
        &self,
        shared: &mut Shared,
        frame: Frame,
        source: SourceKind,
        now: DateTime<Local>,
    ) -> DetectionTask {
        shared.state.is_processing = true;
        shared.state.last_processed_at = Some(now);
        let generation = shared.generation;

        let analyzer = Arc::clone(&self.analyzer);
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let result = analyzer.detect(&frame, source, now).await;
            pipeline.apply(generation, result)
        });

        shared.pending = Some(task.abort_handle());
        task
    }

    fn apply(&self, generation: u64, result: DetectionResult) -> Option<DetectionResult> {
        let mut shared = self.lock();
        if shared.generation != generation {
            debug!(emotion = %result.emotion, "discarding stale detection");
            return None;
        }

        shared.state.current_emotion = Some(result.emotion);
        shared.state.is_processing = false;
        shared.latest = Some(result.clone());
        shared.pending = None;
        drop(shared);

        info!("Detected {}", result);
        if let Err(e) = self.result_sender.send(result.clone()) {
            debug!("no result subscribers: {}", e);
        }
        Some(result)
    }

    /// One render tick: redraws the overlay for the current emotion.
    /// Independent of detection cadence.
    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C, frame_width: u32, frame_height: u32) {
        let emotion = self.state().current_emotion;
        self.renderer.draw(canvas, frame_width, frame_height, emotion);
    }
}

fn reset(shared: &mut Shared, source: Option<SourceKind>) {
    if let Some(pending) = shared.pending.take() {
        warn!("discarding in-flight detection after source change");
        pending.abort();
    }
    shared.generation += 1;
    shared.source = source;
    shared.state = PipelineState::default();
    shared.latest = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{CanvasOp, DisplayList};
    use chrono::{TimeZone, Utc};
    use rand::rngs::mock::StepRng;

    fn at(ms: i64) -> DateTime<Local> {
        Utc.timestamp_millis_opt(1_714_564_800_000 + ms)
            .unwrap()
            .with_timezone(&Local)
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(EmotionAnalyzer::with_rng(StepRng::new(0, 0)))
    }

    #[tokio::test(start_paused = true)]
    async fn processing_flag_spans_detection() {
        let pipeline = orchestrator();
        let task = pipeline
            .submit_frame(Frame::solid(30, 30, [0, 0, 0]), at(0))
            .unwrap();

        assert!(pipeline.state().is_processing);
        let result = task.await.unwrap().unwrap();

        let state = pipeline.state();
        assert!(!state.is_processing);
        assert_eq!(state.current_emotion, Some(result.emotion));
        assert_eq!(state.last_processed_at, Some(at(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn second_frame_during_detection_is_dropped() {
        let pipeline = orchestrator();
        let frame = Frame::solid(30, 30, [0, 0, 0]);

        let first = pipeline.submit_frame(frame.clone(), at(0)).unwrap();
        assert!(pipeline.submit_frame(frame.clone(), at(100)).is_none());
        first.await.unwrap();

        // Still inside the rate-limit window after completion
        assert!(pipeline.submit_frame(frame.clone(), at(1999)).is_none());
        assert!(pipeline.submit_frame(frame, at(2000)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_bypass_the_rate_limiter() {
        let pipeline = orchestrator();
        let frame = Frame::solid(30, 30, [220, 220, 220]);

        let first = pipeline.submit_image(frame.clone(), at(0)).await.unwrap();
        let second = pipeline.submit_image(frame, at(1)).await.unwrap();

        assert_eq!(first.map(|r| r.emotion), Some(Emotion::Happy));
        assert_eq!(second.map(|r| r.emotion), Some(Emotion::Happy));
    }

    #[tokio::test(start_paused = true)]
    async fn source_switch_discards_pending_result() {
        let pipeline = orchestrator();
        let task = pipeline
            .submit_frame(Frame::solid(30, 30, [0, 0, 0]), at(0))
            .unwrap();

        pipeline.activate(SourceKind::Upload);
        assert!(task.await.unwrap_err().is_cancelled());

        let state = pipeline.state();
        assert_eq!(state, PipelineState::default());
        assert_eq!(pipeline.active_source(), Some(SourceKind::Upload));
        assert!(pipeline.latest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_not_applied() {
        let pipeline = orchestrator();
        pipeline.activate(SourceKind::Upload);
        let result = DetectionResult::new(Emotion::Angry, 70, at(0));

        assert!(pipeline.apply(0, result).is_none());
        assert_eq!(pipeline.state().current_emotion, None);
    }

    #[tokio::test(start_paused = true)]
    async fn render_tick_draws_current_emotion() {
        let pipeline = orchestrator();
        let mut canvas = DisplayList::new();

        pipeline.render(&mut canvas, 64, 48);
        assert_eq!(
            canvas.ops(),
            &[CanvasOp::Resize { width: 64, height: 48 }, CanvasOp::Clear]
        );

        pipeline
            .submit_image(Frame::solid(30, 30, [220, 220, 220]), at(0))
            .await
            .unwrap();
        let mut canvas = DisplayList::new();
        pipeline.render(&mut canvas, 64, 48);
        assert_eq!(canvas.draw_commands().count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_broadcast() {
        let pipeline = orchestrator();
        let mut receiver = pipeline.subscribe();

        pipeline
            .submit_image(Frame::solid(30, 30, [220, 220, 220]), at(0))
            .await
            .unwrap();

        let published = receiver.recv().await.unwrap();
        assert_eq!(published.emotion, Emotion::Happy);
        assert_eq!(published.confidence, 85);
    }
}
