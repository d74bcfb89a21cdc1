// Emotion detection: sampling, classification and confidence behind a simulated inference delay

use crate::classifier::EmotionClassifier;
use crate::confidence::ConfidenceSynthesizer;
use crate::constants::DETECTION_LATENCY;
use crate::models::{DetectionResult, Emotion, Frame, SourceKind};
use crate::sampler::RegionSampler;
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

type SharedRng = Box<dyn RngCore + Send>;

/// Main emotion analyzer that combines region sampling, classification and confidence
pub struct EmotionAnalyzer {
    sampler: RegionSampler,
    classifier: EmotionClassifier,
    confidence: Mutex<ConfidenceSynthesizer<SharedRng>>,
    latency: Duration,
}

impl EmotionAnalyzer {
    /// Creates an analyzer whose confidence draws come from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an analyzer with an injected random source
    pub fn with_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            sampler: RegionSampler::new(),
            classifier: EmotionClassifier::new(),
            confidence: Mutex::new(ConfidenceSynthesizer::new(Box::new(rng))),
            latency: DETECTION_LATENCY,
        }
    }

    /// Simulated inference latency applied by [`detect`](Self::detect)
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Detects an emotion for one frame.
    ///
    /// Waits out the simulated latency, then classifies at `started_at + latency`.
    /// Never fails: when the frame cannot be put on a drawing surface the
    /// result falls back to neutral with a synthesized confidence.
    pub async fn detect(
        &self,
        frame: &Frame,
        source: SourceKind,
        started_at: DateTime<Local>,
    ) -> DetectionResult {
        tokio::time::sleep(self.latency).await;

        let observed_at = started_at
            + chrono::Duration::from_std(self.latency).unwrap_or_else(|_| chrono::Duration::zero());
        let emotion = self.classify(frame, source, observed_at);
        let confidence = self.confidence_for(emotion);

        debug!(%source, %emotion, confidence, "detection resolved");
        DetectionResult::new(emotion, confidence, observed_at)
    }

    /// Synchronous classification with no latency
    pub fn classify(&self, frame: &Frame, source: SourceKind, at: DateTime<Local>) -> Emotion {
        match self.sampler.sample(frame) {
            Ok(stats) => self.classifier.classify(&stats, source, &at),
            Err(e) => {
                warn!("Falling back to neutral: {}", e);
                Emotion::Neutral
            }
        }
    }

    fn confidence_for(&self, emotion: Emotion) -> u8 {
        match self.confidence.lock() {
            Ok(mut synth) => synth.confidence_for(emotion),
            Err(poisoned) => poisoned.into_inner().confidence_for(emotion),
        }
    }
}

impl Default for EmotionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
