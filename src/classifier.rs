// Rule-based emotion scoring over frame statistics

use crate::models::{Emotion, SourceKind};
use crate::sampler::FrameStatistics;
use chrono::Timelike;

/// Labels a continuous stream rotates through
pub const STREAM_ROTATION: [Emotion; 4] = [
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Fearful,
    Emotion::Disgusted,
];

/// Flat bias added to every single-shot score vector
const UPLOAD_BIAS: [(Emotion, u32); 4] = [
    (Emotion::Happy, 3),
    (Emotion::Sad, 3),
    (Emotion::Disgusted, 3),
    (Emotion::Fearful, 3),
];

/// Per-emotion scores, stored and iterated in canonical order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreVector {
    scores: [u32; 7],
}

impl ScoreVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, emotion: Emotion, amount: u32) {
        self.scores[emotion.index()] += amount;
    }

    pub fn get(&self, emotion: Emotion) -> u32 {
        self.scores[emotion.index()]
    }

    /// `(emotion, score)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u32)> + '_ {
        Emotion::ALL.iter().map(|&emotion| (emotion, self.get(emotion)))
    }

    /// Highest score wins; ties keep the earlier emotion; all-zero is neutral
    pub fn resolve(&self) -> Emotion {
        let mut best = Emotion::Neutral;
        let mut best_score = 0;
        for (emotion, score) in self.iter() {
            if score > best_score {
                best = emotion;
                best_score = score;
            }
        }
        best
    }
}

/// Label for a continuous stream at a given wall-clock minute and second.
///
/// Ignores pixel content: `(minute + second / 4) mod 4` indexes the rotation.
pub fn stream_label(minute: u32, second: u32) -> Emotion {
    STREAM_ROTATION[((minute + second / 4) % 4) as usize]
}

/// Accumulates threshold-rule scores for a single uploaded image
pub fn score(stats: &FrameStatistics) -> ScoreVector {
    let mut scores = ScoreVector::new();
    let brightness = stats.brightness;

    if brightness > 170.0 {
        scores.add(Emotion::Happy, 8);
    } else if brightness > 140.0 {
        scores.add(Emotion::Happy, 5);
        scores.add(Emotion::Neutral, 3);
    } else if brightness < 80.0 {
        scores.add(Emotion::Fearful, 7);
        scores.add(Emotion::Sad, 6);
    } else if brightness < 110.0 {
        scores.add(Emotion::Sad, 5);
        scores.add(Emotion::Fearful, 4);
    }

    // Red dominance takes precedence over blue dominance
    if stats.red_green_ratio > 1.2 {
        scores.add(Emotion::Angry, 4);
        scores.add(Emotion::Disgusted, 6);
    } else if stats.blue_green_ratio > 1.2 {
        scores.add(Emotion::Sad, 5);
        scores.add(Emotion::Fearful, 3);
    }

    if stats.color_variance > 70.0 {
        scores.add(Emotion::Surprised, 4);
        scores.add(Emotion::Fearful, 3);
        scores.add(Emotion::Disgusted, 5);
    } else if stats.color_variance < 30.0 {
        scores.add(Emotion::Neutral, 5);
        scores.add(Emotion::Sad, 3);
    }

    for (emotion, bias) in UPLOAD_BIAS {
        scores.add(emotion, bias);
    }

    scores
}

/// Converts frame statistics into a single emotion label
#[derive(Clone, Copy, Debug, Default)]
pub struct EmotionClassifier;

impl EmotionClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Camera frames follow the clock rotation, uploads are scored
    pub fn classify<T: Timelike>(
        &self,
        stats: &FrameStatistics,
        source: SourceKind,
        at: &T,
    ) -> Emotion {
        match source {
            SourceKind::Camera => stream_label(at.minute(), at.second()),
            SourceKind::Upload => score(stats).resolve(),
        }
    }
}
