// Core data models for the emotion overlay pipeline

use chrono::{DateTime, Local};

/// Represents a single video frame or decoded image with RGB data
#[derive(Clone, Debug)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Creates a frame where every pixel has the same colour
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(data, width, height)
    }
}

/// Where a frame came from. Drives classifier mode and rate limiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Continuous stream from a capture device
    Camera,
    /// A single user-selected image
    Upload,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Upload => write!(f, "upload"),
        }
    }
}

/// Represents the detected emotional state.
///
/// Declaration order is the canonical order used for score tie-breaking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Neutral,
}

impl Emotion {
    /// All emotions in canonical order
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Neutral,
    ];

    /// Position in the canonical order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lower-case identifier
    pub fn id(self) -> &'static str {
        self.details().id
    }

    /// Parses a lower-case identifier
    pub fn from_id(id: &str) -> Option<Emotion> {
        EMOTION_DETAILS
            .iter()
            .position(|details| details.id == id)
            .map(|idx| Emotion::ALL[idx])
    }

    /// Display label and glyph for this emotion
    pub fn details(self) -> &'static EmotionDetails {
        &EMOTION_DETAILS[self.index()]
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.details().label)
    }
}

/// Presentation details for an emotion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmotionDetails {
    pub id: &'static str,
    pub label: &'static str,
    pub glyph: &'static str,
}

impl EmotionDetails {
    /// Placeholder shown while no emotion has been resolved yet
    pub fn waiting() -> &'static EmotionDetails {
        &WAITING_DETAILS
    }
}

static EMOTION_DETAILS: [EmotionDetails; 7] = [
    EmotionDetails { id: "happy", label: "Happy", glyph: "😊" },
    EmotionDetails { id: "sad", label: "Sad", glyph: "😢" },
    EmotionDetails { id: "angry", label: "Angry", glyph: "😠" },
    EmotionDetails { id: "surprised", label: "Surprised", glyph: "😲" },
    EmotionDetails { id: "fearful", label: "Fearful", glyph: "😨" },
    EmotionDetails { id: "disgusted", label: "Disgusted", glyph: "🤢" },
    EmotionDetails { id: "neutral", label: "Neutral", glyph: "😐" },
];

static WAITING_DETAILS: EmotionDetails = EmotionDetails {
    id: "waiting",
    label: "Waiting for detection...",
    glyph: "😶",
};

/// Looks up display details by identifier. Unknown ids map to neutral.
pub fn describe(id: &str) -> &'static EmotionDetails {
    Emotion::from_id(id)
        .unwrap_or(Emotion::Neutral)
        .details()
}

/// Result of emotion detection containing the emotion, confidence, and timing
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    /// The detected emotion
    pub emotion: Emotion,
    /// Display confidence in percent (0-100)
    pub confidence: u8,
    /// When the detection resolved
    pub observed_at: DateTime<Local>,
}

impl DetectionResult {
    /// Creates a new DetectionResult
    pub fn new(emotion: Emotion, confidence: u8, observed_at: DateTime<Local>) -> Self {
        Self {
            emotion,
            confidence: confidence.min(100),
            observed_at,
        }
    }
}

impl std::fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}% confidence)",
            self.emotion,
            self.emotion.details().glyph,
            self.confidence
        )
    }
}
