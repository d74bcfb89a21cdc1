// Library exports for the emotion overlay pipeline

pub mod camera;
pub mod classifier;
pub mod config;
pub mod confidence;
pub mod constants;
pub mod emotion;
pub mod error;
pub mod models;
pub mod overlay;
pub mod pipeline;
pub mod rate_limit;
pub mod sampler;
pub mod upload;

pub use error::{EmotionDetectorError, Result};
pub use models::{describe, DetectionResult, Emotion, EmotionDetails, Frame, SourceKind};
