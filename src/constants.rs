//! Fixed pipeline constants. None of these are runtime-configurable.

use std::time::Duration;

/// Minimum spacing between detections on a continuous stream
pub const RATE_LIMIT_INTERVAL_MS: i64 = 2000;

/// Simulated inference latency of a single detection
pub const DETECTION_LATENCY: Duration = Duration::from_millis(500);

/// The central sample square has side `min(width, height) / SAMPLE_REGION_DIVISOR`
pub const SAMPLE_REGION_DIVISOR: u32 = 3;

/// Face radius as a fraction of the smaller frame dimension
pub const FACE_SIZE_RATIO: f32 = 0.3;

/// Stroke and fill colour of the overlay (rgba 130, 87, 229, 0.7)
pub const OVERLAY_COLOR: [u8; 4] = [130, 87, 229, 179];

/// Fainter colour used for forehead wrinkles (alpha 0.4)
pub const WRINKLE_COLOR: [u8; 4] = [130, 87, 229, 102];

pub const OUTLINE_WIDTH: f32 = 2.0;
pub const FEATURE_WIDTH: f32 = 3.0;
pub const WRINKLE_WIDTH: f32 = 1.5;

/// Target pacing of the capture loop (~30 FPS)
pub const CAPTURE_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Capacity of the detection result broadcast channel
pub const RESULT_CHANNEL_CAPACITY: usize = 32;
