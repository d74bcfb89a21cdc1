// Error types for the emotion overlay pipeline

use thiserror::Error;

/// Main error type for the emotion overlay pipeline
#[derive(Debug, Error)]
pub enum EmotionDetectorError {
    #[error("Drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Camera access denied")]
    CameraAccessDenied,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EmotionDetectorError>;

// Capture backend failures surface as capture-session errors
#[cfg(feature = "camera")]
impl From<nokhwa::NokhwaError> for EmotionDetectorError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        use nokhwa::NokhwaError;

        match err {
            NokhwaError::OpenDeviceError(_, reason)
                if reason.to_lowercase().contains("permission") =>
            {
                EmotionDetectorError::CameraAccessDenied
            }
            NokhwaError::OpenDeviceError(device, reason) => EmotionDetectorError::CameraInit(
                format!("could not open capture device {device}: {reason}"),
            ),
            NokhwaError::OpenStreamError(reason) => {
                EmotionDetectorError::CameraInit(format!("capture stream did not start: {reason}"))
            }
            NokhwaError::ReadFrameError(reason) => {
                EmotionDetectorError::CameraInit(format!("frame capture failed: {reason}"))
            }
            other => EmotionDetectorError::CameraInit(format!("capture session: {other}")),
        }
    }
}

#[cfg(all(test, feature = "camera"))]
mod tests {
    use super::*;

    #[test]
    fn permission_failures_become_access_denied() {
        let err = EmotionDetectorError::from(nokhwa::NokhwaError::OpenDeviceError(
            "0".to_string(),
            "Permission denied (os error 13)".to_string(),
        ));
        assert!(matches!(err, EmotionDetectorError::CameraAccessDenied));
    }

    #[test]
    fn other_failures_name_the_capture_step() {
        let err = EmotionDetectorError::from(nokhwa::NokhwaError::ReadFrameError(
            "timeout".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Camera initialization failed: frame capture failed: timeout"
        );
    }
}
