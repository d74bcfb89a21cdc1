// Camera module for webcam capture and frame delivery

use crate::constants::CAPTURE_FRAME_INTERVAL;
use crate::error::{EmotionDetectorError, Result};
use crate::models::Frame;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{error, info, warn};

/// Consecutive capture failures tolerated before the loop gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// A source of live frames
pub trait CaptureDevice {
    /// Acquires the underlying hardware and starts streaming
    fn start(&mut self) -> Result<()>;
    /// Releases every underlying track. Must be safe to call repeatedly.
    fn stop(&mut self);
    /// Grabs the most recent frame
    fn frame(&mut self) -> Result<Frame>;
}

/// Scoped camera acquisition. The device is stopped on every exit path:
/// failed start, explicit release, or drop.
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    released: bool,
}

impl<D: CaptureDevice> CaptureSession<D> {
    /// Starts the device. A failed start still releases whatever was acquired;
    /// there is no automatic retry.
    pub fn acquire(mut device: D) -> Result<Self> {
        if let Err(e) = device.start() {
            error!("Failed to start capture: {}", e);
            device.stop();
            return Err(e);
        }

        info!("Capture started");
        Ok(Self {
            device,
            released: false,
        })
    }

    /// Gets the most recent frame
    pub fn next_frame(&mut self) -> Result<Frame> {
        if self.released {
            return Err(EmotionDetectorError::CameraInit(
                "capture session already released".to_string(),
            ));
        }
        self.device.frame()
    }

    /// Delivers frames to `callback` at roughly `interval` pacing until it
    /// breaks. Individual capture failures are skipped.
    ///
    /// `frame()` may block; the loop hands control back to the runtime on
    /// every iteration so work spawned from `callback` keeps running on a
    /// current-thread runtime.
    pub async fn on_frame<F>(&mut self, interval: Duration, mut callback: F) -> Result<()>
    where
        F: FnMut(Frame) -> ControlFlow<()>,
    {
        let mut failures = 0;
        let mut last_frame_time = tokio::time::Instant::now();

        loop {
            // Rate limiting to the target frame interval. A slow device still
            // yields once per frame so spawned detections and timers make progress.
            let elapsed = last_frame_time.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            } else {
                tokio::task::yield_now().await;
            }
            last_frame_time = tokio::time::Instant::now();

            match self.next_frame() {
                Ok(frame) => {
                    failures = 0;
                    if callback(frame).is_break() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!("Failed to capture frame ({}/{}): {}", failures, MAX_CONSECUTIVE_FAILURES, e);
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(EmotionDetectorError::CameraInit(format!(
                            "capture failed {failures} times in a row: {e}"
                        )));
                    }
                }
            }
        }
    }

    /// [`on_frame`](Self::on_frame) at the default ~30 FPS pacing
    pub async fn run<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(Frame) -> ControlFlow<()>,
    {
        self.on_frame(CAPTURE_FRAME_INTERVAL, callback).await
    }

    /// Stops the device now instead of at drop
    pub fn release(mut self) {
        self.stop_device();
    }

    fn stop_device(&mut self) {
        if !self.released {
            self.released = true;
            self.device.stop();
            info!("Capture stopped");
        }
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.stop_device();
    }
}

#[cfg(feature = "camera")]
pub use native::NokhwaCamera;

#[cfg(feature = "camera")]
mod native {
    use super::CaptureDevice;
    use crate::config::CameraConfig;
    use crate::error::{EmotionDetectorError, Result};
    use crate::models::Frame;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use nokhwa::Camera;
    use tracing::error;

    /// Native webcam backed by nokhwa
    pub struct NokhwaCamera {
        camera: Option<Camera>,
        index: u32,
        requested_format: RequestedFormat<'static>,
    }

    impl NokhwaCamera {
        pub fn new(config: &CameraConfig) -> Self {
            let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                CameraFormat::new(
                    Resolution::new(config.width, config.height),
                    FrameFormat::YUYV,
                    config.fps,
                ),
            ));

            Self {
                camera: None,
                index: config.index,
                requested_format,
            }
        }

        /// Lists available camera devices
        pub fn list_devices() -> Result<Vec<String>> {
            let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
            Ok(devices
                .iter()
                .map(|info| info.human_name().to_string())
                .collect())
        }

        fn try_open_camera(&self, index: u32) -> Result<Camera> {
            let mut camera = Camera::new(CameraIndex::Index(index), self.requested_format)?;
            camera.open_stream()?;
            Ok(camera)
        }
    }

    impl CaptureDevice for NokhwaCamera {
        fn start(&mut self) -> Result<()> {
            if self.camera.is_some() {
                return Ok(());
            }

            // Some systems number the default camera from 1
            let camera = self
                .try_open_camera(self.index)
                .or_else(|_| self.try_open_camera(self.index + 1))?;
            self.camera = Some(camera);
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(mut camera) = self.camera.take() {
                if let Err(e) = camera.stop_stream() {
                    error!("Error stopping camera stream: {}", e);
                }
            }
        }

        fn frame(&mut self) -> Result<Frame> {
            let camera = self.camera.as_mut().ok_or_else(|| {
                EmotionDetectorError::CameraInit("camera stream is not open".to_string())
            })?;

            let buffer = camera.frame()?.decode_image::<RgbFormat>()?;
            let (width, height) = (buffer.width(), buffer.height());
            Ok(Frame::new(buffer.into_raw(), width, height))
        }
    }

    impl Drop for NokhwaCamera {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
