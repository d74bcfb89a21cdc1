// Region sampling: pixel statistics over sub-rectangles of a frame

use crate::constants::SAMPLE_REGION_DIVISOR;
use crate::error::{EmotionDetectorError, Result};
use crate::models::Frame;
use image::{imageops, GenericImageView, RgbImage};

/// Axis-aligned pixel rectangle, always fully inside the frame it was built for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SampleRect {
    /// Builds a rectangle of the requested size centred on `(cx, cy)`.
    ///
    /// The size is clamped to `1..=frame dimension` and the origin to
    /// `0..=frame dimension - size`, so the result never reads out of bounds.
    pub fn centered(
        cx: i64,
        cy: i64,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let width = width.clamp(1, frame_width.max(1));
        let height = height.clamp(1, frame_height.max(1));
        let max_x = i64::from(frame_width.saturating_sub(width));
        let max_y = i64::from(frame_height.saturating_sub(height));

        Self {
            x: (cx - i64::from(width) / 2).clamp(0, max_x) as u32,
            y: (cy - i64::from(height) / 2).clamp(0, max_y) as u32,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Mean and population standard deviation per RGB channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionStats {
    pub mean: [f64; 3],
    pub std_dev: [f64; 3],
}

impl RegionStats {
    pub fn brightness(&self) -> f64 {
        self.mean.iter().sum::<f64>() / 3.0
    }
}

/// Statistics derived from one frame for one detection call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStatistics {
    pub width: u32,
    pub height: u32,
    pub avg_r: f64,
    pub avg_g: f64,
    pub avg_b: f64,
    pub std_r: f64,
    pub std_g: f64,
    pub std_b: f64,
    pub brightness: f64,
    pub red_green_ratio: f64,
    pub blue_green_ratio: f64,
    pub color_variance: f64,
    pub vertical_brightness_ratio: f64,
}

/// Regions sampled for a frame of a given size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleLayout {
    /// Central square, a proxy for the face
    pub face: SampleRect,
    /// Band across the top third of the face square (brows/forehead)
    pub upper: SampleRect,
    /// Band across the bottom third of the face square (mouth)
    pub lower: SampleRect,
}

impl SampleLayout {
    /// Face square of side `min(width, height) / 3` at the frame centre.
    ///
    /// The upper and lower bands span the face square's width (not the
    /// frame's) and a third of its height, offset a third of its side above
    /// and below the centre.
    pub fn for_frame(width: u32, height: u32) -> Self {
        let side = (width.min(height) / SAMPLE_REGION_DIVISOR).max(1);
        let band = (side / 3).max(1);
        let cx = i64::from(width / 2);
        let cy = i64::from(height / 2);
        let offset = i64::from(side / 3);

        Self {
            face: SampleRect::centered(cx, cy, side, side, width, height),
            upper: SampleRect::centered(cx, cy - offset, side, band, width, height),
            lower: SampleRect::centered(cx, cy + offset, side, band, width, height),
        }
    }
}

/// Extracts pixel statistics from a frame
#[derive(Clone, Copy, Debug, Default)]
pub struct RegionSampler;

impl RegionSampler {
    pub fn new() -> Self {
        Self
    }

    /// Copies the frame into an off-screen buffer at its natural size
    fn surface(&self, frame: &Frame) -> Result<RgbImage> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EmotionDetectorError::SurfaceUnavailable(format!(
                "frame has zero extent ({}x{})",
                frame.width, frame.height
            )));
        }

        RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
            EmotionDetectorError::SurfaceUnavailable(format!(
                "{} bytes do not fill a {}x{} RGB buffer",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })
    }

    /// Samples one rectangle of a frame
    pub fn sample_region(&self, frame: &Frame, rect: SampleRect) -> Result<RegionStats> {
        let surface = self.surface(frame)?;
        Ok(region_stats(&surface, rect))
    }

    /// Computes the full statistics used by the classifier
    pub fn sample(&self, frame: &Frame) -> Result<FrameStatistics> {
        let surface = self.surface(frame)?;
        let layout = SampleLayout::for_frame(frame.width, frame.height);

        let face = region_stats(&surface, layout.face);
        let upper = region_stats(&surface, layout.upper);
        let lower = region_stats(&surface, layout.lower);

        let [avg_r, avg_g, avg_b] = face.mean;
        let [std_r, std_g, std_b] = face.std_dev;
        let green_floor = avg_g.max(1.0);

        Ok(FrameStatistics {
            width: frame.width,
            height: frame.height,
            avg_r,
            avg_g,
            avg_b,
            std_r,
            std_g,
            std_b,
            brightness: face.brightness(),
            red_green_ratio: avg_r / green_floor,
            blue_green_ratio: avg_b / green_floor,
            color_variance: (std_r + std_g + std_b) / 3.0,
            vertical_brightness_ratio: upper.brightness() / lower.brightness().max(1.0),
        })
    }
}

/// Two passes over the region: channel means, then population deviations
fn region_stats(surface: &RgbImage, rect: SampleRect) -> RegionStats {
    let view = imageops::crop_imm(surface, rect.x, rect.y, rect.width, rect.height);
    let count = rect.area().max(1) as f64;

    let mut totals = [0.0f64; 3];
    for (_, _, pixel) in view.pixels() {
        for (total, value) in totals.iter_mut().zip(pixel.0) {
            *total += f64::from(value);
        }
    }
    let mean = totals.map(|total| total / count);

    let mut squares = [0.0f64; 3];
    for (_, _, pixel) in view.pixels() {
        for ((square, value), avg) in squares.iter_mut().zip(pixel.0).zip(mean) {
            *square += (f64::from(value) - avg).powi(2);
        }
    }
    let std_dev = squares.map(|square| (square / count).sqrt());

    RegionStats { mean, std_dev }
}
