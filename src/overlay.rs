// Procedural face overlay keyed on the current emotion

use crate::constants::{
    FACE_SIZE_RATIO, FEATURE_WIDTH, OUTLINE_WIDTH, OVERLAY_COLOR, WRINKLE_COLOR, WRINKLE_WIDTH,
};
use crate::error::{EmotionDetectorError, Result};
use crate::models::{Emotion, Frame};
use image::{imageops, DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::point::Point as PixelPoint;
use std::f32::consts::{PI, TAU};

/// Point in canvas coordinates (x right, y down)
pub type Point = (f32, f32);

/// How a shape is put on the canvas
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Paint {
    Stroke { color: [u8; 4], width: f32 },
    Fill { color: [u8; 4] },
}

/// Vector primitives the renderer emits.
///
/// Angles are in radians and run clockwise on screen, matching a y-down canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Arc {
        center: Point,
        radius: f32,
        start: f32,
        end: f32,
    },
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
    },
    Polyline(Vec<Point>),
    Quadratic {
        from: Point,
        control: Point,
        to: Point,
    },
}

impl Shape {
    fn circle(center: Point, radius: f32) -> Self {
        Shape::Arc {
            center,
            radius,
            start: 0.0,
            end: TAU,
        }
    }

    fn line(from: Point, to: Point) -> Self {
        Shape::Polyline(vec![from, to])
    }

    /// Flattens the shape into a sequence of points
    pub fn flatten(&self) -> Vec<Point> {
        match self {
            Shape::Arc {
                center,
                radius,
                start,
                end,
            } => {
                let sweep = end - start;
                let steps = (sweep.abs() * radius.max(1.0) / 2.0).ceil().clamp(8.0, 512.0) as usize;
                (0..=steps)
                    .map(|i| {
                        let angle = start + sweep * i as f32 / steps as f32;
                        (center.0 + radius * angle.cos(), center.1 + radius * angle.sin())
                    })
                    .collect()
            }
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
                rotation,
            } => {
                let steps = 64;
                let (sin_r, cos_r) = rotation.sin_cos();
                (0..steps)
                    .map(|i| {
                        let t = TAU * i as f32 / steps as f32;
                        let x = radius_x * t.cos();
                        let y = radius_y * t.sin();
                        (
                            center.0 + x * cos_r - y * sin_r,
                            center.1 + x * sin_r + y * cos_r,
                        )
                    })
                    .collect()
            }
            Shape::Polyline(points) => points.clone(),
            Shape::Quadratic { from, control, to } => {
                let steps = 24;
                (0..=steps)
                    .map(|i| {
                        let t = i as f32 / steps as f32;
                        let u = 1.0 - t;
                        (
                            u * u * from.0 + 2.0 * u * t * control.0 + t * t * to.0,
                            u * u * from.1 + 2.0 * u * t * control.1 + t * t * to.1,
                        )
                    })
                    .collect()
            }
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Shape::Arc { start, end, .. } => (end - start).abs() >= TAU,
            Shape::Ellipse { .. } => true,
            _ => false,
        }
    }
}

/// One shape plus how to paint it
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub shape: Shape,
    pub paint: Paint,
}

impl DrawCommand {
    pub fn stroke(shape: Shape, color: [u8; 4], width: f32) -> Self {
        Self {
            shape,
            paint: Paint::Stroke { color, width },
        }
    }

    pub fn fill(shape: Shape, color: [u8; 4]) -> Self {
        Self {
            shape,
            paint: Paint::Fill { color },
        }
    }
}

/// Drawing surface the overlay is rendered onto
pub trait Canvas {
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn draw(&mut self, command: &DrawCommand);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EyeShape {
    Wide,
    Angled,
    Round,
}

impl From<Emotion> for EyeShape {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Surprised | Emotion::Fearful => EyeShape::Wide,
            Emotion::Angry | Emotion::Disgusted => EyeShape::Angled,
            _ => EyeShape::Round,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowShape {
    /// Inner ends pulled down
    Furrowed,
    /// Both brows lifted
    Raised,
    /// Inner ends lifted
    Worried,
    Level,
}

impl From<Emotion> for BrowShape {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Angry | Emotion::Disgusted => BrowShape::Furrowed,
            Emotion::Surprised | Emotion::Fearful => BrowShape::Raised,
            Emotion::Sad => BrowShape::Worried,
            _ => BrowShape::Level,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouthShape {
    Smile,
    Frown,
    Open,
    Grimace,
    Sneer,
    Flat,
}

impl From<Emotion> for MouthShape {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Happy => MouthShape::Smile,
            Emotion::Sad => MouthShape::Frown,
            Emotion::Surprised | Emotion::Fearful => MouthShape::Open,
            Emotion::Angry => MouthShape::Grimace,
            Emotion::Disgusted => MouthShape::Sneer,
            Emotion::Neutral => MouthShape::Flat,
        }
    }
}

/// Proportions of the procedural face for one frame size
#[derive(Clone, Copy, Debug, PartialEq)]
struct FaceGeometry {
    cx: f32,
    cy: f32,
    face: f32,
    eye: f32,
    eye_dx: f32,
    eye_dy: f32,
}

impl FaceGeometry {
    fn new(width: u32, height: u32) -> Self {
        let face = width.min(height) as f32 * FACE_SIZE_RATIO;
        Self {
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            face,
            eye: face * 0.15,
            eye_dx: face * 0.3,
            eye_dy: face * 0.1,
        }
    }

    fn eye_centers(&self) -> [Point; 2] {
        let y = self.cy - self.eye_dy;
        [(self.cx - self.eye_dx, y), (self.cx + self.eye_dx, y)]
    }

    fn mouth(&self, dy: f32) -> f32 {
        self.cy + self.face * dy
    }
}

/// Renders a label-keyed face; no landmark tracking is involved
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Resizes and clears the canvas, then draws the face for `emotion`.
    /// With no emotion the canvas is left blank.
    pub fn draw<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        frame_width: u32,
        frame_height: u32,
        emotion: Option<Emotion>,
    ) {
        canvas.resize(frame_width, frame_height);
        canvas.clear();

        if let Some(emotion) = emotion {
            for command in self.commands(frame_width, frame_height, emotion) {
                canvas.draw(&command);
            }
        }
    }

    /// Draw commands for one face, in paint order
    pub fn commands(&self, frame_width: u32, frame_height: u32, emotion: Emotion) -> Vec<DrawCommand> {
        let geometry = FaceGeometry::new(frame_width, frame_height);
        let mut commands = vec![DrawCommand::stroke(
            Shape::circle((geometry.cx, geometry.cy), geometry.face),
            OVERLAY_COLOR,
            OUTLINE_WIDTH,
        )];

        commands.extend(eyes(&geometry, emotion.into()));
        commands.extend(brows(&geometry, emotion.into()));
        commands.push(mouth(&geometry, emotion.into()));

        if matches!(emotion, Emotion::Fearful | Emotion::Surprised) {
            commands.extend(wrinkles(&geometry));
        }

        commands
    }
}

fn eyes(g: &FaceGeometry, shape: EyeShape) -> Vec<DrawCommand> {
    let [left, right] = g.eye_centers();
    let shapes = match shape {
        EyeShape::Wide => [
            Shape::circle(left, g.eye * 1.2),
            Shape::circle(right, g.eye * 1.2),
        ],
        EyeShape::Angled => [
            Shape::Ellipse {
                center: left,
                radius_x: g.eye,
                radius_y: g.eye * 0.7,
                rotation: PI / 6.0,
            },
            Shape::Ellipse {
                center: right,
                radius_x: g.eye,
                radius_y: g.eye * 0.7,
                rotation: -PI / 6.0,
            },
        ],
        EyeShape::Round => [Shape::circle(left, g.eye), Shape::circle(right, g.eye)],
    };

    shapes
        .into_iter()
        .map(|shape| DrawCommand::fill(shape, OVERLAY_COLOR))
        .collect()
}

fn brows(g: &FaceGeometry, shape: BrowShape) -> Vec<DrawCommand> {
    let base = g.cy - g.eye_dy * 1.7;
    let half = g.eye;
    let lifted = base - g.eye / 2.0;
    let [(left_x, _), (right_x, _)] = g.eye_centers();

    // (outer-left y, inner-left y, inner-right y, outer-right y)
    let (ll, li, ri, rr) = match shape {
        BrowShape::Furrowed => (base, lifted, lifted, base),
        BrowShape::Raised => {
            let high = base - g.eye;
            (high, high, high, high)
        }
        BrowShape::Worried => (lifted, base, base, lifted),
        BrowShape::Level => (base, base, base, base),
    };

    [
        Shape::line((left_x - half, ll), (left_x + half, li)),
        Shape::line((right_x - half, ri), (right_x + half, rr)),
    ]
    .into_iter()
    .map(|shape| DrawCommand::stroke(shape, OVERLAY_COLOR, FEATURE_WIDTH))
    .collect()
}

fn mouth(g: &FaceGeometry, shape: MouthShape) -> DrawCommand {
    let left = g.cx - g.face * 0.3;
    let right = g.cx + g.face * 0.3;

    let shape = match shape {
        MouthShape::Smile => Shape::Arc {
            center: (g.cx, g.mouth(0.2)),
            radius: g.face * 0.4,
            start: 0.0,
            end: PI,
        },
        MouthShape::Frown => Shape::Arc {
            center: (g.cx, g.mouth(0.6)),
            radius: g.face * 0.4,
            start: PI,
            end: TAU,
        },
        MouthShape::Open => Shape::circle((g.cx, g.mouth(0.3)), g.face * 0.2),
        MouthShape::Grimace => Shape::Polyline(vec![
            (left, g.mouth(0.3)),
            (g.cx, g.mouth(0.4)),
            (right, g.mouth(0.3)),
        ]),
        MouthShape::Sneer => Shape::Quadratic {
            from: (left, g.mouth(0.3)),
            control: (g.cx, g.mouth(0.5)),
            to: (right, g.mouth(0.2)),
        },
        MouthShape::Flat => Shape::line((left, g.mouth(0.3)), (right, g.mouth(0.3))),
    };

    DrawCommand::stroke(shape, OVERLAY_COLOR, FEATURE_WIDTH)
}

fn wrinkles(g: &FaceGeometry) -> Vec<DrawCommand> {
    let low = g.cy - g.eye_dy - g.eye * 1.5;
    let peak = g.cy - g.eye_dy - g.eye * 2.0;

    g.eye_centers()
        .into_iter()
        .map(|(x, _)| {
            DrawCommand::stroke(
                Shape::Quadratic {
                    from: (x - g.eye, low),
                    control: (x, peak),
                    to: (x + g.eye, low),
                },
                WRINKLE_COLOR,
                WRINKLE_WIDTH,
            )
        })
        .collect()
}

/// Canvas operation as recorded by [`DisplayList`]
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    Resize { width: u32, height: u32 },
    Clear,
    Draw(DrawCommand),
}

/// Canvas that records every operation instead of rasterizing
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    ops: Vec<CanvasOp>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    pub fn draw_commands(&self) -> impl Iterator<Item = &DrawCommand> {
        self.ops.iter().filter_map(|op| match op {
            CanvasOp::Draw(command) => Some(command),
            _ => None,
        })
    }
}

impl Canvas for DisplayList {
    fn resize(&mut self, width: u32, height: u32) {
        self.ops.push(CanvasOp::Resize { width, height });
    }

    fn clear(&mut self) {
        self.ops.push(CanvasOp::Clear);
    }

    fn draw(&mut self, command: &DrawCommand) {
        self.ops.push(CanvasOp::Draw(command.clone()));
    }
}

/// Transparent RGBA canvas rasterized with `imageproc`
#[derive(Clone, Debug)]
pub struct RasterCanvas {
    image: RgbaImage,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// True when every pixel is fully transparent
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|pixel| pixel.0[3] == 0)
    }

    /// The frame with this overlay alpha-blended on top
    pub fn composite_onto(&self, frame: &Frame) -> Result<RgbaImage> {
        let base = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
            EmotionDetectorError::SurfaceUnavailable(format!(
                "cannot composite onto a malformed {}x{} frame",
                frame.width, frame.height
            ))
        })?;

        let mut composite = DynamicImage::ImageRgb8(base).to_rgba8();
        imageops::overlay(&mut composite, &self.image, 0, 0);
        Ok(composite)
    }

    fn stroke(&mut self, points: &[Point], color: Rgba<u8>, width: f32) {
        let radius = (width / 2.0).round().max(1.0) as i32;
        let stamp = |image: &mut RgbaImage, (x, y): Point| {
            imageproc::drawing::draw_filled_circle_mut(
                image,
                (x.round() as i32, y.round() as i32),
                radius,
                color,
            );
        };

        if let [only] = points {
            stamp(&mut self.image, *only);
            return;
        }

        for pair in points.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let length = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
            let steps = length.ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                stamp(
                    &mut self.image,
                    (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t),
                );
            }
        }
    }

    fn fill(&mut self, points: &[Point], color: Rgba<u8>) {
        let mut polygon: Vec<PixelPoint<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let point = PixelPoint::new(x.round() as i32, y.round() as i32);
            if polygon.last() != Some(&point) {
                polygon.push(point);
            }
        }
        while polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }

        // draw_polygon_mut needs an open ring of at least three vertices
        if polygon.len() >= 3 {
            imageproc::drawing::draw_polygon_mut(&mut self.image, &polygon, color);
        } else if let Some(point) = polygon.first() {
            imageproc::drawing::draw_filled_circle_mut(&mut self.image, (point.x, point.y), 1, color);
        }
    }
}

impl Canvas for RasterCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw(&mut self, command: &DrawCommand) {
        let mut points = command.shape.flatten();
        match command.paint {
            Paint::Stroke { color, width } => {
                if command.shape.is_closed() {
                    if let Some(&first) = points.first() {
                        points.push(first);
                    }
                }
                self.stroke(&points, Rgba(color), width);
            }
            Paint::Fill { color } => self.fill(&points, Rgba(color)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_classes_per_emotion() {
        assert_eq!(EyeShape::from(Emotion::Fearful), EyeShape::Wide);
        assert_eq!(EyeShape::from(Emotion::Disgusted), EyeShape::Angled);
        assert_eq!(EyeShape::from(Emotion::Happy), EyeShape::Round);
        assert_eq!(BrowShape::from(Emotion::Sad), BrowShape::Worried);
        assert_eq!(BrowShape::from(Emotion::Neutral), BrowShape::Level);
        assert_eq!(MouthShape::from(Emotion::Disgusted), MouthShape::Sneer);
        assert_eq!(MouthShape::from(Emotion::Angry), MouthShape::Grimace);
    }

    #[test]
    fn face_radius_is_thirty_percent_of_short_side() {
        let commands = OverlayRenderer::new().commands(640, 480, Emotion::Neutral);
        match &commands[0].shape {
            Shape::Arc { center, radius, .. } => {
                assert_eq!(*center, (320.0, 240.0));
                assert!((radius - 144.0).abs() < 1e-3);
            }
            other => panic!("expected outline arc, got {other:?}"),
        }
    }

    #[test]
    fn wrinkles_only_for_fear_and_surprise() {
        let renderer = OverlayRenderer::new();
        for emotion in Emotion::ALL {
            let count = renderer.commands(200, 200, emotion).len();
            let expected = if matches!(emotion, Emotion::Fearful | Emotion::Surprised) {
                8
            } else {
                6
            };
            assert_eq!(count, expected, "{emotion}");
        }
    }

    #[test]
    fn angled_eyes_mirror_each_other() {
        let commands = OverlayRenderer::new().commands(300, 300, Emotion::Angry);
        let rotations: Vec<f32> = commands
            .iter()
            .filter_map(|c| match c.shape {
                Shape::Ellipse { rotation, .. } => Some(rotation),
                _ => None,
            })
            .collect();
        assert_eq!(rotations, vec![PI / 6.0, -PI / 6.0]);
    }

    #[test]
    fn smile_arc_bulges_downwards() {
        let commands = OverlayRenderer::new().commands(300, 300, Emotion::Happy);
        let mouth = &commands[5];
        let points = mouth.shape.flatten();
        let mid = points[points.len() / 2];
        assert!(mid.1 > points[0].1);
    }

    #[test]
    fn flattened_quadratic_hits_endpoints() {
        let shape = Shape::Quadratic {
            from: (0.0, 0.0),
            control: (5.0, 10.0),
            to: (10.0, 0.0),
        };
        let points = shape.flatten();
        assert_eq!(points.first(), Some(&(0.0, 0.0)));
        assert_eq!(points.last(), Some(&(10.0, 0.0)));
    }
}
