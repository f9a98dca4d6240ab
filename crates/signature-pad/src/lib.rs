//! Freehand signature capture.
//!
//! A [`SignaturePad`] records pointer strokes into an RGBA raster with a
//! transparent background and opaque black ink. The raster can be exported
//! as a whitespace-trimmed PNG suitable for embedding into a document.

use image::{Rgba, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PEN_RADIUS: f32 = 1.8;
/// Sampling step along a stroke segment, in pixels.
const SEGMENT_STEP: f32 = 0.5;
/// Border kept around the inked bounding box when exporting.
const TRIM_PADDING: u32 = 4;

#[derive(Debug, Error)]
pub enum PadError {
    #[error("no strokes have been drawn")]
    EmptySignature,

    #[error("failed to encode signature image: {0}")]
    Encode(String),
}

/// An in-memory drawing surface for one signature.
pub struct SignaturePad {
    canvas: RgbaImage,
    cursor: Option<(f32, f32)>,
    inked: bool,
}

impl SignaturePad {
    /// Create a blank pad of the given pixel dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width.max(1), height.max(1)),
            cursor: None,
            inked: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// True iff nothing has been drawn since creation or the last [`clear`].
    ///
    /// [`clear`]: SignaturePad::clear
    pub fn is_empty(&self) -> bool {
        !self.inked
    }

    /// Discard all strokes and reset to the blank state.
    pub fn clear(&mut self) {
        self.canvas = RgbaImage::new(self.canvas.width(), self.canvas.height());
        self.cursor = None;
        self.inked = false;
    }

    /// Start a new stroke at `(x, y)`. A stroke of a single point leaves a dot.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        self.cursor = Some((x, y));
        self.stamp(x, y);
    }

    /// Extend the current stroke to `(x, y)`.
    ///
    /// Without a preceding [`begin_stroke`] this starts a stroke at the
    /// target point, matching how a pad treats a stray pointer move.
    ///
    /// [`begin_stroke`]: SignaturePad::begin_stroke
    pub fn line_to(&mut self, x: f32, y: f32) {
        let (from_x, from_y) = self.cursor.unwrap_or((x, y));
        let dx = x - from_x;
        let dy = y - from_y;
        let distance = (dx * dx + dy * dy).sqrt();
        let steps = (distance / SEGMENT_STEP).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            self.stamp(from_x + dx * t, from_y + dy * t);
        }
        self.cursor = Some((x, y));
    }

    /// Lift the pen; the next [`line_to`] starts a fresh stroke.
    ///
    /// [`line_to`]: SignaturePad::line_to
    pub fn end_stroke(&mut self) {
        self.cursor = None;
    }

    /// Export the drawn strokes as a PNG trimmed to the inked bounding box.
    pub fn export_png(&self) -> Result<Vec<u8>, PadError> {
        if self.is_empty() {
            return Err(PadError::EmptySignature);
        }
        let (min_x, min_y, max_x, max_y) = self
            .ink_bounds()
            .expect("a non-empty pad always has inked pixels");

        let left = min_x.saturating_sub(TRIM_PADDING);
        let top = min_y.saturating_sub(TRIM_PADDING);
        let right = (max_x + TRIM_PADDING).min(self.canvas.width() - 1);
        let bottom = (max_y + TRIM_PADDING).min(self.canvas.height() - 1);

        let trimmed = image::imageops::crop_imm(
            &self.canvas,
            left,
            top,
            right - left + 1,
            bottom - top + 1,
        )
        .to_image();

        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(trimmed)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| PadError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Paint a round pen dab centered on `(x, y)`, clamped into the canvas.
    fn stamp(&mut self, x: f32, y: f32) {
        let (width, height) = self.canvas.dimensions();
        let cx = x.clamp(0.0, (width - 1) as f32);
        let cy = y.clamp(0.0, (height - 1) as f32);

        let x0 = (cx - PEN_RADIUS).floor().max(0.0) as u32;
        let y0 = (cy - PEN_RADIUS).floor().max(0.0) as u32;
        let x1 = ((cx + PEN_RADIUS).ceil().max(0.0) as u32).min(width - 1);
        let y1 = ((cy + PEN_RADIUS).ceil().max(0.0) as u32).min(height - 1);

        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f32 - cx;
                let dy = py as f32 - cy;
                if dx * dx + dy * dy <= PEN_RADIUS * PEN_RADIUS {
                    self.canvas.put_pixel(px, py, INK);
                }
            }
        }
        self.inked = true;
    }

    /// Bounding box of all inked pixels, inclusive.
    fn ink_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in self.canvas.enumerate_pixels() {
            if pixel[3] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
        bounds
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn points() -> impl Strategy<Value = Vec<(f32, f32)>> {
        prop::collection::vec((0.0f32..400.0, 0.0f32..200.0), 1..40)
    }

    proptest! {
        /// Any drawn stroke sequence exports a decodable PNG no larger
        /// than the canvas.
        #[test]
        fn drawn_pads_export_valid_pngs(pts in points()) {
            let mut pad = SignaturePad::new(400, 200);
            let mut iter = pts.into_iter();
            let (x, y) = iter.next().unwrap();
            pad.begin_stroke(x, y);
            for (x, y) in iter {
                pad.line_to(x, y);
            }

            prop_assert!(!pad.is_empty());
            let png = pad.export_png().unwrap();
            let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
            prop_assert!(decoded.width() <= 400);
            prop_assert!(decoded.height() <= 200);
        }

        /// Clearing always returns the pad to the empty state.
        #[test]
        fn clear_always_empties(pts in points()) {
            let mut pad = SignaturePad::new(400, 200);
            for (x, y) in pts {
                pad.line_to(x, y);
            }
            pad.clear();
            prop_assert!(pad.is_empty());
            prop_assert!(matches!(pad.export_png(), Err(PadError::EmptySignature)));
        }
    }
}
