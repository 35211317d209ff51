//! Screenshot slice planning and stitching
//!
//! The compositor refuses captures taller than a hardcoded texture limit
//! (16384 px), so tall captures are taken as consecutive vertical slices and
//! stitched back into one image. Planning and stitching are pure functions;
//! the tab performs the actual protocol calls between them.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};

use crate::error::{BrowserError, Result};

/// Capture encoding. Full-page captures are lossless; viewport-only captures
/// trade fidelity for size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Png,
    Jpeg { quality: u8 },
}

impl CaptureFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpeg",
        }
    }

    /// Fold format (and quality, for JPEG) into `Page.captureScreenshot`
    /// params.
    pub fn apply(&self, params: &mut Value) {
        params["format"] = json!(self.as_str());
        if let Self::Jpeg { quality } = self {
            params["quality"] = json!(quality);
        }
    }
}

/// A capture clip rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The `clip` parameter of `Page.captureScreenshot`, always at scale 1.
    pub fn to_params(&self) -> Value {
        json!({
            "x": self.x,
            "y": self.y,
            "width": self.width,
            "height": self.height,
            "scale": 1,
        })
    }
}

/// One captured slice: encoded image bytes plus the rect it was clipped to.
#[derive(Debug, Clone)]
pub struct ScreenshotTile {
    pub data: Vec<u8>,
    pub rect: ClipRect,
}

/// Partition a clip's vertical extent into consecutive slices no taller than
/// `max_height`, covering `[y, y + height)` in order.
pub fn plan_slices(clip: &ClipRect, max_height: u32) -> Vec<ClipRect> {
    let max_height = f64::from(max_height);
    let y_bottom = clip.y + clip.height;

    let mut slices = Vec::new();
    let mut y_pos = clip.y;
    while y_pos < y_bottom {
        let slice_height = (y_bottom - y_pos).min(max_height);
        slices.push(ClipRect::new(clip.x, y_pos, clip.width, slice_height));
        y_pos += max_height;
    }
    slices
}

/// Stack tiles vertically, first tile on top, onto a canvas of the union
/// width and summed height, and re-encode as PNG.
pub fn stitch(tiles: &[ScreenshotTile]) -> Result<Vec<u8>> {
    if tiles.is_empty() {
        return Err(BrowserError::Capture("no tiles to stitch".to_string()));
    }

    let images = tiles
        .iter()
        .map(|tile| Ok(image::load_from_memory(&tile.data)?.to_rgb8()))
        .collect::<Result<Vec<RgbImage>>>()?;

    let width = images.iter().map(RgbImage::width).max().unwrap_or(0);
    let height = images.iter().map(RgbImage::height).sum();

    let mut canvas = RgbImage::new(width, height);
    let mut y_offset = 0i64;
    for img in &images {
        image::imageops::replace(&mut canvas, img, 0, y_offset);
        y_offset += i64::from(img.height());
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn png_tile(width: u32, height: u32, color: Rgb<u8>) -> ScreenshotTile {
        let img = RgbImage::from_pixel(width, height, color);
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        ScreenshotTile {
            data,
            rect: ClipRect::new(0.0, 0.0, width as f64, height as f64),
        }
    }

    #[test]
    fn short_captures_need_a_single_slice() {
        let slices = plan_slices(&ClipRect::new(0.0, 0.0, 1280.0, 16384.0), 16384);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].height, 16384.0);
    }

    #[test]
    fn tall_captures_split_at_the_ceiling() {
        let slices = plan_slices(&ClipRect::new(0.0, 0.0, 1280.0, 20000.0), 16384);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].y, 0.0);
        assert_eq!(slices[0].height, 16384.0);
        assert_eq!(slices[1].y, 16384.0);
        assert_eq!(slices[1].height, 3616.0);
    }

    #[test]
    fn slices_respect_a_nonzero_origin() {
        let slices = plan_slices(&ClipRect::new(10.0, 100.0, 600.0, 40000.0), 16384);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].y, 100.0);
        assert_eq!(slices[1].y, 16484.0);
        assert_eq!(slices[2].y, 32868.0);
        assert_eq!(slices[2].height, 40000.0 - 2.0 * 16384.0);
        assert!(slices.iter().all(|s| s.x == 10.0 && s.width == 600.0));
    }

    #[test]
    fn stitching_stacks_tiles_in_order() {
        let red = png_tile(4, 3, Rgb([255, 0, 0]));
        let blue = png_tile(4, 2, Rgb([0, 0, 255]));

        let stitched = stitch(&[red, blue]).unwrap();
        let img = image::load_from_memory(&stitched).unwrap().to_rgb8();

        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 5);
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(3, 2), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(0, 3), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(3, 4), &Rgb([0, 0, 255]));
    }

    #[test]
    fn stitched_width_is_the_union_of_tile_widths() {
        let narrow = png_tile(4, 2, Rgb([10, 10, 10]));
        let wide = png_tile(6, 2, Rgb([20, 20, 20]));

        let stitched = stitch(&[narrow, wide]).unwrap();
        let img = image::load_from_memory(&stitched).unwrap().to_rgb8();

        assert_eq!(img.width(), 6);
        assert_eq!(img.height(), 4);
        // Area not covered by the narrow tile stays blank.
        assert_eq!(img.get_pixel(5, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(5, 2), &Rgb([20, 20, 20]));
    }

    #[test]
    fn jpeg_format_carries_quality_into_params() {
        let mut params = json!({ "clip": {} });
        CaptureFormat::Jpeg { quality: 95 }.apply(&mut params);
        assert_eq!(params["format"], "jpeg");
        assert_eq!(params["quality"], 95);

        let mut params = json!({});
        CaptureFormat::Png.apply(&mut params);
        assert_eq!(params["format"], "png");
        assert!(params.get("quality").is_none());
    }
}
