//! Ken Burns motion sampler.
//!
//! Turns a still image plus an [`ImageMotion`] into a canvas-sized frame
//! for any timestamp in a clip. Sampling is a pure function of its inputs,
//! so frames can be produced in any order or in parallel.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::scene::ImageMotion;

/// Smallest zoom used for crop computation.
pub const MIN_ZOOM: f64 = 1e-3;

/// Resampling filter for both the per-clip scale and the per-frame resize.
const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// A crop rectangle in scaled-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Animation progress in `[0, 1]`.
///
/// A non-positive (or NaN) total duration yields `1.0`, i.e. the end state.
pub fn animation_progress(elapsed_secs: f64, total_secs: f64) -> f64 {
    if !(total_secs > 0.0) {
        return 1.0;
    }
    let alpha = elapsed_secs / total_secs;
    if alpha.is_nan() {
        return 0.0;
    }
    alpha.clamp(0.0, 1.0)
}

/// Map a normalized pan in `[-1, 1]` onto `[0, pan_range]` pixels.
pub fn pan_offset(pan: f64, pan_range: f64) -> f64 {
    (pan + 1.0) / 2.0 * pan_range
}

/// Compute the crop window for animation progress `alpha`.
///
/// `scaled_width`/`scaled_height` are the dimensions of the still after it
/// was scaled to the canvas height.
pub fn crop_window(
    scaled_width: u32,
    scaled_height: u32,
    canvas_width: u32,
    alpha: f64,
    motion: &ImageMotion,
) -> CropWindow {
    let scaled_width = scaled_width.max(1);
    let scaled_height = scaled_height.max(1);

    let zoom = motion.zoom_at(alpha).max(MIN_ZOOM);

    let (start_x, end_x) = if scaled_width > canvas_width {
        let pan_range = (scaled_width - canvas_width) as f64;
        (
            pan_offset(motion.pan_start, pan_range),
            pan_offset(motion.pan_end, pan_range),
        )
    } else {
        (0.0, 0.0)
    };
    let x = start_x + (end_x - start_x) * alpha;

    let crop_width = crop_extent(scaled_width, zoom);
    let crop_height = crop_extent(scaled_height, zoom);

    let max_x = scaled_width - crop_width;
    let x = if x.is_finite() && x > 0.0 {
        (x as u32).min(max_x)
    } else {
        0
    };
    let y = (scaled_height - crop_height) / 2;

    CropWindow {
        x,
        y,
        width: crop_width,
        height: crop_height,
    }
}

/// `extent / zoom`, truncated and kept within `[1, extent]`.
fn crop_extent(extent: u32, zoom: f64) -> u32 {
    let raw = extent as f64 / zoom;
    if raw.is_finite() {
        (raw as u32).clamp(1, extent)
    } else {
        extent
    }
}

/// Scale `still` so its height equals `height`, preserving aspect ratio.
pub fn scale_to_height(still: &DynamicImage, height: u32) -> StoryreelResult<RgbImage> {
    let (src_w, src_h) = (still.width(), still.height());
    if src_w == 0 || src_h == 0 {
        return Err(StoryreelError::render("Still image has zero size"));
    }
    if height == 0 {
        return Err(StoryreelError::render("Canvas height must be non-zero"));
    }

    let width = ((src_w as f64 * height as f64 / src_h as f64).round() as u32).max(1);
    let rgb = still.to_rgb8();
    if (width, height) == (src_w, src_h) {
        return Ok(rgb);
    }
    Ok(imageops::resize(&rgb, width, height, RESAMPLE_FILTER))
}

/// A still image prepared for Ken Burns sampling on a fixed canvas.
///
/// The height-fit scale happens once here; [`KenBurns::frame_at`] only
/// crops and resizes.
#[derive(Debug, Clone)]
pub struct KenBurns {
    scaled: RgbImage,
    canvas_width: u32,
    canvas_height: u32,
    motion: ImageMotion,
}

impl KenBurns {
    pub fn new(
        still: &DynamicImage,
        canvas_width: u32,
        canvas_height: u32,
        motion: ImageMotion,
    ) -> StoryreelResult<Self> {
        if canvas_width == 0 || canvas_height == 0 {
            return Err(StoryreelError::render(format!(
                "Canvas size must be non-zero (got {canvas_width}x{canvas_height})"
            )));
        }
        let scaled = scale_to_height(still, canvas_height)?;
        Ok(Self {
            scaled,
            canvas_width,
            canvas_height,
            motion,
        })
    }

    /// Dimensions of the height-fitted still.
    pub fn scaled_size(&self) -> (u32, u32) {
        self.scaled.dimensions()
    }

    pub fn motion(&self) -> &ImageMotion {
        &self.motion
    }

    /// Crop window at `elapsed_secs` into a clip of `total_secs`.
    pub fn crop_at(&self, elapsed_secs: f64, total_secs: f64) -> CropWindow {
        let (w, h) = self.scaled.dimensions();
        crop_window(
            w,
            h,
            self.canvas_width,
            animation_progress(elapsed_secs, total_secs),
            &self.motion,
        )
    }

    /// Sample a `canvas_width x canvas_height` frame.
    pub fn frame_at(&self, elapsed_secs: f64, total_secs: f64) -> RgbImage {
        let crop = self.crop_at(elapsed_secs, total_secs);
        let (w, h) = self.scaled.dimensions();

        if crop.width == w
            && crop.height == h
            && (w, h) == (self.canvas_width, self.canvas_height)
        {
            return self.scaled.clone();
        }

        let cropped =
            imageops::crop_imm(&self.scaled, crop.x, crop.y, crop.width, crop.height).to_image();
        imageops::resize(
            &cropped,
            self.canvas_width,
            self.canvas_height,
            RESAMPLE_FILTER,
        )
    }
}

/// One-shot frame sampling.
///
/// Equivalent to building a [`KenBurns`] and calling [`KenBurns::frame_at`];
/// prefer the struct when sampling many frames of the same clip.
pub fn sample_frame(
    still: &DynamicImage,
    canvas_width: u32,
    canvas_height: u32,
    elapsed_secs: f64,
    total_secs: f64,
    motion: &ImageMotion,
) -> StoryreelResult<RgbImage> {
    Ok(KenBurns::new(still, canvas_width, canvas_height, *motion)?.frame_at(elapsed_secs, total_secs))
}
