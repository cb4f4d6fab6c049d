//! Target canvas geometry and per-source layer layout.
//!
//! All layout arithmetic is integer: scaled sizes are `src * target / src_other` truncated, and
//! centering offsets use integer division, so results are exact across platforms.

use serde::{Deserialize, Serialize};

use crate::foundation::core::Canvas;
use crate::foundation::error::{VerticutError, VerticutResult};

/// Largest scaled layer width accepted before the layout is rejected.
///
/// Bounds the intermediate resize buffer for extremely wide sources.
pub const MAX_SCALED_DIMENSION: u32 = 16_384;

/// Output aspect ratio as `width:height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const VERTICAL_9_16: Self = Self {
        width: 9,
        height: 16,
    };
}

/// Fixed output geometry of the vertical reframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGeometry {
    /// Output width in pixels.
    pub width: u32,
    /// Output aspect ratio; height is derived from `width`.
    pub aspect: AspectRatio,
    /// Background height as a multiple of the canvas height (1.0 = fit by height).
    pub background_scale: f64,
    /// Nominal foreground zoom. Reported in the layout log, not applied to pixels.
    pub foreground_zoom: f64,
    /// Foreground band height as a fraction of the canvas height.
    pub foreground_coverage: f64,
    /// Gaussian kernel size (odd) for the background blur.
    pub blur_kernel: u32,
}

impl Default for TargetGeometry {
    fn default() -> Self {
        Self {
            width: 1080,
            aspect: AspectRatio::VERTICAL_9_16,
            background_scale: 1.0,
            foreground_zoom: 1.35,
            foreground_coverage: 0.6,
            blur_kernel: 21,
        }
    }
}

impl TargetGeometry {
    /// Canvas height derived from `width` and `aspect`.
    pub fn height(&self) -> u32 {
        if self.aspect.width == 0 {
            return 0;
        }
        (u64::from(self.width) * u64::from(self.aspect.height) / u64::from(self.aspect.width))
            as u32
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height(),
        }
    }

    /// Height of the foreground band, `floor(height * coverage)`.
    pub fn foreground_height(&self) -> u32 {
        fraction_of(self.height(), self.foreground_coverage)
    }

    /// Height the background is scaled to before cropping.
    pub fn background_height(&self) -> u32 {
        fraction_of(self.height(), self.background_scale)
    }

    /// Gaussian sigma derived from the kernel size, `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }

    pub fn validate(&self) -> VerticutResult<()> {
        if self.width == 0 || self.aspect.width == 0 || self.aspect.height == 0 {
            return Err(VerticutError::validation(
                "target width and aspect ratio must be non-zero",
            ));
        }
        let height = self.height();
        if !self.width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(VerticutError::validation(format!(
                "target dimensions must be even (got {}x{height})",
                self.width
            )));
        }
        if !self.background_scale.is_finite() || self.background_scale < 1.0 {
            return Err(VerticutError::validation(
                "background_scale must be >= 1.0 so the background covers the canvas",
            ));
        }
        if !self.foreground_coverage.is_finite()
            || self.foreground_coverage <= 0.0
            || self.foreground_coverage > 1.0
        {
            return Err(VerticutError::validation(
                "foreground_coverage must be in (0, 1]",
            ));
        }
        if self.foreground_height() == 0 {
            return Err(VerticutError::validation("foreground band height is zero"));
        }
        if !self.foreground_zoom.is_finite() || self.foreground_zoom <= 0.0 {
            return Err(VerticutError::validation("foreground_zoom must be > 0"));
        }
        if self.blur_kernel == 0 || self.blur_kernel.is_multiple_of(2) {
            return Err(VerticutError::validation(format!(
                "blur_kernel must be odd (got {})",
                self.blur_kernel
            )));
        }
        Ok(())
    }

    /// Compute where each layer is sampled from and where it lands for a source size.
    pub fn layout(&self, source_width: u32, source_height: u32) -> VerticutResult<LayerLayout> {
        if source_width == 0 || source_height == 0 {
            return Err(VerticutError::geometry(format!(
                "source dimensions must be non-zero (got {source_width}x{source_height})"
            )));
        }
        let canvas = self.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(VerticutError::geometry("target canvas is empty"));
        }

        let bg_h = self.background_height();
        let bg_w = scaled_width(source_width, source_height, bg_h)?;
        if bg_w < canvas.width || bg_h < canvas.height {
            return Err(VerticutError::geometry(format!(
                "background scaled to {bg_w}x{bg_h} cannot cover the {}x{} canvas \
                 (source {source_width}x{source_height} is too narrow)",
                canvas.width, canvas.height
            )));
        }
        let background = LayerPlacement {
            scaled: Canvas {
                width: bg_w,
                height: bg_h,
            },
            crop_x: (bg_w - canvas.width) / 2,
            crop_y: (bg_h - canvas.height) / 2,
            visible: canvas,
            dest_x: 0,
            dest_y: 0,
        };

        let fg_h = self.foreground_height();
        if fg_h == 0 || fg_h > canvas.height {
            return Err(VerticutError::geometry(format!(
                "foreground band height {fg_h} does not fit the canvas height {}",
                canvas.height
            )));
        }
        let fg_w = scaled_width(source_width, source_height, fg_h)?;
        let top_margin = (canvas.height - fg_h) / 2;
        let foreground = if fg_w >= canvas.width {
            LayerPlacement {
                scaled: Canvas {
                    width: fg_w,
                    height: fg_h,
                },
                crop_x: (fg_w - canvas.width) / 2,
                crop_y: 0,
                visible: Canvas {
                    width: canvas.width,
                    height: fg_h,
                },
                dest_x: 0,
                dest_y: top_margin,
            }
        } else {
            // Narrower than the canvas: keep the whole layer and center it horizontally.
            LayerPlacement {
                scaled: Canvas {
                    width: fg_w,
                    height: fg_h,
                },
                crop_x: 0,
                crop_y: 0,
                visible: Canvas {
                    width: fg_w,
                    height: fg_h,
                },
                dest_x: (canvas.width - fg_w) / 2,
                dest_y: top_margin,
            }
        };

        let layout = LayerLayout {
            canvas,
            background,
            foreground,
        };
        layout.check_bounds()?;
        Ok(layout)
    }
}

/// Where one layer is sampled from (in its scaled space) and where it lands on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerPlacement {
    /// Size the source frame is resized to.
    pub scaled: Canvas,
    /// Crop origin inside the scaled layer.
    pub crop_x: u32,
    pub crop_y: u32,
    /// Size of the cropped region that is drawn.
    pub visible: Canvas,
    /// Destination origin on the canvas.
    pub dest_x: u32,
    pub dest_y: u32,
}

impl LayerPlacement {
    fn check_within(&self, canvas: Canvas, name: &str) -> VerticutResult<()> {
        let crop_right = u64::from(self.crop_x) + u64::from(self.visible.width);
        let crop_bottom = u64::from(self.crop_y) + u64::from(self.visible.height);
        if crop_right > u64::from(self.scaled.width) || crop_bottom > u64::from(self.scaled.height)
        {
            return Err(VerticutError::geometry(format!(
                "{name} crop {}x{}+{}+{} falls outside the scaled {}x{} layer",
                self.visible.width,
                self.visible.height,
                self.crop_x,
                self.crop_y,
                self.scaled.width,
                self.scaled.height
            )));
        }
        let dest_right = u64::from(self.dest_x) + u64::from(self.visible.width);
        let dest_bottom = u64::from(self.dest_y) + u64::from(self.visible.height);
        if dest_right > u64::from(canvas.width) || dest_bottom > u64::from(canvas.height) {
            return Err(VerticutError::geometry(format!(
                "{name} placement at +{}+{} overflows the {}x{} canvas",
                self.dest_x, self.dest_y, canvas.width, canvas.height
            )));
        }
        Ok(())
    }
}

/// Resolved layout of both layers for one source size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerLayout {
    pub canvas: Canvas,
    pub background: LayerPlacement,
    pub foreground: LayerPlacement,
}

impl LayerLayout {
    /// Rows of blurred background above the foreground band.
    pub fn top_margin(&self) -> u32 {
        self.foreground.dest_y
    }

    /// Rows of blurred background below the foreground band.
    pub fn bottom_margin(&self) -> u32 {
        self.canvas.height - self.foreground.dest_y - self.foreground.visible.height
    }

    fn check_bounds(&self) -> VerticutResult<()> {
        self.background.check_within(self.canvas, "background")?;
        self.foreground.check_within(self.canvas, "foreground")
    }
}

fn scaled_width(source_width: u32, source_height: u32, target_height: u32) -> VerticutResult<u32> {
    let w = u64::from(source_width) * u64::from(target_height) / u64::from(source_height);
    if w == 0 {
        return Err(VerticutError::geometry(format!(
            "source {source_width}x{source_height} scales to zero width at height {target_height}"
        )));
    }
    if w > u64::from(MAX_SCALED_DIMENSION) {
        return Err(VerticutError::geometry(format!(
            "source {source_width}x{source_height} scales to width {w} at height \
             {target_height}, above the {MAX_SCALED_DIMENSION} limit"
        )));
    }
    Ok(w as u32)
}

fn fraction_of(len: u32, fraction: f64) -> u32 {
    if !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    // Nudge before flooring so 1920 * 0.6 lands on 1152.
    (f64::from(len) * fraction + 1e-9).floor() as u32
}
