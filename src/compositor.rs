//! Per-frame 9:16 compositing.
//!
//! A frame becomes two layers drawn onto a fixed canvas:
//!
//! 1. background: height-fit, center-cropped to the canvas, Gaussian blurred
//! 2. foreground: scaled to the band height, center-cropped, written over a vertically centered
//!    band of the background
//!
//! The foreground band is an opaque overwrite. No alpha blending happens anywhere; the band's
//! pixels replace the blurred background's pixels outright.
//!
//! [`composite_frame`] is pure: it performs no I/O and never mutates its input.

use image::{ImageBuffer, Rgb, RgbImage, imageops};

use crate::blur_cpu::blur_rgb8;
use crate::foundation::error::{VerticutError, VerticutResult};
use crate::frame::{CHANNELS, Frame, frame_len};
use crate::geometry::{LayerLayout, LayerPlacement, TargetGeometry};

/// Resampling filter for both layers (bilinear).
const RESIZE_FILTER: imageops::FilterType = imageops::FilterType::Triangle;

/// Composite one source frame onto a `geometry.width x geometry.height` canvas.
#[tracing::instrument(level = "trace", skip_all, fields(w = frame.width, h = frame.height))]
pub fn composite_frame(frame: &Frame, geometry: &TargetGeometry) -> VerticutResult<Frame> {
    let layout = geometry.layout(frame.width, frame.height)?;
    composite_with_layout(frame, &layout, geometry)
}

/// Composite using a layout already computed for this frame's size.
///
/// The pipeline computes the layout once per run since every decoded frame has the same size.
pub fn composite_with_layout(
    frame: &Frame,
    layout: &LayerLayout,
    geometry: &TargetGeometry,
) -> VerticutResult<Frame> {
    if frame.data.len() != frame_len(frame.width, frame.height)? {
        return Err(VerticutError::geometry(format!(
            "frame buffer has {} bytes, expected {}x{}x3",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }
    let src = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(frame.width, frame.height, &frame.data[..])
        .ok_or_else(|| VerticutError::geometry("frame buffer does not match its dimensions"))?;

    let background = render_layer(&src, &layout.background)?;
    let canvas = layout.canvas;
    let mut out = blur_rgb8(
        background.as_raw(),
        canvas.width,
        canvas.height,
        geometry.blur_kernel,
        geometry.blur_sigma(),
    )?;

    let foreground = render_layer(&src, &layout.foreground)?;
    overwrite_band(&mut out, canvas.width, &foreground, &layout.foreground);

    Frame::new(canvas.width, canvas.height, out)
}

fn render_layer(
    src: &ImageBuffer<Rgb<u8>, &[u8]>,
    placement: &LayerPlacement,
) -> VerticutResult<RgbImage> {
    let scaled = if placement.scaled.width == src.width()
        && placement.scaled.height == src.height()
    {
        RgbImage::from_raw(src.width(), src.height(), src.as_raw().to_vec())
            .ok_or_else(|| VerticutError::geometry("layer buffer does not match its dimensions"))?
    } else {
        imageops::resize(
            src,
            placement.scaled.width,
            placement.scaled.height,
            RESIZE_FILTER,
        )
    };

    if placement.crop_x == 0
        && placement.crop_y == 0
        && placement.visible.width == scaled.width()
        && placement.visible.height == scaled.height()
    {
        return Ok(scaled);
    }
    if placement.crop_x + placement.visible.width > scaled.width()
        || placement.crop_y + placement.visible.height > scaled.height()
    {
        return Err(VerticutError::geometry(
            "crop region falls outside the scaled layer",
        ));
    }
    Ok(imageops::crop_imm(
        &scaled,
        placement.crop_x,
        placement.crop_y,
        placement.visible.width,
        placement.visible.height,
    )
    .to_image())
}

fn overwrite_band(dst: &mut [u8], canvas_width: u32, layer: &RgbImage, placement: &LayerPlacement) {
    let dst_stride = canvas_width as usize * CHANNELS;
    let row_len = layer.width() as usize * CHANNELS;
    let x_off = placement.dest_x as usize * CHANNELS;
    for (row, src_row) in layer.as_raw().chunks_exact(row_len).enumerate() {
        let start = (placement.dest_y as usize + row) * dst_stride + x_off;
        dst[start..start + row_len].copy_from_slice(src_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_geometry() -> TargetGeometry {
        TargetGeometry {
            width: 18,
            blur_kernel: 3,
            ..TargetGeometry::default()
        }
    }

    #[test]
    fn output_has_canvas_dimensions() {
        let g = small_geometry();
        let src = Frame::filled(64, 36, [40, 80, 120]).unwrap();
        let out = composite_frame(&src, &g).unwrap();
        assert_eq!((out.width, out.height), (18, 32));
        assert_eq!(out.data.len(), 18 * 32 * 3);
    }

    #[test]
    fn uniform_source_composites_to_uniform_canvas() {
        let g = small_geometry();
        let src = Frame::filled(64, 36, [40, 80, 120]).unwrap();
        let out = composite_frame(&src, &g).unwrap();
        assert!(out.data.chunks_exact(3).all(|px| px == [40, 80, 120]));
    }

    #[test]
    fn input_is_left_untouched() {
        let g = small_geometry();
        let src = Frame::filled(64, 36, [1, 2, 3]).unwrap();
        let before = src.clone();
        let _ = composite_frame(&src, &g).unwrap();
        assert_eq!(src, before);
    }

    #[test]
    fn band_rows_are_sharp_and_margins_are_blurred() {
        // Bright vertical stripe in the middle column: the band keeps a hard edge, the blurred
        // margins do not.
        let g = TargetGeometry {
            width: 36,
            blur_kernel: 21,
            ..TargetGeometry::default()
        };
        let (w, h) = (96u32, 54u32);
        let mut data = vec![0u8; (w * h * 3) as usize];
        for y in 0..h {
            for x in 44..52 {
                let i = ((y * w + x) * 3) as usize;
                data[i..i + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let src = Frame::new(w, h, data).unwrap();
        let layout = g.layout(w, h).unwrap();
        let out = composite_frame(&src, &g).unwrap();

        let band_row = layout.top_margin() + layout.foreground.visible.height / 2;
        let band_max = (0..out.width).map(|x| out.pixel(x, band_row)[0]).max();
        assert_eq!(band_max, Some(255));

        let margin_max = (0..out.width).map(|x| out.pixel(x, 0)[0]).max();
        assert!(margin_max.unwrap_or(0) < 255);
    }

    #[test]
    fn too_narrow_source_fails_with_geometry_error() {
        let g = small_geometry();
        let src = Frame::filled(4, 64, [0, 0, 0]).unwrap();
        let err = composite_frame(&src, &g).unwrap_err();
        assert!(matches!(err, VerticutError::FrameGeometry(_)));
    }

    #[test]
    fn corrupt_buffer_fails_with_geometry_error() {
        let g = small_geometry();
        let src = Frame {
            width: 64,
            height: 36,
            data: vec![0u8; 10],
        };
        assert!(matches!(
            composite_frame(&src, &g),
            Err(VerticutError::FrameGeometry(_))
        ));
    }
}
