use image::RgbImage;

use crate::foundation::error::{VerticutError, VerticutResult};

/// One decoded video frame: tightly packed RGB8, row-major, `width * height * 3` bytes.
///
/// Decode and encode both use ffmpeg's `rgb24`, so the channel order is consistent end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VerticutResult<Self> {
        let expected = frame_len(width, height)?;
        if data.len() != expected {
            return Err(VerticutError::validation(format!(
                "frame data has {} bytes, expected {expected} for {width}x{height} rgb24",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> VerticutResult<Self> {
        let len = frame_len(width, height)?;
        let data = rgb.repeat(len / CHANNELS);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn into_image(self) -> VerticutResult<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
            .ok_or_else(|| VerticutError::validation("frame buffer does not match its dimensions"))
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = self.offset(x, y);
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

/// Byte length of an rgb24 frame, rejecting zero-sized and overflowing dimensions.
pub fn frame_len(width: u32, height: u32) -> VerticutResult<usize> {
    if width == 0 || height == 0 {
        return Err(VerticutError::geometry(format!(
            "frame dimensions must be non-zero (got {width}x{height})"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| VerticutError::geometry("frame buffer size overflow"))
}
