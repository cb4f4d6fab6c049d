use crate::foundation::error::{VerticutError, VerticutResult};
use crate::frame::{CHANNELS, frame_len};

/// Separable Gaussian blur over tightly packed RGB8.
///
/// `kernel_size` is the full tap count (odd). Taps past an edge mirror back into the frame
/// without repeating the edge pixel (`dcb|abcd|cba`).
pub fn blur_rgb8(
    src: &[u8],
    width: u32,
    height: u32,
    kernel_size: u32,
    sigma: f32,
) -> VerticutResult<Vec<u8>> {
    let expected_len = frame_len(width, height)?;
    if src.len() != expected_len {
        return Err(VerticutError::validation(
            "blur_rgb8 expects src matching width*height*3",
        ));
    }
    if kernel_size.is_multiple_of(2) {
        return Err(VerticutError::validation("blur kernel size must be odd"));
    }
    let radius = kernel_size / 2;
    if radius == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    horizontal_pass(src, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> VerticutResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(VerticutError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(VerticutError::validation("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Fold the rounding residue into the center tap so the kernel sums to exactly 1.0.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = [0u64; CHANNELS];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = reflect_101(x + ki as i32 - radius, w);
                let idx = (row + sx as usize) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = (row + x as usize) * CHANNELS;
            for c in 0..CHANNELS {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; CHANNELS];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = reflect_101(y + ki as i32 - radius, h);
                let idx = ((sy * w + x) as usize) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * CHANNELS;
            for c in 0..CHANNELS {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn reflect_101(i: i32, n: i32) -> i32 {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    if i >= n { period - i } else { i }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}
