//! Image preparation: aspect-preserving resize to model-constrained
//! dimensions and RGB normalization to a channel-first tensor.

use crate::error::{OcrError, OcrResult};
use crate::pool::{get_f32, Pooled};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array4, ArrayBase, Dim, OwnedRepr};

/// Image normalization parameters.
#[derive(Debug, Clone)]
pub struct NormalizeParams {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self::paddle_det()
    }
}

impl NormalizeParams {
    /// Normalization parameters matching the PaddleOCR detection model.
    pub fn paddle_det() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Minimum/maximum side constraints a model imposes on its input.
#[derive(Debug, Clone, Copy)]
pub struct PrepConstraints {
    pub min_w: u32,
    pub min_h: u32,
    pub max_w: u32,
    pub max_h: u32,
}

/// Round `n` down to the nearest multiple of 32, never below `min`.
#[inline]
fn round_down_multiple_32(n: u32, min: u32) -> u32 {
    let rounded = (n / 32) * 32;
    rounded.max(min)
}

/// Compute the target (width, height) for detection input per §4.C:
/// scale down (never up) so the image fits `max_w x max_h`, then round
/// down to a multiple of 32, clamped to at least `min_w`/`min_h`.
pub fn compute_target_dims(w: u32, h: u32, constraints: &PrepConstraints) -> OcrResult<(u32, u32)> {
    if w < constraints.min_w || h < constraints.min_h {
        return Err(OcrError::InvalidInput(format!(
            "image {}x{} below minimum {}x{}",
            w, h, constraints.min_w, constraints.min_h
        )));
    }

    let scale = (constraints.max_w as f64 / w as f64)
        .min(constraints.max_h as f64 / h as f64)
        .min(1.0);

    let scaled_w = (w as f64 * scale).round().max(1.0) as u32;
    let scaled_h = (h as f64 * scale).round().max(1.0) as u32;

    let target_w = round_down_multiple_32(scaled_w, constraints.min_w);
    let target_h = round_down_multiple_32(scaled_h, constraints.min_h);

    Ok((target_w, target_h))
}

/// Resize `img` to the detection-model target dimensions computed from
/// `constraints`, using a Lanczos-style high-quality filter.
pub fn resize_for_detection(img: &DynamicImage, constraints: &PrepConstraints) -> OcrResult<DynamicImage> {
    let (w, h) = img.dimensions();
    let (target_w, target_h) = compute_target_dims(w, h, constraints)?;
    if target_w == w && target_h == h {
        return Ok(img.clone());
    }
    Ok(fast_resize(img, target_w, target_h))
}

/// Scale image to specified maximum side length, maintaining aspect ratio.
pub fn resize_to_max_side(img: &DynamicImage, max_side_len: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let max_dim = w.max(h);

    if max_dim <= max_side_len {
        return img.clone();
    }

    let scale = max_side_len as f64 / max_dim as f64;
    let new_w = (w as f64 * scale).round() as u32;
    let new_h = (h as f64 * scale).round() as u32;

    fast_resize(img, new_w, new_h)
}

fn fast_resize(img: &DynamicImage, new_w: u32, new_h: u32) -> DynamicImage {
    use fast_image_resize::{images::Image, IntoImageView, PixelType, Resizer};

    let pixel_type = img.pixel_type().unwrap_or(PixelType::U8x3);
    let mut dst_image = Image::new(new_w, new_h, pixel_type);

    let mut resizer = Resizer::new();
    resizer.resize(img, &mut dst_image, None).unwrap();

    match pixel_type {
        PixelType::U8x3 => {
            DynamicImage::ImageRgb8(RgbImage::from_raw(new_w, new_h, dst_image.into_vec()).unwrap())
        }
        PixelType::U8x4 => DynamicImage::ImageRgba8(
            image::RgbaImage::from_raw(new_w, new_h, dst_image.into_vec()).unwrap(),
        ),
        _ => DynamicImage::ImageRgb8(RgbImage::from_raw(new_w, new_h, dst_image.into_vec()).unwrap()),
    }
}

/// Normalize `img` (already resized to its final input dimensions) into a
/// channel-first `[1,3,H,W]` tensor; alpha is dropped, pixels divided by 255.
pub fn normalize_to_tensor(
    img: &DynamicImage,
    params: &NormalizeParams,
) -> ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>> {
    let (w, h) = img.dimensions();
    let mut input = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    let rgb_img = img.to_rgb8();

    for y in 0..h as usize {
        for x in 0..w as usize {
            let pixel = rgb_img.get_pixel(x as u32, y as u32);
            let [r, g, b] = pixel.0;
            input[[0, 0, y, x]] = (r as f32 / 255.0 - params.mean[0]) / params.std[0];
            input[[0, 1, y, x]] = (g as f32 / 255.0 - params.mean[1]) / params.std[1];
            input[[0, 2, y, x]] = (b as f32 / 255.0 - params.mean[2]) / params.std[2];
        }
    }

    input
}

/// Normalize into a caller-supplied buffer, in channel-first `[3,H,W]`
/// layout, only reallocating if `buf`'s capacity is below `3*W*H`.
pub fn normalize_into_buffer(img: &DynamicImage, params: &NormalizeParams, buf: &mut Vec<f32>) -> (u32, u32) {
    let (w, h) = img.dimensions();
    let needed = 3 * w as usize * h as usize;
    if buf.capacity() < needed {
        buf.reserve(needed - buf.capacity());
    }
    buf.clear();
    buf.resize(needed, 0.0);

    let rgb_img = img.to_rgb8();
    let plane = w as usize * h as usize;
    for y in 0..h as usize {
        for x in 0..w as usize {
            let pixel = rgb_img.get_pixel(x as u32, y as u32);
            let [r, g, b] = pixel.0;
            let idx = y * w as usize + x;
            buf[idx] = (r as f32 / 255.0 - params.mean[0]) / params.std[0];
            buf[plane + idx] = (g as f32 / 255.0 - params.mean[1]) / params.std[1];
            buf[2 * plane + idx] = (b as f32 / 255.0 - params.mean[2]) / params.std[2];
        }
    }

    (w, h)
}

/// Pooled variant of [`normalize_into_buffer`]: the backing storage comes
/// from the process-wide `f32` pool and is released when the returned
/// `Pooled` is dropped.
pub fn normalize_pooled(img: &DynamicImage, params: &NormalizeParams) -> (Pooled<f32>, u32, u32) {
    let (w, h) = img.dimensions();
    let mut buf = get_f32(3 * w as usize * h as usize);
    let rgb_img = img.to_rgb8();
    let plane = w as usize * h as usize;

    for y in 0..h as usize {
        for x in 0..w as usize {
            let pixel = rgb_img.get_pixel(x as u32, y as u32);
            let [r, g, b] = pixel.0;
            let idx = y * w as usize + x;
            buf[idx] = (r as f32 / 255.0 - params.mean[0]) / params.std[0];
            buf[plane + idx] = (g as f32 / 255.0 - params.mean[1]) / params.std[1];
            buf[2 * plane + idx] = (b as f32 / 255.0 - params.mean[2]) / params.std[2];
        }
    }

    (buf, w, h)
}
