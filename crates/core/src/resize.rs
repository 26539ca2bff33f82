//! Pure-Rust thumbnailing: bilinear resampling and entropy-based smart crop.

use tracing::debug;

use crate::error::{Result, UpscaleError};
use crate::raster::RasterImage;

/// Resize an image to exactly `(target_w, target_h)` when `crop` is set, or
/// to fit within that box while preserving aspect ratio otherwise.
///
/// With `crop`, the image is cover-scaled and then reduced to the target
/// dimensions by repeatedly discarding the lower-entropy edge slice, so the
/// crop window settles on the most detailed region.
pub fn smart_resize(
    img: &RasterImage,
    target_w: u32,
    target_h: u32,
    crop: bool,
) -> Result<RasterImage> {
    if target_w == 0 || target_h == 0 {
        return Err(UpscaleError::Resize {
            reason: format!("invalid target dimensions {target_w}x{target_h}"),
        });
    }

    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(UpscaleError::Resize {
            reason: "source image has zero area".to_string(),
        });
    }

    let wx = target_w as f64 / src_w as f64;
    let hx = target_h as f64 / src_h as f64;

    if crop {
        // Cover: scale so both axes reach the target, then crop the excess.
        let factor = wx.max(hx);
        let scaled_w = ((src_w as f64 * factor).ceil() as u32).max(target_w);
        let scaled_h = ((src_h as f64 * factor).ceil() as u32).max(target_h);
        let scaled = resample(img, scaled_w, scaled_h)?;
        entropy_crop(&scaled, target_w, target_h)
    } else {
        // Fit: preserve aspect ratio inside the target box.
        let factor = wx.min(hx);
        let scaled_w = ((src_w as f64 * factor).round() as u32).max(1);
        let scaled_h = ((src_h as f64 * factor).round() as u32).max(1);
        resample(img, scaled_w, scaled_h)
    }
}

fn resample(img: &RasterImage, dst_w: u32, dst_h: u32) -> Result<RasterImage> {
    if img.dimensions() == (dst_w, dst_h) {
        return Ok(img.clone());
    }

    debug!(
        from = format!("{}x{}", img.width(), img.height()),
        to = format!("{dst_w}x{dst_h}"),
        "bilinear resample"
    );
    let data = resize_bilinear(
        img.data(),
        img.width() as usize,
        img.height() as usize,
        img.channels() as usize,
        dst_w as usize,
        dst_h as usize,
    );
    RasterImage::from_parts(dst_w, dst_h, img.channels(), img.colorspace(), data)
}

/// Bilinear interpolation resize for interleaved 8-bit data.
pub(crate) fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    channels: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_w * dst_h * channels];

    for dst_y in 0..dst_h {
        // Map destination pixel center to source coordinates
        let src_yf = (dst_y as f64 + 0.5) * src_h as f64 / dst_h as f64 - 0.5;
        let src_y0 = src_yf.floor().max(0.0) as usize;
        let src_y1 = (src_y0 + 1).min(src_h - 1);
        let fy = (src_yf - src_y0 as f64).clamp(0.0, 1.0);

        for dst_x in 0..dst_w {
            let src_xf = (dst_x as f64 + 0.5) * src_w as f64 / dst_w as f64 - 0.5;
            let src_x0 = src_xf.floor().max(0.0) as usize;
            let src_x1 = (src_x0 + 1).min(src_w - 1);
            let fx = (src_xf - src_x0 as f64).clamp(0.0, 1.0);

            let di = (dst_y * dst_w + dst_x) * channels;

            for c in 0..channels {
                let p00 = src[(src_y0 * src_w + src_x0) * channels + c] as f64;
                let p10 = src[(src_y0 * src_w + src_x1) * channels + c] as f64;
                let p01 = src[(src_y1 * src_w + src_x0) * channels + c] as f64;
                let p11 = src[(src_y1 * src_w + src_x1) * channels + c] as f64;

                let top = p00 * (1.0 - fx) + p10 * fx;
                let bot = p01 * (1.0 - fx) + p11 * fx;
                let val = top * (1.0 - fy) + bot * fy;

                dst[di + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

/// Crop to `(target_w, target_h)` by shaving the less interesting edge.
///
/// Interest is Shannon entropy of the luminance histogram, the selection
/// rule behind libvips' entropy smartcrop: the crop window shrinks toward
/// the target size one edge slice at a time, always keeping the side whose
/// discarded slice would have carried more information.
fn entropy_crop(img: &RasterImage, target_w: u32, target_h: u32) -> Result<RasterImage> {
    let (src_w, src_h) = img.dimensions();
    if target_w > src_w || target_h > src_h {
        return Err(UpscaleError::Resize {
            reason: format!(
                "crop target {target_w}x{target_h} exceeds source {src_w}x{src_h}"
            ),
        });
    }

    let mut x0 = 0u32;
    let mut x1 = src_w;
    let mut y0 = 0u32;
    let mut y1 = src_h;

    while x1 - x0 > target_w {
        let excess = (x1 - x0) - target_w;
        let step = excess.min(((x1 - x0) / 16).max(1));
        let left = window_entropy(img, x0, y0, step, y1 - y0);
        let right = window_entropy(img, x1 - step, y0, step, y1 - y0);
        if left < right {
            x0 += step;
        } else {
            x1 -= step;
        }
    }

    while y1 - y0 > target_h {
        let excess = (y1 - y0) - target_h;
        let step = excess.min(((y1 - y0) / 16).max(1));
        let top = window_entropy(img, x0, y0, x1 - x0, step);
        let bottom = window_entropy(img, x0, y1 - step, x1 - x0, step);
        if top < bottom {
            y0 += step;
        } else {
            y1 -= step;
        }
    }

    crop(img, x0, y0, target_w, target_h)
}

/// Shannon entropy of the luminance histogram over a pixel window.
fn window_entropy(img: &RasterImage, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let channels = img.channels() as usize;
    let stride = img.width() as usize * channels;
    let data = img.data();

    let mut histogram = [0u64; 256];
    for row in y..y + h {
        let base = row as usize * stride + x as usize * channels;
        for col in 0..w as usize {
            let px = &data[base + col * channels..base + col * channels + channels];
            let luma = match channels {
                1 | 2 => px[0] as u32,
                // Rec. 601 integer luma
                _ => (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000,
            };
            histogram[luma as usize] += 1;
        }
    }

    let total = (w as u64 * h as u64) as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    entropy
}

fn crop(img: &RasterImage, x: u32, y: u32, w: u32, h: u32) -> Result<RasterImage> {
    let channels = img.channels() as usize;
    let stride = img.width() as usize * channels;
    let row_bytes = w as usize * channels;

    let mut out = Vec::with_capacity(row_bytes * h as usize);
    for row in y..y + h {
        let start = row as usize * stride + x as usize * channels;
        out.extend_from_slice(&img.data()[start..start + row_bytes]);
    }
    RasterImage::from_parts(w, h, img.channels(), img.colorspace(), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Colorspace;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RasterImage {
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        for _ in 0..w * h {
            data.extend_from_slice(&rgb);
        }
        RasterImage::from_parts(w, h, 3, Colorspace::Srgb, data).unwrap()
    }

    /// Deterministic pseudo-noise so entropy comparisons have a clear winner.
    fn noise_byte(x: u32, y: u32, c: u32) -> u8 {
        (x.wrapping_mul(31)
            .wrapping_add(y.wrapping_mul(17))
            .wrapping_add(c.wrapping_mul(7))
            .wrapping_mul(2654435761)
            >> 24) as u8
    }

    #[test]
    fn fit_resize_preserves_aspect_ratio() {
        let img = solid(8, 4, [10, 20, 30]);
        let out = smart_resize(&img, 4, 4, false).unwrap();
        // Fit inside 4x4: the 2:1 image becomes 4x2.
        assert_eq!(out.dimensions(), (4, 2));
    }

    #[test]
    fn crop_resize_hits_exact_dimensions() {
        let img = solid(512, 512, [90, 90, 90]);
        let out = smart_resize(&img, 256, 256, true).unwrap();
        assert_eq!(out.dimensions(), (256, 256));
    }

    #[test]
    fn crop_resize_non_square_target() {
        let img = solid(100, 60, [1, 2, 3]);
        let out = smart_resize(&img, 30, 50, true).unwrap();
        assert_eq!(out.dimensions(), (30, 50));
    }

    #[test]
    fn identity_resample_returns_equal_pixels() {
        let img = solid(5, 7, [200, 100, 50]);
        let out = smart_resize(&img, 5, 7, false).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn bilinear_solid_color_is_invariant() {
        let img = solid(4, 4, [200, 100, 50]);
        let data = resize_bilinear(img.data(), 4, 4, 3, 8, 8);
        for px in data.chunks_exact(3) {
            assert_eq!(px, &[200, 100, 50]);
        }
    }

    #[test]
    fn zero_target_is_a_resize_error() {
        let img = solid(4, 4, [0, 0, 0]);
        let err = smart_resize(&img, 0, 4, true).unwrap_err();
        assert!(matches!(err, UpscaleError::Resize { .. }));
    }

    #[test]
    fn entropy_crop_prefers_detailed_region() {
        // Left half flat gray, right half noise: the crop should keep the
        // noisy (higher-entropy) half.
        let (w, h) = (64u32, 16u32);
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                if x < w / 2 {
                    data.extend_from_slice(&[128, 128, 128]);
                } else {
                    data.extend_from_slice(&[
                        noise_byte(x, y, 0),
                        noise_byte(x, y, 1),
                        noise_byte(x, y, 2),
                    ]);
                }
            }
        }
        let img = RasterImage::from_parts(w, h, 3, Colorspace::Srgb, data).unwrap();

        let cropped = entropy_crop(&img, 16, 16).unwrap();
        assert_eq!(cropped.dimensions(), (16, 16));

        // Any crop touching the flat half would contain whole flat columns
        // (16 pixels each); a crop from the noisy half has none.
        let flat_pixels = cropped
            .data()
            .chunks_exact(3)
            .filter(|px| px == &[128, 128, 128])
            .count();
        assert!(flat_pixels < 16, "crop kept {flat_pixels} flat pixels");
    }

    #[test]
    fn crop_extracts_expected_window() {
        // 4x2 image with distinct per-pixel red values.
        let mut data = Vec::new();
        for y in 0..2u32 {
            for x in 0..4u32 {
                data.extend_from_slice(&[(y * 4 + x) as u8, 0, 0]);
            }
        }
        let img = RasterImage::from_parts(4, 2, 3, Colorspace::Srgb, data).unwrap();

        let window = crop(&img, 1, 1, 2, 1).unwrap();
        assert_eq!(window.dimensions(), (2, 1));
        assert_eq!(window.data(), &[5, 0, 0, 6, 0, 0]);
    }
}
