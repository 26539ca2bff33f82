//! Raster image type, container decoding, and pre-inference normalization.

use image::DynamicImage;

use crate::error::{Result, UpscaleError};

/// Color representation of a decoded raster buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Srgb,
    Gray,
}

/// Decoded raster image: interleaved 8-bit samples.
///
/// The buffer is always exactly `width * height * channels` bytes. Channel
/// counts in the wild: 1 (gray), 2 (gray+alpha), 3 (RGB), 4 (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    channels: u8,
    colorspace: Colorspace,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn from_parts(
        width: u32,
        height: u32,
        channels: u8,
        colorspace: Colorspace,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(UpscaleError::ColorNormalization {
                reason: format!(
                    "buffer length mismatch: expected {expected} ({width}x{height}x{channels}), got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            colorspace,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Convert back to an `image` crate value for re-encoding.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let buffer_err = || UpscaleError::ColorNormalization {
            reason: format!("cannot rebuild {w}x{h}x{} image buffer", self.channels),
        };
        match self.channels {
            1 => image::GrayImage::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(buffer_err),
            2 => image::GrayAlphaImage::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(buffer_err),
            3 => image::RgbImage::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(buffer_err),
            4 => image::RgbaImage::from_raw(w, h, self.data.clone())
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(buffer_err),
            other => Err(UpscaleError::ColorNormalization {
                reason: format!("unsupported channel count: {other}"),
            }),
        }
    }
}

/// Decode an encoded byte stream (PNG, JPEG, WebP, ...) into a raster image.
///
/// Native 8-bit layouts are kept as-is; higher bit depths and exotic layouts
/// are quantized to 8-bit RGBA.
pub fn decode_bytes(encoded: &[u8]) -> Result<RasterImage> {
    let decoded =
        image::load_from_memory(encoded).map_err(|source| UpscaleError::Decode { source })?;

    let (width, height) = (decoded.width(), decoded.height());
    let (channels, colorspace, data) = match decoded {
        DynamicImage::ImageLuma8(img) => (1, Colorspace::Gray, img.into_raw()),
        DynamicImage::ImageLumaA8(img) => (2, Colorspace::Gray, img.into_raw()),
        DynamicImage::ImageRgb8(img) => (3, Colorspace::Srgb, img.into_raw()),
        DynamicImage::ImageRgba8(img) => (4, Colorspace::Srgb, img.into_raw()),
        other => (4, Colorspace::Srgb, other.to_rgba8().into_raw()),
    };

    RasterImage::from_parts(width, height, channels, colorspace, data)
}

/// Convert a non-sRGB image to sRGB. Gray channels are replicated; an alpha
/// channel, if present, is carried over unchanged.
pub fn convert_to_srgb(img: RasterImage) -> Result<RasterImage> {
    if img.colorspace == Colorspace::Srgb {
        return Ok(img);
    }

    let (width, height) = img.dimensions();
    match img.channels {
        1 => {
            let mut rgb = Vec::with_capacity(img.data.len() * 3);
            for &v in &img.data {
                rgb.extend_from_slice(&[v, v, v]);
            }
            RasterImage::from_parts(width, height, 3, Colorspace::Srgb, rgb)
        }
        2 => {
            let mut rgba = Vec::with_capacity(img.data.len() * 2);
            for pair in img.data.chunks_exact(2) {
                rgba.extend_from_slice(&[pair[0], pair[0], pair[0], pair[1]]);
            }
            RasterImage::from_parts(width, height, 4, Colorspace::Srgb, rgba)
        }
        other => Err(UpscaleError::ColorNormalization {
            reason: format!("cannot convert {other}-channel gray image to sRGB"),
        }),
    }
}

/// Flatten a 4-channel image against a black background, dropping alpha.
pub fn flatten_alpha(img: RasterImage) -> Result<RasterImage> {
    if img.channels != 4 {
        return Err(UpscaleError::ColorNormalization {
            reason: format!("flatten requires 4 channels, got {}", img.channels),
        });
    }

    let (width, height) = img.dimensions();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in img.data.chunks_exact(4) {
        let a = px[3] as u16;
        rgb.push(((px[0] as u16 * a + 127) / 255) as u8);
        rgb.push(((px[1] as u16 * a + 127) / 255) as u8);
        rgb.push(((px[2] as u16 * a + 127) / 255) as u8);
    }
    RasterImage::from_parts(width, height, 3, img.colorspace, rgb)
}

/// Normalize an image into the exact form the tensor codec requires:
/// 3-channel, non-premultiplied sRGB.
///
/// Both steps must succeed or the whole upscale call fails.
pub fn normalize_for_inference(img: RasterImage) -> Result<RasterImage> {
    let img = convert_to_srgb(img)?;
    let img = if img.channels == 4 {
        flatten_alpha(img)?
    } else {
        img
    };

    if img.channels != 3 {
        return Err(UpscaleError::ColorNormalization {
            reason: format!("expected 3 channels after normalization, got {}", img.channels),
        });
    }
    Ok(img)
}
