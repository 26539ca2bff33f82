//! Stateless codec between interleaved 8-bit rasters and planar NCHW
//! float32 tensors.

use ndarray::Array4;

use crate::error::{Result, UpscaleError};
use crate::raster::{Colorspace, RasterImage};

/// Convert an interleaved 3-channel raster into a `[1, 3, H, W]` tensor
/// normalized to `[0, 1]`.
pub fn encode(raster: &RasterImage) -> Result<Array4<f32>> {
    if raster.channels() != 3 {
        return Err(UpscaleError::Tensor {
            expected: "3-channel interleaved raster".to_string(),
            actual: format!("{} channels", raster.channels()),
        });
    }

    let h = raster.height() as usize;
    let w = raster.width() as usize;
    let hw = h * w;
    let data = raster.data();

    let mut nchw = Array4::<f32>::zeros((1, 3, h, w));
    let slice = nchw
        .as_slice_mut()
        .expect("freshly allocated Array4 is contiguous");

    for i in 0..hw {
        let src = i * 3;
        slice[i] = data[src] as f32 / 255.0;
        slice[hw + i] = data[src + 1] as f32 / 255.0;
        slice[2 * hw + i] = data[src + 2] as f32 / 255.0;
    }

    Ok(nchw)
}

/// Convert a `[1, 3, height, width]` tensor back to an interleaved sRGB
/// raster.
///
/// Model output is not guaranteed to lie in `[0, 1]`, so every sample is
/// clamped before quantization. Quantization rounds half to even
/// (`nearbyint` semantics), which golden-image comparisons rely on.
pub fn decode(tensor: &Array4<f32>, height: u32, width: u32) -> Result<RasterImage> {
    let h = height as usize;
    let w = width as usize;
    let expected_shape = [1, 3, h, w];
    if tensor.shape() != expected_shape {
        return Err(UpscaleError::Tensor {
            expected: format!("tensor of shape {expected_shape:?}"),
            actual: format!("shape {:?}", tensor.shape()),
        });
    }

    let owned_contig;
    let slice = if let Some(s) = tensor.as_slice() {
        s
    } else {
        owned_contig = tensor.as_standard_layout().into_owned();
        owned_contig.as_slice().unwrap()
    };

    let hw = h * w;
    let mut rgb = vec![0u8; hw * 3];
    for i in 0..hw {
        rgb[i * 3] = quantize(slice[i]);
        rgb[i * 3 + 1] = quantize(slice[hw + i]);
        rgb[i * 3 + 2] = quantize(slice[2 * hw + i]);
    }

    RasterImage::from_parts(width, height, 3, Colorspace::Srgb, rgb)
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round_ties_even() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_raster(w: u32, h: u32) -> RasterImage {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for i in 0..w * h * 3 {
            data.push((i * 7 % 256) as u8);
        }
        RasterImage::from_parts(w, h, 3, Colorspace::Srgb, data).unwrap()
    }

    #[test]
    fn encode_produces_planar_normalized_layout() {
        let raster = RasterImage::from_parts(
            2,
            1,
            3,
            Colorspace::Srgb,
            vec![255, 0, 51, 0, 255, 102],
        )
        .unwrap();
        let tensor = encode(&raster).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        // Channel planes are contiguous: R plane, then G, then B.
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 0, 0, 1]], 0.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert_eq!(tensor[[0, 1, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 51.0 / 255.0);
        assert_eq!(tensor[[0, 2, 0, 1]], 102.0 / 255.0);
    }

    #[test]
    fn encode_rejects_non_three_channel_input() {
        let raster =
            RasterImage::from_parts(1, 1, 4, Colorspace::Srgb, vec![0, 0, 0, 255]).unwrap();
        let err = encode(&raster).unwrap_err();
        assert!(matches!(err, UpscaleError::Tensor { .. }));
    }

    #[test]
    fn decode_rejects_shape_mismatch() {
        let tensor = Array4::<f32>::zeros((1, 3, 4, 4));
        let err = decode(&tensor, 8, 8).unwrap_err();
        assert!(matches!(err, UpscaleError::Tensor { .. }));
    }

    #[test]
    fn decode_clamps_out_of_range_samples() {
        let mut tensor = Array4::<f32>::zeros((1, 3, 1, 1));
        tensor[[0, 0, 0, 0]] = -0.5;
        tensor[[0, 1, 0, 0]] = 1.5;
        tensor[[0, 2, 0, 0]] = 0.5;

        let raster = decode(&tensor, 1, 1).unwrap();
        assert_eq!(raster.data(), &[0, 255, 128]);
    }

    #[test]
    fn round_trip_is_exact_for_eight_bit_sources() {
        let raster = gradient_raster(16, 9);
        let decoded = decode(&encode(&raster).unwrap(), 9, 16).unwrap();
        // v/255 * 255 rounds back to v for every 8-bit count.
        assert_eq!(decoded.data(), raster.data());
    }
}
