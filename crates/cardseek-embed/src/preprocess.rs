//! Image -> tensor preprocessing.
//!
//! The step order here is a numeric contract with the browser pipeline and
//! must not be permuted: decode, square-crop, bilinear resize, [0,1] scale,
//! per-channel mean/std normalize, NCHW layout with a batch axis of 1.

use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::{Array4, Axis, concatenate};

use crate::config::{CropMethod, PreprocessSettings};
use crate::errors::{EmbedError, Result};

/// Square-crop region for an image of the given dimensions.
///
/// Returns `(x, y, width, height)` of the region to keep. `Top` takes the
/// top `min(width, height)` rows, horizontally centered; `Center` takes a
/// centered square; `None` keeps the full image (the resize step then
/// stretches it to square).
pub fn crop_region(width: u32, height: u32, method: CropMethod) -> (u32, u32, u32, u32) {
    let square = width.min(height);
    match method {
        CropMethod::Top => ((width - square) / 2, 0, square, square),
        CropMethod::Center => ((width - square) / 2, (height - square) / 2, square, square),
        CropMethod::None => (0, 0, width, height),
    }
}

/// Preprocess a decoded image into a `(1, 3, size, size)` tensor.
pub fn preprocess(img: &DynamicImage, settings: &PreprocessSettings) -> Array4<f32> {
    // Decode to 3-channel color before any geometry.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let (x, y, w, h) = crop_region(rgb.width(), rgb.height(), settings.crop_method);
    let cropped = rgb.crop_imm(x, y, w, h);

    let size = settings.image_size;
    let resized = cropped.resize_exact(size, size, FilterType::Triangle);
    let pixels = resized.to_rgb8();

    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (py, row) in pixels.rows().enumerate() {
        for (px, pixel) in row.enumerate() {
            for c in 0..3 {
                let scaled = f32::from(pixel[c]) / 255.0;
                tensor[[0, c, py, px]] = (scaled - settings.mean[c]) / settings.std[c];
            }
        }
    }
    tensor
}

/// Decode and preprocess a single image file.
///
/// Decode failures are per-item `ImageLoad` errors; the caller skips the
/// item and continues the batch.
pub fn preprocess_file(path: &Path, settings: &PreprocessSettings) -> Result<Array4<f32>> {
    let img = image::open(path).map_err(|e| EmbedError::ImageLoad {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;
    Ok(preprocess(&img, settings))
}

/// Concatenate single-item tensors along the batch axis.
///
/// All tensors share the same spatial shape by construction (every item
/// was resized to the configured square size).
pub fn stack_batch(tensors: &[Array4<f32>]) -> Result<Array4<f32>> {
    if tensors.is_empty() {
        return Err(EmbedError::Internal("cannot stack an empty batch".into()));
    }
    let views: Vec<_> = tensors.iter().map(ndarray::ArrayBase::view).collect();
    concatenate(Axis(0), &views).map_err(|e| EmbedError::Internal(format!("stack batch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn settings(size: u32, crop: CropMethod) -> PreprocessSettings {
        PreprocessSettings {
            image_size: size,
            mean: [0.0, 0.0, 0.0],
            std: [1.0, 1.0, 1.0],
            crop_method: crop,
        }
    }

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn crop_region_wide_center() {
        assert_eq!(crop_region(300, 200, CropMethod::Center), (50, 0, 200, 200));
    }

    #[test]
    fn crop_region_wide_top_equals_center() {
        // height < width, so the top square is the same as the centered one
        assert_eq!(crop_region(300, 200, CropMethod::Top), (50, 0, 200, 200));
    }

    #[test]
    fn crop_region_tall_top() {
        assert_eq!(crop_region(200, 300, CropMethod::Top), (0, 0, 200, 200));
    }

    #[test]
    fn crop_region_tall_center() {
        assert_eq!(crop_region(200, 300, CropMethod::Center), (0, 50, 200, 200));
    }

    #[test]
    fn crop_region_none_keeps_full_image() {
        assert_eq!(crop_region(200, 300, CropMethod::None), (0, 0, 200, 300));
    }

    #[test]
    fn output_shape_is_nchw_with_unit_batch() {
        let img = solid(300, 200, [10, 20, 30]);
        let tensor = preprocess(&img, &settings(64, CropMethod::Top));
        assert_eq!(tensor.dim(), (1, 3, 64, 64));
    }

    #[test]
    fn none_crop_stretches_to_square() {
        let img = solid(20, 40, [0, 0, 0]);
        let tensor = preprocess(&img, &settings(32, CropMethod::None));
        assert_eq!(tensor.dim(), (1, 3, 32, 32));
    }

    #[test]
    fn scaling_maps_channel_values_to_unit_range() {
        let img = solid(8, 8, [255, 0, 255]);
        let tensor = preprocess(&img, &settings(8, CropMethod::Center));
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 4, 4]].abs() < 1e-6);
        assert!((tensor[[0, 2, 7, 7]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mean_std_normalization_applied_per_channel() {
        let img = solid(8, 8, [128, 128, 128]);
        let mut s = settings(8, CropMethod::Center);
        s.mean = [0.5, 0.0, 0.5];
        s.std = [0.5, 1.0, 0.25];
        let tensor = preprocess(&img, &s);
        let v = 128.0 / 255.0;
        assert!((tensor[[0, 0, 0, 0]] - (v - 0.5) / 0.5).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] - v).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - (v - 0.5) / 0.25).abs() < 1e-6);
    }

    #[test]
    fn top_and_center_crops_differ_on_tall_images() {
        // Top half white, bottom half black; the top crop sees only white.
        let mut buf = RgbImage::from_pixel(4, 8, Rgb([0, 0, 0]));
        for y in 0..4 {
            for x in 0..4 {
                buf.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let img = DynamicImage::ImageRgb8(buf);
        let top = preprocess(&img, &settings(4, CropMethod::Top));
        let center = preprocess(&img, &settings(4, CropMethod::Center));
        assert!((top[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((top[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert_ne!(top, center);
    }

    #[test]
    fn stack_batch_concatenates_along_batch_axis() {
        let a = preprocess(&solid(8, 8, [255, 255, 255]), &settings(8, CropMethod::Center));
        let b = preprocess(&solid(8, 8, [0, 0, 0]), &settings(8, CropMethod::Center));
        let batch = stack_batch(&[a, b]).unwrap();
        assert_eq!(batch.dim(), (2, 3, 8, 8));
        assert!((batch[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(batch[[1, 0, 0, 0]].abs() < 1e-6);
    }

    #[test]
    fn stack_batch_rejects_empty() {
        assert!(stack_batch(&[]).is_err());
    }

    #[test]
    fn preprocess_file_decode_failure_is_image_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = preprocess_file(&path, &settings(8, CropMethod::Center)).unwrap_err();
        assert!(matches!(err, EmbedError::ImageLoad { .. }));
    }

    #[test]
    fn preprocess_file_missing_file_is_image_load() {
        let err = preprocess_file(
            Path::new("/no/such/card.jpg"),
            &settings(8, CropMethod::Center),
        )
        .unwrap_err();
        assert!(matches!(err, EmbedError::ImageLoad { .. }));
    }
}
