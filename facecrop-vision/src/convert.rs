//! Conversions between `image` buffers and the `(height, width, channels)`
//! float arrays the pipeline works on.

use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use ndarray::{Array2, Array3, ArrayView3, Axis};

use crate::error::{AlignError, Result};

/// Grayscale inputs become one channel, everything else RGB. Values stay in
/// the 0–255 range.
pub fn image_to_array(img: &DynamicImage) -> Result<Array3<f32>> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let shaped = match img.color().channel_count() {
        1 | 2 => {
            let gray = img.to_luma8();
            let data: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();
            Array2::from_shape_vec((h, w), data).map(gray_to_array)
        }
        _ => {
            let rgb = img.to_rgb8();
            let data: Vec<f32> = rgb.as_raw().iter().map(|&v| v as f32).collect();
            Array3::from_shape_vec((h, w, 3), data)
        }
    };
    shaped.map_err(|e| AlignError::invalid(format!("image buffer does not match {w}x{h}: {e}")))
}

/// Lift a 2-D grayscale array to a single-channel image.
pub fn gray_to_array(gray: Array2<f32>) -> Array3<f32> {
    gray.insert_axis(Axis(2))
}

/// Round and clamp to 8 bits. Accepts one or three channels.
pub fn array_to_image(array: ArrayView3<f32>) -> Result<DynamicImage> {
    let (h, w, c) = array.dim();
    let data: Vec<u8> = array
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    let too_big = || AlignError::invalid(format!("array of shape ({h}, {w}, {c}) is too large"));
    match c {
        1 => GrayImage::from_raw(w as u32, h as u32, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(too_big),
        3 => RgbImage::from_raw(w as u32, h as u32, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(too_big),
        other => Err(AlignError::invalid(format!(
            "cannot build an image from {other} channels"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use ndarray::array;

    #[test]
    fn rgb_round_trip() {
        let mut rgb = RgbImage::new(3, 2);
        rgb.put_pixel(2, 1, Rgb([10, 20, 30]));
        let arr = image_to_array(&DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(arr.dim(), (2, 3, 3));
        assert_eq!(arr[[1, 2, 1]], 20.0);

        let back = array_to_image(arr.view()).unwrap().to_rgb8();
        assert_eq!(back.get_pixel(2, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn gray_stays_single_channel() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(1, 0, Luma([200]));
        let arr = image_to_array(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!(arr.dim(), (2, 2, 1));
        assert_eq!(arr[[0, 1, 0]], 200.0);
    }

    #[test]
    fn gray_with_alpha_drops_alpha() {
        let mut gray = image::GrayAlphaImage::new(3, 1);
        gray.put_pixel(2, 0, image::LumaA([90, 10]));
        let arr = image_to_array(&DynamicImage::ImageLumaA8(gray)).unwrap();
        assert_eq!(arr.dim(), (1, 3, 1));
        assert_eq!(arr[[0, 2, 0]], 90.0);
    }

    #[test]
    fn array_to_image_clamps() {
        let arr = gray_to_array(array![[-4.0f32, 300.0], [127.6, 0.4]]);
        let img = array_to_image(arr.view()).unwrap().to_luma8();
        assert_eq!(img.as_raw(), &vec![0u8, 255, 128, 0]);
    }

    #[test]
    fn rejects_two_channels() {
        let arr = Array3::<f32>::zeros((2, 2, 2));
        assert!(array_to_image(arr.view()).is_err());
    }
}
