use crate::EngineError;
use image::{RgbImage, imageops};
use ndarray::Array4;

/// How a letterboxed input maps back to the original image.
#[derive(Debug, Clone, Copy)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

const PAD_VALUE: u8 = 114;

/// Letterbox an image to `(input_width, input_height)` and pack it as a
/// normalized NCHW tensor. Aspect ratio is preserved; the remainder is
/// padded with the conventional gray value.
pub fn letterbox(
    image: &RgbImage,
    input_width: u32,
    input_height: u32,
) -> Result<(Array4<f32>, LetterboxTransform), EngineError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(EngineError::UnsupportedImage(format!(
            "{}x{} input",
            w, h
        )));
    }

    let scale = (input_width as f32 / w as f32).min(input_height as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    let pad_x = ((input_width - new_w) / 2) as f32;
    let pad_y = ((input_height - new_h) / 2) as f32;

    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);

    let mut tensor = Array4::<f32>::from_elem(
        (1, 3, input_height as usize, input_width as usize),
        PAD_VALUE as f32 / 255.0,
    );

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = x as usize + pad_x as usize;
        let ty = y as usize + pad_y as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
        }
    }

    Ok((
        tensor,
        LetterboxTransform {
            scale,
            pad_x,
            pad_y,
        },
    ))
}
