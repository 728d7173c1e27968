use image::imageops::FilterType;

use crate::error::InferenceError;

/// Width and height the classifier was trained on.
pub const IMAGE_SIZE: (u32, u32) = (224, 224);

/// A batch of NHWC float pixels ready to feed a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBatch {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl InputBatch {
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(InferenceError::Shape {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(InputBatch { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Decodes `image_data`, forces RGB, resizes to `size` and scales to [0, 1].
/// The result is shaped `(1, height, width, 3)`.
pub fn preprocess_image(image_data: &[u8], size: (u32, u32)) -> Result<InputBatch, InferenceError> {
    let (width, height) = size;
    let rgb = image::load_from_memory(image_data)?.to_rgb8();
    let resized = image::imageops::resize(&rgb, width, height, FilterType::CatmullRom);

    let data: Vec<f32> = resized
        .pixels()
        .flat_map(|pixel| pixel.0)
        .map(|channel| channel as f32 / 255.0)
        .collect();

    InputBatch::new([1, height as usize, width as usize, 3], data)
}
