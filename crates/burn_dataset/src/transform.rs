//! Image preprocessing: resize, scale to 0..1 and normalize per channel.

use crate::types::ImageTensor;
use data_contracts::{DATASET_MEAN, DATASET_STD, HEATMAP_RESOLUTION};
use image::imageops::FilterType;
use image::RgbImage;

#[derive(Debug, Clone)]
pub struct ImageTransform {
    /// Square side the network input is resized to.
    pub target_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub filter: FilterType,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            target_size: HEATMAP_RESOLUTION as u32,
            mean: DATASET_MEAN,
            std: DATASET_STD,
            filter: FilterType::Triangle,
        }
    }
}

impl ImageTransform {
    pub fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    /// Network input: bilinear resize to `target_size²`, then `(v - mean) / std`.
    pub fn apply(&self, img: &RgbImage) -> ImageTensor {
        let resized;
        let img = if img.dimensions() == (self.target_size, self.target_size) {
            img
        } else {
            resized = image::imageops::resize(img, self.target_size, self.target_size, self.filter);
            &resized
        };
        let mut tensor = to_tensor(img);
        let plane = tensor.height * tensor.width;
        for (c, chunk) in tensor.data.chunks_exact_mut(plane).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            chunk.iter_mut().for_each(|v| *v = (*v - mean) / std);
        }
        tensor
    }
}

/// RGB image to a CHW tensor in 0..1, no resizing.
pub fn to_tensor(img: &RgbImage) -> ImageTensor {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, p) in img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = p[c] as f32 / 255.0;
        }
    }
    ImageTensor {
        data,
        channels: 3,
        height: height as usize,
        width: width as usize,
    }
}
