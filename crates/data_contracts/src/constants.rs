//! Image and heatmap constants shared by the dataset, model and trainer.

/// Joints per hand: wrist plus four joints for each of the five fingers.
pub const NUM_KEYPOINTS: usize = 21;

/// Side length of the square FreiHAND RGB frames; projected pixels are divided by it.
pub const ORIGINAL_IMAGE_SIZE: u32 = 224;

/// Working resolution of network inputs and target heatmaps.
pub const HEATMAP_RESOLUTION: usize = 128;

pub const NUM_CHANNELS: usize = 3;

/// Per-channel mean of the FreiHAND training images (RGB, 0..1 scale).
pub const DATASET_MEAN: [f32; 3] = [0.3950, 0.4323, 0.2954];

/// Per-channel standard deviation of the FreiHAND training images.
pub const DATASET_STD: [f32; 3] = [0.1966, 0.1734, 0.1836];

/// Base channel count of the heatmap network.
pub const MODEL_CHANNELS: usize = 16;
