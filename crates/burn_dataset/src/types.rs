//! Core types and error definitions for burn_dataset.

use data_contracts::ContractError;
use std::path::PathBuf;
use thiserror::Error;
use vision_core::{HeatmapError, HeatmapStack, KeypointSet};

pub type DatasetResult<T> = Result<T, BurnDatasetError>;

#[derive(Debug, Error)]
pub enum BurnDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot encode heatmaps for {image}: {source}")]
    Heatmap {
        image: String,
        #[source]
        source: HeatmapError,
    },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Other(String),
}

/// Image in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageTensor {
    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

/// One training example, produced on demand by [`crate::FreiHand::get`].
#[derive(Debug, Clone)]
pub struct HandSample {
    pub image_name: String,
    /// Original frame, 0..1 scale.
    pub raw_image: ImageTensor,
    /// Network input: resized and mean/std normalized.
    pub image: ImageTensor,
    /// Keypoints normalized by the original image size.
    pub keypoints: KeypointSet,
    pub heatmaps: HeatmapStack,
}
