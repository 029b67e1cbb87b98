//! FreiHAND dataset loading and Burn-compatible batching for hand keypoint training.
//!
//! This crate provides:
//! - [`FreiHand`]: a read-only index over a dataset root that builds samples on demand
//!   (image transform, 3D→2D projection, target heatmaps)
//! - [`ImageTransform`]: resize + normalize into CHW tensors
//! - [`BatchIter`]: ordered batches assembled on a rayon pool, behind [`BatchSource`]

pub mod batch;
pub mod freihand;
pub mod transform;
pub mod types;

pub use batch::{collate, BatchConfig, BatchIter, BatchSource, HeatmapBatch};
pub use freihand::FreiHand;
pub use transform::ImageTransform;
pub use types::*;
