//! Shared data contracts for the FreiHAND training set.
//!
//! Everything the rest of the workspace agrees on about the dataset lives here:
//! the JSON annotation files (camera intrinsics and 3D joints), the fixed
//! train/val/test split and the image/heatmap constants.

pub mod constants;
pub mod freihand;

pub use constants::*;
pub use freihand::{
    load_camera_matrices, load_joint_annotations, CameraMatrix, ContractError, DatasetSplit,
    Joints3d, SplitRanges, CAMERA_MATRICES_FILE, JOINTS_FILE, RGB_SUBDIR,
};
