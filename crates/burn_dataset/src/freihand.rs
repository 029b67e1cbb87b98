//! FreiHAND dataset index.

use crate::transform::{to_tensor, ImageTransform};
use crate::types::{BurnDatasetError, DatasetResult, HandSample};
use data_contracts::{
    load_camera_matrices, load_joint_annotations, CameraMatrix, ContractError, DatasetSplit,
    Joints3d, SplitRanges, CAMERA_MATRICES_FILE, JOINTS_FILE, ORIGINAL_IMAGE_SIZE, RGB_SUBDIR,
};
use std::fs;
use std::path::{Path, PathBuf};
use vision_core::{project_joints, HeatmapEncoder, KeypointSet};

/// Read-only view of one split of a FreiHAND root.
///
/// Everything is loaded at construction; [`FreiHand::get`] only reads, so one
/// instance can be shared across loader threads.
#[derive(Debug, Clone)]
pub struct FreiHand {
    image_dir: PathBuf,
    split: DatasetSplit,
    names: Vec<String>,
    matrices: Vec<CameraMatrix>,
    joints: Vec<Joints3d>,
    transform: ImageTransform,
    encoder: HeatmapEncoder,
}

impl FreiHand {
    /// Index `root` and keep the entries of `split`.
    ///
    /// Image names are sorted so that entry `i` pairs with entry `i` of both
    /// annotation files.
    pub fn open(root: &Path, split: DatasetSplit, ranges: &SplitRanges) -> DatasetResult<Self> {
        let image_dir = root.join(RGB_SUBDIR);
        let mut names = list_images(&image_dir)?;
        names.sort();
        let matrices = load_camera_matrices(&root.join(CAMERA_MATRICES_FILE))?;
        let joints = load_joint_annotations(&root.join(JOINTS_FILE))?;

        let range = ranges.range(split, joints.len())?;
        let available = names.len().min(matrices.len());
        if range.end > available {
            return Err(ContractError::SplitOutOfRange {
                split,
                start: range.start,
                end: range.end,
                available,
            }
            .into());
        }

        Ok(Self {
            image_dir,
            split,
            names: names[range.clone()].to_vec(),
            matrices: matrices[range.clone()].to_vec(),
            joints: joints[range].to_vec(),
            transform: ImageTransform::default(),
            encoder: HeatmapEncoder::default(),
        })
    }

    pub fn with_transform(mut self, transform: ImageTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_encoder(mut self, encoder: HeatmapEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn split(&self) -> DatasetSplit {
        self.split
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn image_name(&self, idx: usize) -> DatasetResult<&str> {
        self.check_index(idx)?;
        Ok(&self.names[idx])
    }

    /// Ground-truth keypoints normalized by the original frame size.
    pub fn keypoints(&self, idx: usize) -> DatasetResult<KeypointSet> {
        self.check_index(idx)?;
        let pixels = project_joints(&self.joints[idx], &self.matrices[idx]);
        Ok(pixels.scaled(1.0 / ORIGINAL_IMAGE_SIZE as f32))
    }

    pub fn get(&self, idx: usize) -> DatasetResult<HandSample> {
        let keypoints = self.keypoints(idx)?;
        let name = &self.names[idx];
        let heatmaps =
            self.encoder
                .encode(&keypoints)
                .map_err(|source| BurnDatasetError::Heatmap {
                    image: name.clone(),
                    source,
                })?;
        let path = self.image_dir.join(name);
        let rgb = image::open(&path)
            .map_err(|source| BurnDatasetError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        Ok(HandSample {
            image_name: name.clone(),
            image: self.transform.apply(&rgb),
            raw_image: to_tensor(&rgb),
            heatmaps,
            keypoints,
        })
    }

    fn check_index(&self, idx: usize) -> DatasetResult<()> {
        if idx >= self.len() {
            return Err(BurnDatasetError::IndexOutOfRange {
                index: idx,
                len: self.len(),
            });
        }
        Ok(())
    }
}

fn list_images(dir: &Path) -> DatasetResult<Vec<String>> {
    let io_err = |source| BurnDatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
