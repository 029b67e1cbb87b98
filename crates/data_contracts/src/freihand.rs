use nalgebra::{Matrix3, Point3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::constants::NUM_KEYPOINTS;

/// Camera intrinsics, one 3x3 matrix per image, same order as the sorted image names.
pub const CAMERA_MATRICES_FILE: &str = "training_K.json";
/// 3D joint annotations, one 21x3 array per image.
pub const JOINTS_FILE: &str = "training_xyz.json";
/// RGB frames relative to the dataset root.
pub const RGB_SUBDIR: &str = "training/rgb";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{split} split needs entries {start}..{end} but only {available} are available")]
    SplitOutOfRange {
        split: DatasetSplit,
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("unknown dataset split '{0}' (expected train, val or test)")]
    UnknownSplit(String),
}

/// Intrinsic projection matrix of one sample.
///
/// Stored on disk as a row-major nested array (`[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f32; 3]; 3]", into = "[[f32; 3]; 3]")]
pub struct CameraMatrix(pub Matrix3<f32>);

impl CameraMatrix {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn matrix(&self) -> &Matrix3<f32> {
        &self.0
    }
}

impl From<[[f32; 3]; 3]> for CameraMatrix {
    fn from(rows: [[f32; 3]; 3]) -> Self {
        Self(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], //
            rows[1][0], rows[1][1], rows[1][2], //
            rows[2][0], rows[2][1], rows[2][2],
        ))
    }
}

impl From<CameraMatrix> for [[f32; 3]; 3] {
    fn from(k: CameraMatrix) -> Self {
        let m = k.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// The 21 annotated 3D joints of one hand, in dataset units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 3]>", into = "Vec<[f32; 3]>")]
pub struct Joints3d([[f32; 3]; NUM_KEYPOINTS]);

impl Joints3d {
    pub fn new(joints: [[f32; 3]; NUM_KEYPOINTS]) -> Self {
        Self(joints)
    }

    pub fn as_array(&self) -> &[[f32; 3]; NUM_KEYPOINTS] {
        &self.0
    }

    pub fn points(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.0.iter().map(|p| Point3::new(p[0], p[1], p[2]))
    }
}

impl TryFrom<Vec<[f32; 3]>> for Joints3d {
    type Error = String;

    fn try_from(joints: Vec<[f32; 3]>) -> Result<Self, Self::Error> {
        let found = joints.len();
        let joints: [[f32; 3]; NUM_KEYPOINTS] = joints
            .try_into()
            .map_err(|_| format!("expected {NUM_KEYPOINTS} joints, found {found}"))?;
        Ok(Self(joints))
    }
}

impl From<Joints3d> for Vec<[f32; 3]> {
    fn from(joints: Joints3d) -> Self {
        joints.0.to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetSplit {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(DatasetSplit::Train),
            "val" | "valid" | "validation" => Ok(DatasetSplit::Val),
            "test" => Ok(DatasetSplit::Test),
            other => Err(ContractError::UnknownSplit(other.to_string())),
        }
    }
}

/// Index ranges partitioning the ordered sample list.
///
/// Train and val are absolute ranges; test is the last `test_len` annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRanges {
    pub train: Range<usize>,
    pub val: Range<usize>,
    pub test_len: usize,
}

impl Default for SplitRanges {
    fn default() -> Self {
        Self {
            train: 0..26_000,
            val: 26_000..31_000,
            test_len: 1_560,
        }
    }
}

impl SplitRanges {
    /// Resolve the index range of `split` over `available` annotations.
    pub fn range(&self, split: DatasetSplit, available: usize) -> Result<Range<usize>, ContractError> {
        let range = match split {
            DatasetSplit::Train => self.train.clone(),
            DatasetSplit::Val => self.val.clone(),
            DatasetSplit::Test => {
                let start = available.checked_sub(self.test_len).ok_or(
                    ContractError::SplitOutOfRange {
                        split,
                        start: 0,
                        end: self.test_len,
                        available,
                    },
                )?;
                start..available
            }
        };
        if range.start > range.end || range.end > available {
            return Err(ContractError::SplitOutOfRange {
                split,
                start: range.start,
                end: range.end,
                available,
            });
        }
        Ok(range)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ContractError> {
    let bytes = fs::read(path).map_err(|source| ContractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ContractError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `training_K.json`.
pub fn load_camera_matrices(path: &Path) -> Result<Vec<CameraMatrix>, ContractError> {
    read_json(path)
}

/// Load `training_xyz.json`; any entry without exactly 21 joints fails the whole file.
pub fn load_joint_annotations(path: &Path) -> Result<Vec<Joints3d>, ContractError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_matrix_reads_row_major() {
        let k: CameraMatrix =
            serde_json::from_str("[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]").unwrap();
        assert_eq!(k.0[(0, 1)], 2.0);
        assert_eq!(k.0[(1, 0)], 4.0);
        assert_eq!(k.0[(2, 2)], 9.0);
        let back: [[f32; 3]; 3] = k.into();
        assert_eq!(back[1], [4.0, 5.0, 6.0]);
    }

    #[test]
    fn joints_with_wrong_count_are_rejected() {
        let err = serde_json::from_str::<Joints3d>("[[0.0, 0.0, 1.0]]").unwrap_err();
        assert!(err.to_string().contains("expected 21 joints"));
    }

    #[test]
    fn split_parses_aliases() {
        assert_eq!("validation".parse::<DatasetSplit>().unwrap(), DatasetSplit::Val);
        assert_eq!("TEST".parse::<DatasetSplit>().unwrap(), DatasetSplit::Test);
        assert!("holdout".parse::<DatasetSplit>().is_err());
    }
}
