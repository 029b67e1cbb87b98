use data_contracts::NUM_KEYPOINTS;
use nalgebra::Point2;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeypointError {
    #[error("expected {expected} keypoints, got {found}")]
    Count { expected: usize, found: usize },
}

/// Fingers of the FreiHAND skeleton; every chain starts at the wrist (joint 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Little,
    ];

    /// Joint indices from the wrist to the fingertip.
    pub fn chain(self) -> [usize; 5] {
        let base = match self {
            Finger::Thumb => 1,
            Finger::Index => 5,
            Finger::Middle => 9,
            Finger::Ring => 13,
            Finger::Little => 17,
        };
        [0, base, base + 1, base + 2, base + 3]
    }

    pub fn name(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Little => "little",
        }
    }
}

/// Exactly 21 ordered 2D hand joints.
///
/// Joint 0 is the wrist, followed by four joints per finger (see [`Finger::chain`]).
/// Coordinates are either pixels or normalized to the image size, depending on the
/// pipeline stage; the type does not track which.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointSet([Point2<f32>; NUM_KEYPOINTS]);

impl KeypointSet {
    pub fn new(points: [Point2<f32>; NUM_KEYPOINTS]) -> Self {
        Self(points)
    }

    pub fn from_points(points: &[Point2<f32>]) -> Result<Self, KeypointError> {
        let points: [Point2<f32>; NUM_KEYPOINTS] =
            points.try_into().map_err(|_| KeypointError::Count {
                expected: NUM_KEYPOINTS,
                found: points.len(),
            })?;
        Ok(Self(points))
    }

    /// Build from interleaved `[x0, y0, x1, y1, ...]` values.
    pub fn from_flat(values: &[f32]) -> Result<Self, KeypointError> {
        if values.len() != NUM_KEYPOINTS * 2 {
            return Err(KeypointError::Count {
                expected: NUM_KEYPOINTS,
                found: values.len() / 2,
            });
        }
        Ok(Self(std::array::from_fn(|k| {
            Point2::new(values[2 * k], values[2 * k + 1])
        })))
    }

    pub fn from_fn(f: impl FnMut(usize) -> Point2<f32>) -> Self {
        Self(std::array::from_fn(f))
    }

    pub fn points(&self) -> &[Point2<f32>; NUM_KEYPOINTS] {
        &self.0
    }

    pub fn get(&self, joint: usize) -> Option<Point2<f32>> {
        self.0.get(joint).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point2<f32>> {
        self.0.iter()
    }

    /// Multiply every coordinate by `factor` (pixels <-> normalized).
    pub fn scaled(&self, factor: f32) -> Self {
        Self(self.0.map(|p| Point2::new(p.x * factor, p.y * factor)))
    }

    pub fn to_flat(&self) -> Vec<f32> {
        self.0.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Euclidean distance per joint to `other`.
    pub fn distances(&self, other: &KeypointSet) -> [f32; NUM_KEYPOINTS] {
        std::array::from_fn(|k| nalgebra::distance(&self.0[k], &other.0[k]))
    }

    pub fn mean_distance(&self, other: &KeypointSet) -> f32 {
        self.distances(other).iter().sum::<f32>() / NUM_KEYPOINTS as f32
    }
}

impl std::ops::Index<usize> for KeypointSet {
    type Output = Point2<f32>;

    fn index(&self, joint: usize) -> &Self::Output {
        &self.0[joint]
    }
}
