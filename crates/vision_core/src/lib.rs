//! vision_core: hand keypoints, camera projection and the heatmap encode/decode pair.
//!
//! - [`geometry`] projects annotated 3D joints into image space.
//! - [`heatmap`] turns normalized keypoints into per-joint Gaussian heatmaps and
//!   decodes predicted heatmaps back into sub-pixel keypoints (soft-argmax).
//! - [`blur`] is the separable Gaussian filter used by the encoder.

pub mod blur;
pub mod geometry;
pub mod heatmap;
pub mod keypoints;

pub use blur::GaussianBlur;
pub use geometry::{project_joints, project_point, project_points};
pub use heatmap::{decode_batch, decode_map, HeatmapEncoder, HeatmapError, HeatmapStack};
pub use keypoints::{Finger, KeypointError, KeypointSet};

pub mod prelude {
    pub use crate::blur::GaussianBlur;
    pub use crate::geometry::*;
    pub use crate::heatmap::*;
    pub use crate::keypoints::*;
}
