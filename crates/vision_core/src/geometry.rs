//! Pinhole projection of annotated 3D joints into image space.

use crate::keypoints::KeypointSet;
use data_contracts::{CameraMatrix, Joints3d};
use nalgebra::{Point2, Point3};

/// Project one point: `uv = (K·p)[..2] / (K·p)[2]`.
///
/// Zero depth is not guarded; the division yields ±inf or NaN and callers see it.
pub fn project_point(k: &CameraMatrix, p: &Point3<f32>) -> Point2<f32> {
    let uvw = k.matrix() * p.coords;
    Point2::new(uvw.x / uvw.z, uvw.y / uvw.z)
}

/// Project an N×3 point list into N image-space points.
pub fn project_points(points: &[Point3<f32>], k: &CameraMatrix) -> Vec<Point2<f32>> {
    points.iter().map(|p| project_point(k, p)).collect()
}

/// Project a full hand annotation into pixel coordinates.
pub fn project_joints(joints: &Joints3d, k: &CameraMatrix) -> KeypointSet {
    let points = joints.as_array();
    KeypointSet::from_fn(|j| {
        let [x, y, z] = points[j];
        project_point(k, &Point3::new(x, y, z))
    })
}
