//! Per-joint heatmap encoding and soft-argmax decoding.

use crate::blur::GaussianBlur;
use crate::keypoints::KeypointSet;
use data_contracts::{HEATMAP_RESOLUTION, NUM_KEYPOINTS};
use nalgebra::Point2;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeatmapError {
    #[error("heatmap buffer has {found} values, expected {expected}")]
    BufferLength { expected: usize, found: usize },
    #[error("keypoint {joint} is not finite")]
    NonFiniteKeypoint { joint: usize },
    #[error("heatmap resolution must be greater than zero")]
    ZeroResolution,
}

/// 21 square maps of `resolution × resolution` values, stored `[joint][y][x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapStack {
    resolution: usize,
    data: Vec<f32>,
}

impl HeatmapStack {
    pub fn zeros(resolution: usize) -> Self {
        Self {
            resolution,
            data: vec![0.0; NUM_KEYPOINTS * resolution * resolution],
        }
    }

    pub fn from_vec(resolution: usize, data: Vec<f32>) -> Result<Self, HeatmapError> {
        let expected = NUM_KEYPOINTS * resolution * resolution;
        if data.len() != expected {
            return Err(HeatmapError::BufferLength {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { resolution, data })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn map(&self, joint: usize) -> &[f32] {
        let len = self.resolution * self.resolution;
        &self.data[joint * len..(joint + 1) * len]
    }

    pub fn map_mut(&mut self, joint: usize) -> &mut [f32] {
        let len = self.resolution * self.resolution;
        &mut self.data[joint * len..(joint + 1) * len]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Turns normalized keypoints into blurred one-hot heatmaps.
#[derive(Debug, Clone)]
pub struct HeatmapEncoder {
    resolution: usize,
    blur: GaussianBlur,
}

impl Default for HeatmapEncoder {
    fn default() -> Self {
        Self::new(HEATMAP_RESOLUTION)
    }
}

impl HeatmapEncoder {
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution,
            blur: GaussianBlur::default(),
        }
    }

    pub fn with_blur(mut self, blur: GaussianBlur) -> Self {
        self.blur = blur;
        self
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Encode keypoints normalized to `[0, 1]` of the source image.
    ///
    /// A joint whose scaled pixel falls outside the grid keeps an all-zero map.
    /// In-frame joints get a single 1.0 that is blurred and rescaled so the peak is
    /// exactly 1. A non-finite joint (degenerate projection) is an error.
    pub fn encode(&self, keypoints: &KeypointSet) -> Result<HeatmapStack, HeatmapError> {
        let r = self.resolution;
        let mut stack = HeatmapStack::zeros(r);
        for (k, p) in keypoints.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(HeatmapError::NonFiniteKeypoint { joint: k });
            }
            if let Some((px, py)) = self.hit_pixel(p) {
                stack.map_mut(k)[py * r + px] = 1.0;
            }
        }
        for k in 0..NUM_KEYPOINTS {
            let map = stack.map_mut(k);
            // Only maps that received a hit are blurred; empty maps must stay zero.
            if max_value(map) == 1.0 {
                let blurred = self.blur.apply(map, r, r);
                let peak = max_value(&blurred);
                for (dst, v) in map.iter_mut().zip(blurred) {
                    *dst = v / peak;
                }
            }
        }
        Ok(stack)
    }

    /// Integer pixel of a normalized point, truncating toward zero.
    fn hit_pixel(&self, p: &Point2<f32>) -> Option<(usize, usize)> {
        let r = self.resolution as f32;
        let px = (p.x * r).trunc();
        let py = (p.y * r).trunc();
        if (0.0..r).contains(&px) && (0.0..r).contains(&py) {
            Some((px as usize, py as usize))
        } else {
            None
        }
    }
}

fn max_value(values: &[f32]) -> f32 {
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Soft-argmax of one `resolution × resolution` map, normalized to `[0, 1]`.
///
/// The map must carry positive total mass; an all-zero map divides by zero and
/// yields NaN coordinates. So does a zero resolution.
pub fn decode_map(map: &[f32], resolution: usize) -> Point2<f32> {
    if resolution == 0 {
        return Point2::new(f32::NAN, f32::NAN);
    }
    let total: f32 = map.iter().sum();
    let mut x_prob = vec![0.0f32; resolution];
    let mut y_prob = vec![0.0f32; resolution];
    for (y, row) in map.chunks_exact(resolution).enumerate() {
        for (x, v) in row.iter().enumerate() {
            let p = v / total;
            x_prob[x] += p;
            y_prob[y] += p;
        }
    }
    let expect = |prob: &[f32]| -> f32 {
        prob.iter()
            .enumerate()
            .map(|(i, p)| i as f32 * p)
            .sum::<f32>()
    };
    let r = resolution as f32;
    Point2::new(expect(&x_prob) / r, expect(&y_prob) / r)
}

/// Decode a `batch × 21 × resolution × resolution` buffer into normalized keypoints.
pub fn decode_batch(
    heatmaps: &[f32],
    batch: usize,
    resolution: usize,
) -> Result<Vec<KeypointSet>, HeatmapError> {
    if resolution == 0 {
        return Err(HeatmapError::ZeroResolution);
    }
    let map_len = resolution * resolution;
    let expected = batch * NUM_KEYPOINTS * map_len;
    if heatmaps.len() != expected {
        return Err(HeatmapError::BufferLength {
            expected,
            found: heatmaps.len(),
        });
    }
    Ok(heatmaps
        .chunks_exact(NUM_KEYPOINTS * map_len)
        .map(|sample| {
            KeypointSet::from_fn(|k| decode_map(&sample[k * map_len..(k + 1) * map_len], resolution))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_joint(x: f32, y: f32) -> KeypointSet {
        KeypointSet::from_fn(|k| {
            if k == 0 {
                Point2::new(x, y)
            } else {
                Point2::new(2.0, 2.0)
            }
        })
    }

    #[test]
    fn hit_pixel_truncates() {
        let enc = HeatmapEncoder::new(128);
        assert_eq!(enc.hit_pixel(&Point2::new(0.5, 0.999)), Some((64, 127)));
        assert_eq!(enc.hit_pixel(&Point2::new(1.0, 0.5)), None);
        // -0.001 * 128 truncates to zero and still counts as in frame.
        assert_eq!(enc.hit_pixel(&Point2::new(-0.001, 0.0)), Some((0, 0)));
        assert_eq!(enc.hit_pixel(&Point2::new(f32::NAN, 0.5)), None);
    }

    #[test]
    fn in_frame_map_peaks_at_one() {
        let enc = HeatmapEncoder::new(64);
        let stack = enc.encode(&single_joint(0.5, 0.25)).unwrap();
        let map = stack.map(0);
        assert_eq!(map[16 * 64 + 32], 1.0);
        assert!(map.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(map[16 * 64 + 35] > 0.0);
    }

    #[test]
    fn out_of_frame_joints_stay_zero() {
        let stack = HeatmapEncoder::new(32).encode(&single_joint(1.5, 1.5)).unwrap();
        for k in 0..NUM_KEYPOINTS {
            assert!(stack.map(k).iter().all(|v| *v == 0.0), "joint {k} not empty");
        }
    }

    #[test]
    fn decode_uniform_map_is_centered() {
        let r = 8;
        let p = decode_map(&vec![1.0; r * r], r);
        assert_abs_diff_eq!(p.x, 3.5 / 8.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 3.5 / 8.0, epsilon = 1e-6);
    }

    #[test]
    fn decode_zero_map_is_nan() {
        let p = decode_map(&[0.0; 16], 4);
        assert!(p.x.is_nan() && p.y.is_nan());
    }

    #[test]
    fn non_finite_joint_is_rejected() {
        let enc = HeatmapEncoder::new(16);
        let kp = KeypointSet::from_fn(|k| match k {
            5 => Point2::new(f32::INFINITY, f32::NAN),
            _ => Point2::new(0.5, 0.5),
        });
        assert_eq!(
            enc.encode(&kp).unwrap_err(),
            HeatmapError::NonFiniteKeypoint { joint: 5 }
        );
    }

    #[test]
    fn decode_batch_rejects_zero_resolution() {
        assert_eq!(
            decode_batch(&[], 1, 0).unwrap_err(),
            HeatmapError::ZeroResolution
        );
        assert!(decode_map(&[], 0).x.is_nan());
    }

    #[test]
    fn decode_batch_checks_length() {
        let err = decode_batch(&[0.0; 10], 1, 4).unwrap_err();
        assert_eq!(
            err,
            HeatmapError::BufferLength {
                expected: 21 * 16,
                found: 10
            }
        );
    }
}
