//! Keypoint accuracy on decoded predictions.

use crate::loss::IouLoss;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use burn_dataset::BatchSource;
use data_contracts::{NUM_KEYPOINTS, ORIGINAL_IMAGE_SIZE};
use models::HeatmapModel;
use vision_core::{decode_batch, Finger, KeypointSet};

/// Running pixel-error statistics over decoded keypoints.
#[derive(Debug, Clone)]
pub struct KeypointMetrics {
    /// Multiplier from normalized coordinates to pixels.
    scale: f32,
    pck_threshold: f32,
    samples: usize,
    joint_sums: [f64; NUM_KEYPOINTS],
    hits: usize,
}

impl KeypointMetrics {
    /// Errors are reported in pixels of the original frame; PCK counts joints
    /// within `pck_threshold` pixels.
    pub fn new(pck_threshold: f32) -> Self {
        Self {
            scale: ORIGINAL_IMAGE_SIZE as f32,
            pck_threshold,
            samples: 0,
            joint_sums: [0.0; NUM_KEYPOINTS],
            hits: 0,
        }
    }

    /// `pred` and `truth` are normalized.
    pub fn update(&mut self, pred: &KeypointSet, truth: &KeypointSet) {
        for (sum, d) in self.joint_sums.iter_mut().zip(pred.distances(truth)) {
            let px = d * self.scale;
            *sum += px as f64;
            if px <= self.pck_threshold {
                self.hits += 1;
            }
        }
        self.samples += 1;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn mean_error(&self) -> f64 {
        self.joint_sums.iter().sum::<f64>() / (self.samples * NUM_KEYPOINTS) as f64
    }

    pub fn joint_error(&self, joint: usize) -> f64 {
        self.joint_sums[joint] / self.samples as f64
    }

    /// Mean over the four joints of `finger`, wrist excluded.
    pub fn finger_error(&self, finger: Finger) -> f64 {
        let chain = finger.chain();
        chain[1..].iter().map(|j| self.joint_error(*j)).sum::<f64>() / 4.0
    }

    /// Fraction of joints within the PCK threshold.
    pub fn pck(&self) -> f64 {
        self.hits as f64 / (self.samples * NUM_KEYPOINTS) as f64
    }
}

#[derive(Debug, Clone)]
pub struct EvalReport {
    pub batches: usize,
    pub mean_loss: f64,
    pub keypoints: KeypointMetrics,
}

/// Run `model` over up to `max_batches` batches of `source`, decoding the
/// predicted heatmaps with soft-argmax.
pub fn evaluate<B, M, S>(
    model: &M,
    source: &mut S,
    device: &B::Device,
    max_batches: Option<usize>,
    pck_threshold: f32,
) -> anyhow::Result<EvalReport>
where
    B: Backend,
    M: HeatmapModel<B>,
    S: BatchSource,
{
    let loss_fn = IouLoss::default();
    let mut metrics = KeypointMetrics::new(pck_threshold);
    let mut loss_sum = 0.0;
    let mut batches = 0;
    source.reset();
    while max_batches.map_or(true, |cap| batches < cap) {
        let Some(batch) = source.next_batch::<B>(device)? else {
            break;
        };
        let preds = model.forward_heatmaps(batch.images);
        let [n, _, resolution, _] = preds.dims();
        loss_sum += loss_fn
            .forward(preds.clone(), batch.heatmaps)
            .into_scalar()
            .elem::<f64>();

        let predicted = decode_batch(&to_vec(preds)?, n, resolution)?;
        let truth = to_vec(batch.keypoints)?;
        for (pred, flat) in predicted.iter().zip(truth.chunks_exact(NUM_KEYPOINTS * 2)) {
            metrics.update(pred, &KeypointSet::from_flat(flat)?);
        }
        batches += 1;
    }
    if batches == 0 {
        anyhow::bail!("evaluation source produced no batches");
    }
    Ok(EvalReport {
        batches,
        mean_loss: loss_sum / batches as f64,
        keypoints: metrics,
    })
}

fn to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> anyhow::Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read tensor data: {e:?}"))
}
