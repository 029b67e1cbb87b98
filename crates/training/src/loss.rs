//! Soft IoU between predicted and target heatmaps.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// `1 - mean(iou)` over every sample and joint, where
/// `iou = (Σ t·p + ε) / (Σ t² + Σ p² - Σ t·p + ε)`.
///
/// Two all-zero maps score a perfect IoU of 1 thanks to `ε`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IouLoss {
    pub epsilon: f64,
}

impl Default for IouLoss {
    fn default() -> Self {
        Self { epsilon: 1e-6 }
    }
}

impl IouLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pred` and `target` are `[B, K, H, W]`; returns a single-element tensor.
    pub fn forward<B: Backend>(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        let [b, k, h, w] = pred.dims();
        let pred = pred.reshape([b, k, h * w]);
        let target = target.reshape([b, k, h * w]);

        let inter = (target.clone() * pred.clone()).sum_dim(2);
        let union = (target.clone() * target).sum_dim(2) + (pred.clone() * pred).sum_dim(2)
            - inter.clone();
        let iou = inter.add_scalar(self.epsilon) / union.add_scalar(self.epsilon);
        iou.mean().neg().add_scalar(1.0)
    }
}
