//! Burn networks for hand keypoint heatmap regression.
//!
//! - [`HeatmapNet`]: a shallow U-Net mapping `[B, 3, H, W]` images to
//!   `[B, K, H, W]` heatmaps in `0..1`.
//! - [`HeatmapModel`]: the seam the trainer and evaluator use, so any network with
//!   the same input/output shapes can be plugged in.
//!
//! `H` and `W` must be divisible by 8 (three pooling stages).

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::{MODEL_CHANNELS, NUM_CHANNELS, NUM_KEYPOINTS};

/// Image batch in, per-joint heatmaps out.
pub trait HeatmapModel<B: Backend> {
    fn forward_heatmaps(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapNetConfig {
    pub in_channels: usize,
    /// Width of the first encoder stage; doubles at each stage.
    pub base_channels: usize,
    pub num_keypoints: usize,
}

impl Default for HeatmapNetConfig {
    fn default() -> Self {
        Self {
            in_channels: NUM_CHANNELS,
            base_channels: MODEL_CHANNELS,
            num_keypoints: NUM_KEYPOINTS,
        }
    }
}

/// Two 3×3 convolutions with ReLU, spatial size preserved.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        Self { conv1, conv2 }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(x));
        relu(self.conv2.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct HeatmapNet<B: Backend> {
    enc1: ConvBlock<B>,
    enc2: ConvBlock<B>,
    enc3: ConvBlock<B>,
    bottleneck: ConvBlock<B>,
    pool: MaxPool2d,
    up3: ConvTranspose2d<B>,
    dec3: ConvBlock<B>,
    up2: ConvTranspose2d<B>,
    dec2: ConvBlock<B>,
    up1: ConvTranspose2d<B>,
    dec1: ConvBlock<B>,
    head: Conv2d<B>,
    pub config: Ignored<HeatmapNetConfig>,
}

impl<B: Backend> HeatmapNet<B> {
    pub fn new(config: HeatmapNetConfig, device: &B::Device) -> Self {
        let c = config.base_channels.max(1);
        let up = |from: usize, to: usize| {
            ConvTranspose2dConfig::new([from, to], [2, 2])
                .with_stride([2, 2])
                .init(device)
        };
        Self {
            enc1: ConvBlock::new(config.in_channels, c, device),
            enc2: ConvBlock::new(c, 2 * c, device),
            enc3: ConvBlock::new(2 * c, 4 * c, device),
            bottleneck: ConvBlock::new(4 * c, 8 * c, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            up3: up(8 * c, 4 * c),
            dec3: ConvBlock::new(8 * c, 4 * c, device),
            up2: up(4 * c, 2 * c),
            dec2: ConvBlock::new(4 * c, 2 * c, device),
            up1: up(2 * c, c),
            dec1: ConvBlock::new(2 * c, c, device),
            head: Conv2dConfig::new([c, config.num_keypoints], [1, 1])
                .with_padding(PaddingConfig2d::Valid)
                .init(device),
            config: Ignored(config),
        }
    }

    /// `[B, C, H, W]` → `[B, K, H, W]`, sigmoid activated.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let e1 = self.enc1.forward(images);
        let e2 = self.enc2.forward(self.pool.forward(e1.clone()));
        let e3 = self.enc3.forward(self.pool.forward(e2.clone()));
        let b = self.bottleneck.forward(self.pool.forward(e3.clone()));

        let d3 = self
            .dec3
            .forward(Tensor::cat(vec![self.up3.forward(b), e3], 1));
        let d2 = self
            .dec2
            .forward(Tensor::cat(vec![self.up2.forward(d3), e2], 1));
        let d1 = self
            .dec1
            .forward(Tensor::cat(vec![self.up1.forward(d2), e1], 1));
        sigmoid(self.head.forward(d1))
    }
}

impl<B: Backend> HeatmapModel<B> for HeatmapNet<B> {
    fn forward_heatmaps(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }
}

pub mod prelude {
    pub use super::{HeatmapModel, HeatmapNet, HeatmapNetConfig};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn output_matches_input_resolution() {
        let device = Default::default();
        let cfg = HeatmapNetConfig {
            base_channels: 4,
            ..Default::default()
        };
        let net = HeatmapNet::<TestBackend>::new(cfg, &device);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 24], &device);
        let out = net.forward_heatmaps(images);
        assert_eq!(out.dims(), [2, NUM_KEYPOINTS, 16, 24]);
    }

    #[test]
    fn heatmaps_are_bounded() {
        let device = Default::default();
        let cfg = HeatmapNetConfig {
            base_channels: 2,
            num_keypoints: 3,
            ..Default::default()
        };
        let net = HeatmapNet::<TestBackend>::new(cfg, &device);
        let images = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let values = net
            .forward(images)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values.len(), 3 * 8 * 8);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn default_config_uses_dataset_constants() {
        let cfg = HeatmapNetConfig::default();
        assert_eq!(cfg.in_channels, 3);
        assert_eq!(cfg.base_channels, 16);
        assert_eq!(cfg.num_keypoints, 21);
    }
}
