#![allow(dead_code)]

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn_dataset::{collate, BatchSource, DatasetResult, HandSample, HeatmapBatch, ImageTensor};
use nalgebra::Point2;
use std::path::PathBuf;
use training::CheckpointSink;
use vision_core::{GaussianBlur, HeatmapEncoder, HeatmapStack, KeypointSet};

pub const RES: usize = 8;

/// Batches served from samples held in memory.
pub struct MemorySource {
    samples: Vec<HandSample>,
    batch_size: usize,
    cursor: usize,
    pub resets: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<HandSample>, batch_size: usize) -> Self {
        Self {
            samples,
            batch_size,
            cursor: 0,
            resets: 0,
        }
    }
}

impl BatchSource for MemorySource {
    fn reset(&mut self) {
        self.cursor = 0;
        self.resets += 1;
    }

    fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<HeatmapBatch<B>>> {
        if self.cursor >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.samples.len());
        let batch = collate::<B>(&self.samples[self.cursor..end], device)?;
        self.cursor = end;
        Ok(Some(batch))
    }
}

/// Checkpoint sink that only records names.
#[derive(Default)]
pub struct RecordingSink {
    pub names: Vec<String>,
}

impl<B: Backend, M: Module<B>> CheckpointSink<B, M> for RecordingSink {
    fn save(&mut self, _model: &M, name: &str) -> anyhow::Result<PathBuf> {
        self.names.push(name.to_string());
        Ok(PathBuf::from(name))
    }
}

fn image(seed: usize) -> ImageTensor {
    ImageTensor {
        data: (0..3 * RES * RES)
            .map(|i| ((i * 31 + seed * 17) % 97) as f32 / 97.0 - 0.5)
            .collect(),
        channels: 3,
        height: RES,
        width: RES,
    }
}

pub fn synthetic_samples(n: usize) -> Vec<HandSample> {
    let encoder = HeatmapEncoder::new(RES).with_blur(GaussianBlur::new(5, 1.0));
    (0..n)
        .map(|s| {
            let keypoints = KeypointSet::from_fn(|k| {
                let t = ((k + 3 * s) % 21) as f32 / 21.0;
                Point2::new(0.2 + 0.6 * t, 0.8 - 0.6 * t)
            });
            HandSample {
                image_name: format!("{s:08}.png"),
                raw_image: image(s),
                image: image(s),
                heatmaps: encoder.encode(&keypoints).unwrap(),
                keypoints,
            }
        })
        .collect()
}

/// Samples whose target heatmaps are NaN.
pub fn poisoned_samples(n: usize) -> Vec<HandSample> {
    synthetic_samples(n)
        .into_iter()
        .map(|mut s| {
            let len = s.heatmaps.as_slice().len();
            s.heatmaps = HeatmapStack::from_vec(RES, vec![f32::NAN; len]).unwrap();
            s
        })
        .collect()
}
