//! Batch iteration for training and validation.

use crate::freihand::FreiHand;
use crate::types::{BurnDatasetError, DatasetResult, HandSample};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use data_contracts::NUM_KEYPOINTS;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// Images, target heatmaps and keypoints of one batch.
#[derive(Debug, Clone)]
pub struct HeatmapBatch<B: Backend> {
    /// Network input, shape `[batch, 3, R, R]`.
    pub images: Tensor<B, 4>,
    /// Target heatmaps, shape `[batch, 21, R, R]`.
    pub heatmaps: Tensor<B, 4>,
    /// Normalized keypoints, shape `[batch, 21, 2]`.
    pub keypoints: Tensor<B, 3>,
    pub image_names: Vec<String>,
}

impl<B: Backend> HeatmapBatch<B> {
    pub fn len(&self) -> usize {
        self.image_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_names.is_empty()
    }
}

/// A restartable stream of batches.
///
/// The trainer calls [`BatchSource::reset`] at the start of every epoch and then
/// pulls batches until it reaches its cap or the source is exhausted. Batches are
/// produced on whichever backend the caller asks for, so the same source feeds
/// autodiff training and plain evaluation.
pub trait BatchSource {
    fn reset(&mut self);

    fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<HeatmapBatch<B>>>;
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Reshuffle the sample order on every reset.
    pub shuffle: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
    /// Drop the trailing partial batch.
    pub drop_last: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 48,
            shuffle: false,
            seed: None,
            drop_last: false,
        }
    }
}

/// Sequential batches over a shared [`FreiHand`] split.
///
/// Samples inside a batch are loaded in parallel on the rayon pool and gathered in
/// index order, so batch contents only depend on the (possibly shuffled) order.
pub struct BatchIter {
    dataset: Arc<FreiHand>,
    order: Vec<usize>,
    cursor: usize,
    cfg: BatchConfig,
    rng: StdRng,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
    total_assemble_time: Duration,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
}

impl BatchIter {
    pub fn new(dataset: Arc<FreiHand>, cfg: BatchConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let log_every_samples = match std::env::var("HANDPOSE_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.trim().parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let now = Instant::now();
        let mut iter = Self {
            order: (0..dataset.len()).collect(),
            dataset,
            cursor: 0,
            cfg,
            rng,
            processed_samples: 0,
            processed_batches: 0,
            started: now,
            total_load_time: Duration::ZERO,
            total_assemble_time: Duration::ZERO,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
        };
        iter.reset();
        iter
    }

    pub fn dataset(&self) -> &FreiHand {
        &self.dataset
    }

    /// Current sample order (indices into the split).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        if processed_since < threshold && self.last_log.elapsed() < Duration::from_secs(30) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let batches = self.processed_batches.max(1) as f64;
        log::info!(
            "[dataset:{}] batches={} samples={} elapsed={:.1}s rate={:.1} img/s avg_load_ms={:.2} avg_assemble_ms={:.2}",
            self.dataset.split(),
            self.processed_batches,
            self.processed_samples,
            secs,
            self.processed_samples as f32 / secs,
            self.total_load_time.as_secs_f64() * 1000.0 / batches,
            self.total_assemble_time.as_secs_f64() * 1000.0 / batches,
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}

impl BatchSource for BatchIter {
    fn reset(&mut self) {
        self.cursor = 0;
        if self.cfg.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<HeatmapBatch<B>>> {
        let batch_size = self.cfg.batch_size.max(1);
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.order.len());
        if self.cfg.drop_last && end - self.cursor < batch_size {
            self.cursor = self.order.len();
            return Ok(None);
        }
        let slice = &self.order[self.cursor..end];
        self.cursor = end;

        let t_load = Instant::now();
        let dataset = &self.dataset;
        let samples = slice
            .par_iter()
            .map(|&idx| dataset.get(idx))
            .collect::<DatasetResult<Vec<HandSample>>>()?;
        let load_elapsed = t_load.elapsed();

        let t_assemble = Instant::now();
        let batch = collate::<B>(&samples, device)?;
        self.total_assemble_time += t_assemble.elapsed();
        self.total_load_time += load_elapsed;
        self.processed_samples += samples.len();
        self.processed_batches += 1;
        self.maybe_log_progress();

        Ok(Some(batch))
    }
}

/// Stack samples into batch tensors. All samples must share image and heatmap sizes.
pub fn collate<B: Backend>(
    samples: &[HandSample],
    device: &B::Device,
) -> DatasetResult<HeatmapBatch<B>> {
    let Some(first) = samples.first() else {
        return Err(BurnDatasetError::Other("cannot collate empty batch".to_string()));
    };
    let [channels, height, width] = first.image.dims();
    let resolution = first.heatmaps.resolution();
    let batch = samples.len();

    let mut images = Vec::with_capacity(batch * channels * height * width);
    let mut heatmaps = Vec::with_capacity(batch * NUM_KEYPOINTS * resolution * resolution);
    let mut keypoints = Vec::with_capacity(batch * NUM_KEYPOINTS * 2);
    let mut image_names = Vec::with_capacity(batch);
    for sample in samples {
        if sample.image.dims() != [channels, height, width]
            || sample.heatmaps.resolution() != resolution
        {
            return Err(BurnDatasetError::Other(format!(
                "sample {} has image {:?} / heatmaps {}, expected {:?} / {}",
                sample.image_name,
                sample.image.dims(),
                sample.heatmaps.resolution(),
                [channels, height, width],
                resolution
            )));
        }
        images.extend_from_slice(&sample.image.data);
        heatmaps.extend_from_slice(sample.heatmaps.as_slice());
        keypoints.extend(sample.keypoints.to_flat());
        image_names.push(sample.image_name.clone());
    }

    Ok(HeatmapBatch {
        images: Tensor::from_data(
            TensorData::new(images, [batch, channels, height, width]),
            device,
        ),
        heatmaps: Tensor::from_data(
            TensorData::new(heatmaps, [batch, NUM_KEYPOINTS, resolution, resolution]),
            device,
        ),
        keypoints: Tensor::from_data(TensorData::new(keypoints, [batch, NUM_KEYPOINTS, 2]), device),
        image_names,
    })
}
