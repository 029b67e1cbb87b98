//! Epoch loop: train, evaluate, schedule, checkpoint, early stop.

use crate::checkpoint::{checkpoint_due, checkpoint_name, CheckpointSink, FINAL_CHECKPOINT};
use crate::config::TrainConfig;
use crate::loss::IouLoss;
use crate::scheduler::EpochLrScheduler;
use crate::state::{EarlyStopping, TrainingState};
use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use burn_dataset::BatchSource;
use models::HeatmapModel;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSettings {
    pub epochs: usize,
    /// Upper bound on optimizer steps per epoch.
    pub batches_per_epoch: usize,
    pub batches_per_epoch_val: usize,
    pub learning_rate: f64,
    pub checkpoint_frequency: usize,
    pub early_stopping: EarlyStopping,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self::from(&TrainConfig::default())
    }
}

impl From<&TrainConfig> for TrainerSettings {
    fn from(cfg: &TrainConfig) -> Self {
        Self {
            epochs: cfg.epochs,
            batches_per_epoch: cfg.batches_per_epoch,
            batches_per_epoch_val: cfg.batches_per_epoch_val,
            learning_rate: cfg.learning_rate,
            checkpoint_frequency: cfg.checkpoint_frequency,
            early_stopping: EarlyStopping {
                patience: cfg.early_stopping_epochs,
                window: cfg.early_stopping_avg,
                precision: cfg.early_stopping_precision,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Validation loss stopped improving.
    Converged,
    /// Every configured epoch ran.
    Exhausted,
}

pub struct TrainReport<M> {
    pub model: M,
    pub state: TrainingState,
    pub stop_reason: StopReason,
    /// Paths returned by the checkpoint sink, final checkpoint last.
    pub checkpoints: Vec<PathBuf>,
    /// Rate the next epoch would have used.
    pub final_learning_rate: f64,
}

impl<M> TrainReport<M> {
    pub fn epochs_run(&self) -> usize {
        self.state.epochs()
    }
}

/// Owns the model and optimizer for one run.
pub struct Trainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + HeatmapModel<B>,
    M::InnerModule: HeatmapModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    model: M,
    optimizer: O,
    loss: IouLoss,
    scheduler: Option<Box<dyn EpochLrScheduler>>,
    settings: TrainerSettings,
    lr: f64,
    device: B::Device,
}

impl<B, M, O> Trainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + HeatmapModel<B>,
    M::InnerModule: HeatmapModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(model: M, optimizer: O, settings: TrainerSettings, device: B::Device) -> Self {
        Self {
            model,
            optimizer,
            loss: IouLoss::default(),
            scheduler: None,
            lr: settings.learning_rate,
            settings,
            device,
        }
    }

    pub fn with_scheduler(mut self, scheduler: impl EpochLrScheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn with_loss(mut self, loss: IouLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    /// Run until early stopping or the epoch budget, then save [`FINAL_CHECKPOINT`].
    ///
    /// Both sources are reset at the start of every epoch. A non-finite loss or
    /// an empty source aborts the run.
    pub fn fit<T, V, C>(
        mut self,
        train: &mut T,
        val: &mut V,
        sink: &mut C,
    ) -> anyhow::Result<TrainReport<M>>
    where
        T: BatchSource,
        V: BatchSource,
        C: CheckpointSink<B, M>,
    {
        let mut state = TrainingState::new();
        let mut checkpoints = Vec::new();
        let mut stop_reason = StopReason::Exhausted;
        let epochs = self.settings.epochs;

        for epoch in 0..epochs {
            let train_loss = self.train_epoch(train, epoch)?;
            state.record_train(train_loss);
            let val_loss = self.eval_epoch(val, epoch)?;
            state.record_val(val_loss);
            log::info!(
                "Epoch: {}/{}, train_loss={:.10}, val_loss={:.10}, lr={:.3e}",
                epoch + 1,
                epochs,
                train_loss,
                val_loss,
                self.lr
            );

            if let Some(scheduler) = self.scheduler.as_mut() {
                self.lr = scheduler.step(train_loss);
            }

            if checkpoint_due(epoch, self.settings.checkpoint_frequency) {
                checkpoints.push(sink.save(&self.model, &checkpoint_name(epoch))?);
            }

            if state.update_early_stopping(epoch, &self.settings.early_stopping) {
                log::info!("{}", early_stop_summary(epoch, &state));
                stop_reason = StopReason::Converged;
                break;
            }
        }

        checkpoints.push(sink.save(&self.model, FINAL_CHECKPOINT)?);
        Ok(TrainReport {
            model: self.model,
            state,
            stop_reason,
            checkpoints,
            final_learning_rate: self.lr,
        })
    }

    fn train_epoch<T: BatchSource>(&mut self, source: &mut T, epoch: usize) -> anyhow::Result<f64> {
        source.reset();
        let mut losses = Vec::with_capacity(self.settings.batches_per_epoch);
        while losses.len() < self.settings.batches_per_epoch {
            let Some(batch) = source.next_batch::<B>(&self.device)? else {
                break;
            };
            let preds = self.model.forward_heatmaps(batch.images);
            let loss = self.loss.forward(preds, batch.heatmaps);
            let value = scalar(loss.clone());
            if !value.is_finite() {
                anyhow::bail!(
                    "non-finite training loss {value} at epoch {}, batch {}",
                    epoch + 1,
                    losses.len() + 1
                );
            }
            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optimizer.step(self.lr, self.model.clone(), grads);
            losses.push(value);
        }
        mean_loss(&losses, "training", epoch)
    }

    fn eval_epoch<V: BatchSource>(&self, source: &mut V, epoch: usize) -> anyhow::Result<f64> {
        source.reset();
        let model = self.model.valid();
        let mut losses = Vec::with_capacity(self.settings.batches_per_epoch_val);
        while losses.len() < self.settings.batches_per_epoch_val {
            let Some(batch) = source.next_batch::<B::InnerBackend>(&self.device)? else {
                break;
            };
            let preds = model.forward_heatmaps(batch.images);
            let value = scalar(self.loss.forward(preds, batch.heatmaps));
            if !value.is_finite() {
                anyhow::bail!(
                    "non-finite validation loss {value} at epoch {}, batch {}",
                    epoch + 1,
                    losses.len() + 1
                );
            }
            losses.push(value);
        }
        mean_loss(&losses, "validation", epoch)
    }
}

fn early_stop_summary(epoch: usize, state: &TrainingState) -> String {
    let best = state
        .min_val_loss()
        .map_or_else(|| "n/a".to_string(), |v| v.to_string());
    format!(
        "early stopping after epoch {} (best val {best}, {} epochs without improvement)",
        epoch + 1,
        state.no_improvement()
    )
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

fn mean_loss(losses: &[f64], phase: &str, epoch: usize) -> anyhow::Result<f64> {
    if losses.is_empty() {
        anyhow::bail!("{phase} source produced no batches in epoch {}", epoch + 1);
    }
    Ok(losses.iter().sum::<f64>() / losses.len() as f64)
}
