//! Run configuration: a TOML file with CLI overrides on top.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("learning rate must be finite and non-negative, got {0}")]
    LearningRate(f64),
    #[error("early_stopping_precision {0} exceeds 15 decimal digits")]
    Precision(u32),
    #[error("invalid scheduler setting: {0}")]
    Scheduler(String),
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    #[value(name = "ndarray")]
    NdArray,
    Wgpu,
}

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Reduce-on-plateau settings, stepped with the epoch training loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateauConfig {
    pub enabled: bool,
    pub factor: f64,
    pub patience: usize,
    /// Relative improvement required to reset patience.
    pub threshold: f64,
    pub cooldown: usize,
    pub min_lr: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            factor: 0.5,
            patience: 20,
            threshold: 1e-5,
            cooldown: 0,
            min_lr: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// FreiHAND root with `training/rgb` and the annotation files.
    pub data_dir: PathBuf,
    /// Where checkpoints go; `data_dir` when unset.
    pub checkpoint_dir: Option<PathBuf>,
    pub device: BackendKind,
    pub epochs: usize,
    pub batch_size: usize,
    pub batches_per_epoch: usize,
    pub batches_per_epoch_val: usize,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    pub scheduler: PlateauConfig,
    pub checkpoint_frequency: usize,
    pub early_stopping_epochs: usize,
    pub early_stopping_avg: usize,
    pub early_stopping_precision: u32,
    /// Reshuffle the training split every epoch.
    pub shuffle: bool,
    pub seed: Option<u64>,
    /// Loader threads; rayon's default when unset.
    pub workers: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/FreiHAND_pub_v2"),
            checkpoint_dir: None,
            device: BackendKind::NdArray,
            epochs: 1000,
            batch_size: 48,
            batches_per_epoch: 50,
            batches_per_epoch_val: 20,
            learning_rate: 1e-3,
            optimizer: OptimizerKind::Adam,
            scheduler: PlateauConfig::default(),
            checkpoint_frequency: 100,
            early_stopping_epochs: 10,
            early_stopping_avg: 10,
            early_stopping_precision: 5,
            shuffle: true,
            seed: None,
            workers: None,
        }
    }
}

impl TrainConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn checkpoint_dir(&self) -> &Path {
        self.checkpoint_dir.as_deref().unwrap_or(&self.data_dir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("batches_per_epoch", self.batches_per_epoch),
            ("batches_per_epoch_val", self.batches_per_epoch_val),
            ("checkpoint_frequency", self.checkpoint_frequency),
            ("early_stopping_avg", self.early_stopping_avg),
        ];
        if let Some((field, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero { field: *field });
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Zero { field: "workers" });
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        if self.early_stopping_precision > 15 {
            return Err(ConfigError::Precision(self.early_stopping_precision));
        }
        let s = &self.scheduler;
        if s.enabled {
            if !(s.factor > 0.0 && s.factor < 1.0) {
                return Err(ConfigError::Scheduler(format!(
                    "factor must be in (0, 1), got {}",
                    s.factor
                )));
            }
            if !(s.threshold >= 0.0) || !(s.min_lr >= 0.0) {
                return Err(ConfigError::Scheduler(
                    "threshold and min_lr must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "train",
    about = "Train the hand keypoint heatmap network on FreiHAND"
)]
pub struct TrainArgs {
    /// TOML config file; flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// FreiHAND dataset root.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Checkpoint output directory (defaults to the dataset root).
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Backend to use (ndarray, or wgpu if built with backend-wgpu).
    #[arg(long, value_enum)]
    pub device: Option<BackendKind>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub batches_per_epoch: Option<usize>,
    #[arg(long)]
    pub batches_per_epoch_val: Option<usize>,
    /// Learning rate.
    #[arg(long)]
    pub lr: Option<f64>,
    #[arg(long, value_enum)]
    pub optimizer: Option<OptimizerKind>,
    #[arg(long)]
    pub checkpoint_frequency: Option<usize>,
    /// Seed for shuffling the training split.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Dataset loader threads.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Disable reduce-on-plateau.
    #[arg(long)]
    pub no_scheduler: bool,
}

impl TrainArgs {
    /// Load the config file (or defaults), apply overrides and validate.
    pub fn resolve(&self) -> Result<TrainConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => TrainConfig::from_path(path)?,
            None => TrainConfig::default(),
        };
        if let Some(v) = &self.data_dir {
            cfg.data_dir = v.clone();
        }
        if let Some(v) = &self.checkpoint_dir {
            cfg.checkpoint_dir = Some(v.clone());
        }
        if let Some(v) = self.device {
            cfg.device = v;
        }
        if let Some(v) = self.epochs {
            cfg.epochs = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.batches_per_epoch {
            cfg.batches_per_epoch = v;
        }
        if let Some(v) = self.batches_per_epoch_val {
            cfg.batches_per_epoch_val = v;
        }
        if let Some(v) = self.lr {
            cfg.learning_rate = v;
        }
        if let Some(v) = self.optimizer {
            cfg.optimizer = v;
        }
        if let Some(v) = self.checkpoint_frequency {
            cfg.checkpoint_frequency = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = Some(v);
        }
        if let Some(v) = self.workers {
            cfg.workers = Some(v);
        }
        if self.no_scheduler {
            cfg.scheduler.enabled = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
