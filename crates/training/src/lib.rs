#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod loss;
pub mod metrics;
pub mod scheduler;
pub mod state;
pub mod trainer;
pub mod util;

pub use checkpoint::{
    checkpoint_due, checkpoint_name, load_heatmap_net, CheckpointSink, FileCheckpointer,
    FINAL_CHECKPOINT,
};
pub use config::{BackendKind, ConfigError, OptimizerKind, PlateauConfig, TrainArgs, TrainConfig};
pub use loss::IouLoss;
pub use metrics::{evaluate, EvalReport, KeypointMetrics};
pub use models::{HeatmapModel, HeatmapNet, HeatmapNetConfig};
pub use scheduler::{EpochLrScheduler, ReduceOnPlateau};
pub use state::{round_to, EarlyStopping, TrainingState};
pub use trainer::{StopReason, TrainReport, Trainer, TrainerSettings};
pub use util::{init_logging, run_eval, run_train, train_with_config, EvalArgs};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
