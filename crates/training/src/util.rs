use burn::backend::Autodiff;
use burn::optim::{AdamConfig, Optimizer, SgdConfig};
use burn::tensor::backend::Backend;
use burn_dataset::{BatchConfig, BatchIter, FreiHand};
use clap::Parser;
use data_contracts::{DatasetSplit, SplitRanges};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checkpoint::{load_heatmap_net, FileCheckpointer};
use crate::config::{BackendKind, OptimizerKind, TrainArgs, TrainConfig};
use crate::metrics::{evaluate, EvalReport};
use crate::scheduler::ReduceOnPlateau;
use crate::trainer::{TrainReport, Trainer, TrainerSettings};
use crate::{HeatmapNet, HeatmapNetConfig, TrainBackend};

type ADBackend = Autodiff<TrainBackend>;

/// `info` by default; `RUST_LOG` takes precedence.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            log::warn!("built with backend-wgpu; running on the WGPU backend despite device = ndarray");
        }
        _ => {}
    }
    Ok(())
}

/// Size the global rayon pool used by the dataset loader.
fn configure_workers(workers: Option<usize>) {
    if let Some(n) = workers {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            log::warn!("loader pool already initialized, keeping it ({e})");
        }
    }
}

fn open_split(root: &Path, split: DatasetSplit) -> anyhow::Result<FreiHand> {
    let dataset = FreiHand::open(root, split, &SplitRanges::default()).map_err(|e| {
        anyhow::anyhow!(
            "failed to open {split} split of FreiHAND at {}: {e}",
            root.display()
        )
    })?;
    log::info!("{split} split: {} samples", dataset.len());
    Ok(dataset)
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainReport<HeatmapNet<ADBackend>>> {
    let cfg = args.resolve()?;
    train_with_config(&cfg)
}

pub fn train_with_config(cfg: &TrainConfig) -> anyhow::Result<TrainReport<HeatmapNet<ADBackend>>> {
    cfg.validate()?;
    validate_backend_choice(cfg.device)?;
    configure_workers(cfg.workers);

    let mut train = BatchIter::new(
        Arc::new(open_split(&cfg.data_dir, DatasetSplit::Train)?),
        BatchConfig {
            batch_size: cfg.batch_size,
            shuffle: cfg.shuffle,
            seed: cfg.seed,
            drop_last: false,
        },
    );
    let mut val = BatchIter::new(
        Arc::new(open_split(&cfg.data_dir, DatasetSplit::Val)?),
        BatchConfig {
            batch_size: cfg.batch_size,
            ..Default::default()
        },
    );

    let device = <ADBackend as Backend>::Device::default();
    let model = HeatmapNet::<ADBackend>::new(HeatmapNetConfig::default(), &device);
    let mut sink = FileCheckpointer::new(cfg.checkpoint_dir())?;
    let settings = TrainerSettings::from(cfg);
    log::info!(
        "training {} epochs, optimizer {:?}, lr {}, checkpoints in {}",
        cfg.epochs,
        cfg.optimizer,
        cfg.learning_rate,
        sink.dir().display()
    );

    let report = match cfg.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().init::<ADBackend, HeatmapNet<ADBackend>>();
            fit_with(
                Trainer::new(model, optim, settings, device),
                cfg,
                &mut train,
                &mut val,
                &mut sink,
            )?
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init::<ADBackend, HeatmapNet<ADBackend>>();
            fit_with(
                Trainer::new(model, optim, settings, device),
                cfg,
                &mut train,
                &mut val,
                &mut sink,
            )?
        }
    };
    log::info!(
        "finished after {} epochs ({:?})",
        report.epochs_run(),
        report.stop_reason
    );
    Ok(report)
}

fn fit_with<O>(
    trainer: Trainer<ADBackend, HeatmapNet<ADBackend>, O>,
    cfg: &TrainConfig,
    train: &mut BatchIter,
    val: &mut BatchIter,
    sink: &mut FileCheckpointer,
) -> anyhow::Result<TrainReport<HeatmapNet<ADBackend>>>
where
    O: Optimizer<HeatmapNet<ADBackend>, ADBackend>,
{
    let trainer = if cfg.scheduler.enabled {
        trainer.with_scheduler(ReduceOnPlateau::new(cfg.learning_rate, &cfg.scheduler))
    } else {
        trainer
    };
    trainer.fit(train, val, sink)
}

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a HeatmapNet checkpoint on a FreiHAND split (IoU loss, pixel error, PCK)"
)]
pub struct EvalArgs {
    /// FreiHAND dataset root.
    #[arg(long, default_value = "data/FreiHAND_pub_v2")]
    pub data_dir: PathBuf,
    /// Checkpoint to load (the `.bin` extension is optional).
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// Split to evaluate: train, val or test.
    #[arg(long, default_value = "test")]
    pub split: DatasetSplit,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub device: BackendKind,
    #[arg(long, default_value_t = 48)]
    pub batch_size: usize,
    /// Stop after this many batches.
    #[arg(long)]
    pub max_batches: Option<usize>,
    /// PCK threshold in pixels of the 224px source image.
    #[arg(long, default_value_t = 10.0)]
    pub pck_threshold: f32,
}

pub fn run_eval(args: EvalArgs) -> anyhow::Result<EvalReport> {
    validate_backend_choice(args.device)?;
    if args.batch_size == 0 {
        anyhow::bail!("batch_size must be greater than zero");
    }
    let device = <TrainBackend as Backend>::Device::default();
    let model = load_heatmap_net::<TrainBackend>(&args.checkpoint, HeatmapNetConfig::default(), &device)
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to load checkpoint {}: {e:?}",
                args.checkpoint.display()
            )
        })?;
    let mut source = BatchIter::new(
        Arc::new(open_split(&args.data_dir, args.split)?),
        BatchConfig {
            batch_size: args.batch_size,
            ..Default::default()
        },
    );
    evaluate::<TrainBackend, _, _>(
        &model,
        &mut source,
        &device,
        args.max_batches,
        args.pck_threshold,
    )
}
