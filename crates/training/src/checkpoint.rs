//! Model checkpoints: naming, cadence and the Burn file recorder.

use anyhow::Context;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use models::{HeatmapNet, HeatmapNetConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the checkpoint written when a run ends, however it ends.
pub const FINAL_CHECKPOINT: &str = "model_final";

/// True after every `frequency`-th epoch (`epoch` is zero based).
pub fn checkpoint_due(epoch: usize, frequency: usize) -> bool {
    frequency > 0 && (epoch + 1) % frequency == 0
}

/// `model_001`, `model_100`, `model_1200`.
pub fn checkpoint_name(epoch: usize) -> String {
    format!("model_{:03}", epoch + 1)
}

/// Destination for model snapshots taken by the trainer.
pub trait CheckpointSink<B: Backend, M: Module<B>> {
    /// Persist `model` under `name` and return where it was written.
    fn save(&mut self, model: &M, name: &str) -> anyhow::Result<PathBuf>;
}

/// Writes parameters only, full precision, into one directory.
pub struct FileCheckpointer {
    dir: PathBuf,
    recorder: BinFileRecorder<FullPrecisionSettings>,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create checkpoint dir {}", dir.display()))?;
        Ok(Self {
            dir,
            recorder: BinFileRecorder::<FullPrecisionSettings>::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl<B: Backend, M: Module<B>> CheckpointSink<B, M> for FileCheckpointer {
    fn save(&mut self, model: &M, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(name);
        model
            .clone()
            .save_file(path.clone(), &self.recorder)
            .map_err(|e| anyhow::anyhow!("failed to save checkpoint {}: {e}", path.display()))?;
        // The recorder owns the extension.
        let written = path.with_extension("bin");
        log::info!("saved checkpoint {}", written.display());
        Ok(written)
    }
}

/// Rebuild a [`HeatmapNet`] from a checkpoint written by [`FileCheckpointer`].
pub fn load_heatmap_net<B: Backend>(
    path: &Path,
    config: HeatmapNetConfig,
    device: &B::Device,
) -> Result<HeatmapNet<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    HeatmapNet::<B>::new(config, device).load_file(path.to_path_buf(), &recorder, device)
}
