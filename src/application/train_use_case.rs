// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 0: Reject settings the model cannot run with
//   Step 1: List train / val images         (Layer 4 - data)
//   Step 2: Check both splits agree on classes
//   Step 3: Prepare checkpoint + CSV outputs (Layer 6 - infra)
//   Step 4: Attach the run manifest          (Layer 6 - infra)
//   Step 5: Run the training loop            (Layer 5 - ml)
//           on the backend the config asks for
//
// Every setting the loop needs (device, output paths, names) is
// passed in through TrainConfig. There is no global state.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{loader::ImageFolder, preprocessor::CHANNELS, LoaderSettings};
use crate::domain::sample::Split;
use crate::infra::{
    checkpoint::{checkpoint_stem, CheckpointManager, RunManifest},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    backend::{ComputeDevice, CpuAutodiff, GpuAutodiff},
    model::{ModelKind, MIN_CNN_IMAGE_SIZE},
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Serialisable so it can be saved
// next to the checkpoint and reloaded by `evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       PathBuf,
    pub checkpoint_dir: PathBuf,
    pub csv_dir:        PathBuf,
    pub model:          ModelKind,
    /// Name used for output files; defaults to the model kind's name
    pub run_name:       Option<String>,
    pub device:         ComputeDevice,
    pub image_size:     u32,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub num_workers:    usize,
    pub seed:           u64,
    pub dropout:        f64,
    pub progress:       bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data/COVID-19_Radiography_Dataset"),
            checkpoint_dir: PathBuf::from("models"),
            csv_dir:        PathBuf::from("outputs/CSVs"),
            model:          ModelKind::Cnn,
            run_name:       None,
            device:         ComputeDevice::Cpu,
            image_size:     224,
            batch_size:     32,
            epochs:         10,
            lr:             3e-5,
            num_workers:    4,
            seed:           42,
            dropout:        0.2,
            progress:       true,
        }
    }
}

impl TrainConfig {
    pub fn run_name(&self) -> String {
        self.run_name
            .clone()
            .unwrap_or_else(|| self.model.name().to_string())
    }

    /// `{lr_tag}_{run_name}_{device}`
    pub fn checkpoint_stem(&self) -> String {
        checkpoint_stem(self.lr, &self.run_name(), self.device.tag())
    }

    /// Flattened input length for models that see raw pixels
    pub fn input_features(&self) -> usize {
        let side = self.image_size as usize;
        CHANNELS * side * side
    }

    /// Fail on sizes that would panic inside the backend instead.
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            bail!("image_size must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.model == ModelKind::Cnn && self.image_size < MIN_CNN_IMAGE_SIZE {
            bail!(
                "The CNN needs image_size >= {}, got {}",
                MIN_CNN_IMAGE_SIZE,
                self.image_size
            );
        }
        Ok(())
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            image_size:  self.image_size,
            batch_size:  self.batch_size,
            num_workers: self.num_workers,
            seed:        self.seed,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    /// Returns the per-epoch history that was also written to CSV.
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: List images ───────────────────────────────────────────────
        let folder = ImageFolder::new(&cfg.data_dir);
        let train  = folder.load_split(Split::Train)?;
        let valid  = folder.load_split(Split::Val)?;

        // ── Step 2: Class lists must line up ──────────────────────────────────
        valid.ensure_classes(&train.classes)?;
        tracing::info!("Classes: {:?} (train counts {:?})", train.classes, train.class_counts());

        // ── Step 3: Outputs ───────────────────────────────────────────────────
        let run_name    = cfg.run_name();
        let metrics     = MetricsLogger::new(&cfg.csv_dir, &run_name)?;

        // ── Step 4: Manifest for `evaluate` ───────────────────────────────────
        // Written next to each saved checkpoint, so it always matches the
        // record on disk even when this run dies before its first save.
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir, cfg.checkpoint_stem())?
            .with_manifest(RunManifest {
                config:  cfg.clone(),
                classes: train.classes.clone(),
            });

        // ── Step 5: Training loop on the selected backend ─────────────────────
        tracing::info!("Run '{}' on device '{}'", run_name, cfg.device);
        match cfg.device {
            ComputeDevice::Cpu => run_training::<CpuAutodiff>(
                cfg, train, valid, checkpoints, metrics, Default::default(),
            ),
            ComputeDevice::Wgpu => run_training::<GpuAutodiff>(
                cfg, train, valid, checkpoints, metrics, Default::default(),
            ),
        }
    }
}
