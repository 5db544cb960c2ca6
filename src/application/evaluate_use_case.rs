// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores the best checkpoint of the latest training run on the
// held-out test split:
//
//   Step 1: Read latest_run.json → run manifest (Layer 6)
//   Step 2: List test images, check classes match (Layer 4)
//   Step 3: Rebuild model, load weights, run one   (Layer 5)
//           gradient-free pass
//
// Evaluation can run on a different device than training did;
// the record loads onto whichever backend is selected.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::data::{loader::ImageFolder, split_loader, LoaderSettings};
use crate::domain::sample::Split;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    backend::{ComputeDevice, CpuBackend, GpuBackend},
    evaluator::evaluate_checkpoint,
    loss::CrossEntropy,
};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub data_dir:       PathBuf,
    pub checkpoint_dir: PathBuf,
    pub device:         ComputeDevice,
    pub batch_size:     usize,
    pub num_workers:    usize,
    pub progress:       bool,
}

/// Test-split result for one checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub run:      String,
    pub samples:  usize,
    pub loss:     f64,
    pub accuracy: f64,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TestReport> {
        let cfg = &self.config;
        if cfg.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }

        // ── Step 1: Which run, which architecture ─────────────────────────────
        let checkpoints = CheckpointManager::latest(&cfg.checkpoint_dir)?;
        let manifest    = checkpoints.load_manifest()?;
        tracing::info!("Evaluating run '{}'", checkpoints.stem());

        // ── Step 2: Test split ────────────────────────────────────────────────
        let test = ImageFolder::new(&cfg.data_dir).load_split(Split::Test)?;
        test.ensure_classes(&manifest.classes)?;
        let samples = test.samples.len();

        let settings = LoaderSettings {
            image_size:  manifest.config.image_size,
            batch_size:  cfg.batch_size,
            num_workers: cfg.num_workers,
            seed:        manifest.config.seed,
        };

        // ── Step 3: Score ─────────────────────────────────────────────────────
        let (loss, accuracy) = match cfg.device {
            ComputeDevice::Cpu => {
                let device = Default::default();
                let loader = split_loader::<CpuBackend>(test, &settings, &device);
                evaluate_checkpoint::<CpuBackend, _, _>(
                    &manifest, &checkpoints, &CrossEntropy, &loader, &device, cfg.progress,
                )?
            }
            ComputeDevice::Wgpu => {
                let device = Default::default();
                let loader = split_loader::<GpuBackend>(test, &settings, &device);
                evaluate_checkpoint::<GpuBackend, _, _>(
                    &manifest, &checkpoints, &CrossEntropy, &loader, &device, cfg.progress,
                )?
            }
        };

        Ok(TestReport {
            run: checkpoints.stem().to_string(),
            samples,
            loss,
            accuracy,
        })
    }
}
