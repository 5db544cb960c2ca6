// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    train_use_case::TrainConfig,
};
use crate::ml::{backend::ComputeDevice, model::ModelKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier on {data-dir}/train, validating on {data-dir}/val
    Train(TrainArgs),

    /// Score the latest run's best checkpoint on {data-dir}/test
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset root containing train/ and val/ class folders
    #[arg(long, default_value = "data/COVID-19_Radiography_Dataset")]
    pub data_dir: PathBuf,

    /// Where the best checkpoint and run manifest are written
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: PathBuf,

    /// Where the per-epoch metrics CSV is written
    #[arg(long, default_value = "outputs/CSVs")]
    pub csv_dir: PathBuf,

    /// Model architecture
    #[arg(long, value_enum, default_value_t = ModelKind::Cnn)]
    pub model: ModelKind,

    /// Name for output files (defaults to the model name)
    #[arg(long)]
    pub run_name: Option<String>,

    /// Compute device
    #[arg(long, value_enum, default_value_t = ComputeDevice::Cpu)]
    pub device: ComputeDevice,

    /// Images are resized to image_size × image_size
    #[arg(long, default_value_t = 224)]
    pub image_size: u32,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 3e-5)]
    pub lr: f64,

    /// Data loader worker threads
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Seed for weight init, shuffling and training-set flips
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Dropout before the classifier head (cnn only)
    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    /// Hide the per-batch progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            csv_dir:        a.csv_dir,
            model:          a.model,
            run_name:       a.run_name,
            device:         a.device,
            image_size:     a.image_size,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            num_workers:    a.num_workers,
            seed:           a.seed,
            dropout:        a.dropout,
            progress:       !a.no_progress,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Dataset root containing test/ class folders
    #[arg(long, default_value = "data/COVID-19_Radiography_Dataset")]
    pub data_dir: PathBuf,

    /// Directory the training run wrote its checkpoint to
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ComputeDevice::Cpu)]
    pub device: ComputeDevice,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    #[arg(long)]
    pub no_progress: bool,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            device:         a.device,
            batch_size:     a.batch_size,
            num_workers:    a.num_workers,
            progress:       !a.no_progress,
        }
    }
}
