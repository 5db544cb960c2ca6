// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — fit a model, keep the best checkpoint,
//                   write per-epoch metrics to CSV
//   2. `evaluate` — score that checkpoint on the test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "xray-fit",
    version,
    about = "Train a chest X-ray image classifier, then evaluate its best checkpoint."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on images in: {}", args.data_dir.display());

    let history = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. {} epochs recorded.", history.len());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.into()).execute()?;

    println!(
        "\nRun {} | test samples={} | loss={:.6} | acc={:.2}%",
        report.run,
        report.samples,
        report.loss,
        report.accuracy * 100.0,
    );
    Ok(())
}
