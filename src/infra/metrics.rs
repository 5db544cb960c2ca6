// ============================================================
// Layer 6 — Metrics
// ============================================================
// Everything the training loop counts:
//
//   EpochTotals     — running sums for one pass over a split
//   EpochMetrics    — the five numbers recorded per epoch
//   BestCheckpoint  — minimum validation loss seen so far
//   MetricsLogger   — writes the whole history to CSV at the end
//
// Example CSV output:
//   epoch,train_loss,train_acc,valid_loss,valid_acc
//   0,1.2031,0.4512,1.0127,0.5625
//   1,0.9345,0.6180,0.8841,0.6875
//
// The CSV is written once after the last epoch, never appended
// to: an interrupted run leaves no CSV behind.
//
// Reference: csv crate documentation (Writer, serde support)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Header row, in the same order as the EpochMetrics fields
pub const CSV_HEADER: [&str; 5] = ["epoch", "train_loss", "train_acc", "valid_loss", "valid_acc"];

/// One row of the metrics history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 0-based epoch index
    pub epoch: usize,

    /// Sum of (batch loss × batch size) over the train split / train size
    pub train_loss: f64,

    /// Correct train predictions / train size, in [0, 1]
    pub train_acc: f64,

    pub valid_loss: f64,

    pub valid_acc: f64,
}

// ─── EpochTotals ──────────────────────────────────────────────────────────────
/// Running totals for one pass over a split.
#[derive(Debug, Clone, Default)]
pub struct EpochTotals {
    loss_sum: f64,
    correct:  usize,
    seen:     usize,
}

impl EpochTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch. `batch_loss` is the mean loss over the batch, so it
    /// is weighted by the batch size before summing.
    pub fn record(&mut self, batch_loss: f64, batch_len: usize, correct: usize) {
        self.loss_sum += batch_loss * batch_len as f64;
        self.correct  += correct;
        self.seen     += batch_len;
    }

    /// Accuracy so far, relative to the whole split (matches the
    /// progress display, which grows towards the final accuracy)
    pub fn running_acc(&self, dataset_len: usize) -> f64 {
        if dataset_len == 0 {
            return 0.0;
        }
        self.correct as f64 / dataset_len as f64
    }

    /// Normalise by the dataset length → (loss, accuracy).
    ///
    /// Fails if the pass did not see exactly `dataset_len` samples,
    /// which means a batch went missing and the averages would be wrong.
    pub fn finish(&self, dataset_len: usize) -> Result<(f64, f64)> {
        if self.seen != dataset_len {
            bail!(
                "Pass saw {} samples but the dataset holds {}",
                self.seen,
                dataset_len
            );
        }
        if dataset_len == 0 {
            bail!("Cannot average over an empty dataset");
        }
        let n = dataset_len as f64;
        Ok((self.loss_sum / n, self.correct as f64 / n))
    }
}

// ─── BestCheckpoint ───────────────────────────────────────────────────────────
/// Tracks the minimum validation loss of the run.
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    best_loss:    f64,
    best_epoch:   Option<usize>,
    saved_epochs: Vec<usize>,
}

impl Default for BestCheckpoint {
    fn default() -> Self {
        Self {
            best_loss:    f64::INFINITY,
            best_epoch:   None,
            saved_epochs: Vec::new(),
        }
    }
}

impl BestCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `valid_loss` ties or beats the best so far.
    /// Ties count, so on a plateau the latest epoch wins.
    pub fn is_improvement(&self, valid_loss: f64) -> bool {
        valid_loss <= self.best_loss
    }

    /// Record that `epoch` was saved with `valid_loss`.
    /// Returns the previous best for logging.
    pub fn record_save(&mut self, epoch: usize, valid_loss: f64) -> f64 {
        let previous = self.best_loss;
        self.best_loss  = valid_loss;
        self.best_epoch = Some(epoch);
        self.saved_epochs.push(epoch);
        previous
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Every epoch that overwrote the checkpoint, in order
    pub fn saved_epochs(&self) -> &[usize] {
        &self.saved_epochs
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Writes the per-epoch history to `{dir}/{run_name}.csv`.
#[derive(Debug, Clone)]
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl Into<PathBuf>, run_name: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        Ok(Self { csv_path: dir.join(format!("{run_name}.csv")) })
    }

    /// Write the header plus one row per epoch, replacing any old file.
    /// The header is written even when `rows` is empty.
    pub fn write_all(&self, rows: &[EpochMetrics]) -> Result<()> {
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.csv_path)
            .with_context(|| format!("Cannot create '{}'", self.csv_path.display()))?;

        w.write_record(CSV_HEADER)?;
        for row in rows {
            w.serialize(row)?;
        }
        w.flush()?;

        tracing::info!("Wrote {} epoch rows to '{}'", rows.len(), self.csv_path.display());
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: usize, valid_loss: f64) -> EpochMetrics {
        EpochMetrics { epoch, train_loss: 0.5, train_acc: 0.75, valid_loss, valid_acc: 0.5 }
    }

    #[test]
    fn test_totals_weight_by_batch_size() {
        let mut t = EpochTotals::new();
        t.record(1.0, 3, 2);
        t.record(4.0, 1, 1);
        let (loss, acc) = t.finish(4).unwrap();
        // (1.0 * 3 + 4.0 * 1) / 4
        assert!((loss - 1.75).abs() < 1e-12);
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_running_acc_is_relative_to_whole_split() {
        let mut t = EpochTotals::new();
        t.record(0.5, 2, 2);
        assert!((t.running_acc(8) - 0.25).abs() < 1e-12);
        assert_eq!(t.running_acc(0), 0.0);
    }

    #[test]
    fn test_short_pass_is_an_error() {
        let mut t = EpochTotals::new();
        t.record(1.0, 2, 1);
        assert!(t.finish(3).is_err());
        assert!(EpochTotals::new().finish(0).is_err());
    }

    #[test]
    fn test_best_checkpoint_ties_trigger_save() {
        let mut best = BestCheckpoint::new();
        assert!(best.is_improvement(f64::MAX));
        assert_eq!(best.record_save(0, 0.8), f64::INFINITY);

        assert!(best.is_improvement(0.8));
        assert!(!best.is_improvement(0.81));
        best.record_save(1, 0.8);

        assert_eq!(best.best_epoch(), Some(1));
        assert_eq!(best.saved_epochs(), &[0, 1]);
    }

    #[test]
    fn test_csv_header_and_rows() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path().join("csv"), "xraycnn").unwrap();
        logger.write_all(&[row(0, 0.9), row(1, 0.7)]).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,train_loss,train_acc,valid_loss,valid_acc");
        assert!(lines[2].starts_with("1,0.5,0.75,0.7,"));
        assert!(logger.csv_path().ends_with("xraycnn.csv"));
    }

    #[test]
    fn test_csv_header_written_without_rows() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path(), "linear").unwrap();
        logger.write_all(&[]).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
