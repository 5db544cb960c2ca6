// ============================================================
// Layer 6 — Progress Display
// ============================================================
// One indicatif bar per pass, counting samples (not batches):
//
//   Epoch [ 3/10] [00:41] ========>------- 9216/21005 loss=0.2931 acc=0.4110
//
// The message shows the latest batch loss and the running
// accuracy relative to the whole split. Purely informational.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::infra::metrics::EpochTotals;

pub struct PassProgress {
    bar:         ProgressBar,
    dataset_len: usize,
}

impl PassProgress {
    /// A visible bar when `enabled`, otherwise a hidden no-op one.
    pub fn new(enabled: bool, dataset_len: usize, prefix: String) -> Result<Self> {
        let bar = if enabled {
            let bar = ProgressBar::new(dataset_len as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?
                .progress_chars("=>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_prefix(prefix);
        Ok(Self { bar, dataset_len })
    }

    /// Advance by one batch. `totals` already includes it.
    pub fn batch(&self, batch_len: usize, batch_loss: f64, totals: &EpochTotals) {
        let acc = totals.running_acc(self.dataset_len);
        self.bar.inc(batch_len as u64);
        self.bar.set_message(format!("loss={batch_loss:.4} acc={acc:.4}"));
    }

    pub fn finish(self) {
        self.bar.finish();
    }
}

/// `Epoch [ 3/10]`, 1-based for display
pub fn epoch_prefix(epoch: usize, epochs: usize) -> String {
    format!("Epoch [{:2}/{}]", epoch + 1, epochs)
}
