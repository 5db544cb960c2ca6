// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop never talks to a concrete data loader.
// It only needs two things from a split:
//   - how many samples it holds (to normalise loss/accuracy)
//   - a fresh pass over its batches, once per epoch
//
// Burn's DataLoader satisfies this (see data/mod.rs), and so
// does any in-memory list of batches used in tests.

/// A finite, restartable sequence of batches.
///
/// `batches()` is called once per epoch and must start from the
/// beginning every time.
pub trait BatchSource<O> {
    /// Number of samples (not batches) behind this source
    fn num_items(&self) -> usize;

    /// Start a new pass over every batch
    fn batches(&self) -> Box<dyn Iterator<Item = O> + '_>;
}
