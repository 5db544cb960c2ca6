// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — Best-model snapshot on disk
//                   Uses Burn's CompactRecorder; also stores a
//                   JSON run manifest so `evaluate` can rebuild
//                   the model before loading the weights.
//
//   metrics.rs    — Loss/accuracy bookkeeping
//                   Running totals per pass, per-epoch rows, the
//                   best-validation-loss tracker, and the CSV
//                   writer for the full history.
//
//   progress.rs   — Per-batch progress bars (indicatif)
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Epoch metrics, running totals and CSV output
pub mod metrics;

/// Console progress bars
pub mod progress;
