// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and training-loop code lives here.
//
//   backend.rs   — cpu / wgpu backend aliases and device tags
//
//   model.rs     — ImageClassifier trait plus two architectures:
//                  • XrayCnn: 3 conv blocks + global pool + head
//                  • LinearClassifier: one layer over raw pixels
//
//   loss.rs      — ClassificationLoss trait, cross-entropy impl
//
//   trainer.rs   — TrainingLoop: train pass, validation pass,
//                  best-checkpoint decision, metrics history
//
//   evaluator.rs — gradient-free passes, correctness count,
//                  test-split scoring of a saved checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backend aliases and device selection
pub mod backend;

/// Image classifier architectures
pub mod model;

/// Loss functions used by the loop
pub mod loss;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Evaluation passes and checkpoint scoring
pub mod evaluator;
