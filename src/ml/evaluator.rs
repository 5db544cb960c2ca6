// ============================================================
// Layer 5 — Evaluator
// ============================================================
// A gradient-free pass over a split: forward, loss, count the
// correct predictions. Shared by the validation phase of every
// epoch and by the `evaluate` command on the test split.
//
// A prediction is correct when argmax(logits) == label.

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::batcher::XrayBatch;
use crate::domain::traits::BatchSource;
use crate::infra::{
    checkpoint::{CheckpointManager, RunManifest},
    metrics::EpochTotals,
    progress::PassProgress,
};
use crate::ml::{
    loss::ClassificationLoss,
    model::{ImageClassifier, LinearClassifierConfig, ModelKind, XrayCnnConfig},
};

/// Number of rows whose highest score is at the label's index.
pub fn num_correct<B: Backend>(logits: &Tensor<B, 2>, labels: &Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1] — flatten to [batch] before comparing
    let hits: i64 = logits
        .clone()
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(labels.clone())
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    hits as usize
}

/// Predictions and labels must describe the same number of samples.
pub fn ensure_batch_shape<B: Backend>(logits: &Tensor<B, 2>, labels: &Tensor<B, 1, Int>) -> Result<()> {
    let [pred_rows, _] = logits.dims();
    let [label_rows]   = labels.dims();
    if pred_rows != label_rows {
        bail!(
            "Batch shape mismatch: {} prediction rows but {} labels",
            pred_rows,
            label_rows
        );
    }
    Ok(())
}

/// Run `model` over every batch of `data` without touching its parameters.
pub fn evaluate_pass<B, M, L, S>(
    model:    &M,
    loss_fn:  &L,
    data:     &S,
    progress: &PassProgress,
) -> Result<EpochTotals>
where
    B: Backend,
    M: ImageClassifier<B>,
    L: ClassificationLoss,
    S: BatchSource<XrayBatch<B>> + ?Sized,
{
    let mut totals = EpochTotals::new();

    for batch in data.batches() {
        let batch_len = batch.len();
        let logits    = model.forward(batch.images);
        ensure_batch_shape(&logits, &batch.labels)?;

        let correct = num_correct(&logits, &batch.labels);
        let loss: f64 = loss_fn
            .compute(logits, batch.labels)
            .into_scalar()
            .elem::<f64>();

        totals.record(loss, batch_len, correct);
        progress.batch(batch_len, loss, &totals);
    }

    Ok(totals)
}

/// Load the checkpoint described by `manifest` and score it on `data`.
/// Returns (loss, accuracy) normalised by the split size.
pub fn evaluate_checkpoint<B, L, S>(
    manifest:      &RunManifest,
    checkpoints:   &CheckpointManager,
    loss_fn:       &L,
    data:          &S,
    device:        &B::Device,
    show_progress: bool,
) -> Result<(f64, f64)>
where
    B: Backend,
    L: ClassificationLoss,
    S: BatchSource<XrayBatch<B>> + ?Sized,
{
    let cfg         = &manifest.config;
    let num_classes = manifest.classes.len();
    let dataset_len = data.num_items();
    let progress    = PassProgress::new(show_progress, dataset_len, "Evaluate".to_string())?;

    let totals = match cfg.model {
        ModelKind::Cnn => {
            let model = XrayCnnConfig::new(num_classes)
                .with_dropout(cfg.dropout)
                .init::<B>(device);
            let model = checkpoints.load_model(model, device)?;
            evaluate_pass(&model, loss_fn, data, &progress)?
        }
        ModelKind::Linear => {
            let model = LinearClassifierConfig::new(cfg.input_features(), num_classes).init::<B>(device);
            let model = checkpoints.load_model(model, device)?;
            evaluate_pass(&model, loss_fn, data, &progress)?
        }
    };
    progress.finish();

    totals.finish(dataset_len)
}
