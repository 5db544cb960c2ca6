// ============================================================
// Layer 5 — Training Loop
// ============================================================
// For a fixed number of epochs:
//
//   1. Training pass    — forward, loss, backward, one Adam step
//                         per batch (Autodiff backend)
//   2. Validation pass  — model.valid(), forward + loss only
//                         (inner backend, no autodiff graph)
//   3. Checkpoint       — overwrite the single snapshot when the
//                         validation loss ties or beats the best
//   4. Metrics          — push one EpochMetrics row
//
// After the last epoch the whole history is written to CSV.
//
// Loss and accuracy are normalised by the dataset sizes the
// data sources report, read once before the first epoch.
//
// Burn notes:
//   - loss.backward() builds a fresh gradient set every batch,
//     so there is nothing to zero between steps
//   - model.valid() returns the module on B::InnerBackend; it
//     has no optimizer path, so validation cannot mutate it
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::XrayBatch, loader::SplitListing, split_loader};
use crate::domain::traits::BatchSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{BestCheckpoint, EpochMetrics, EpochTotals, MetricsLogger},
    progress::{epoch_prefix, PassProgress},
};
use crate::ml::{
    evaluator::{ensure_batch_shape, evaluate_pass, num_correct},
    loss::{ClassificationLoss, CrossEntropy},
    model::{ImageClassifier, LinearClassifierConfig, ModelKind, XrayCnnConfig},
};

/// What a finished run hands back to the caller.
#[derive(Debug)]
pub struct TrainingRun<M> {
    /// Parameters after the last epoch (not necessarily the best ones)
    pub model:   M,
    /// One row per epoch, in epoch order
    pub history: Vec<EpochMetrics>,
    pub best:    BestCheckpoint,
}

/// The fit / validate / checkpoint loop.
pub struct TrainingLoop {
    epochs:        usize,
    lr:            f64,
    checkpoints:   CheckpointManager,
    metrics:       MetricsLogger,
    show_progress: bool,
}

impl TrainingLoop {
    pub fn new(epochs: usize, lr: f64, checkpoints: CheckpointManager, metrics: MetricsLogger) -> Self {
        Self { epochs, lr, checkpoints, metrics, show_progress: true }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn metrics(&self) -> &MetricsLogger {
        &self.metrics
    }

    /// Train for the configured number of epochs.
    ///
    /// Any error aborts the run: the current epoch is discarded and the
    /// CSV is not written. A checkpoint saved by an earlier epoch stays.
    pub fn run<B, M, O, L, T, V>(
        &self,
        mut model:  M,
        loss_fn:    &L,
        optim:      &mut O,
        train_data: &T,
        valid_data: &V,
    ) -> Result<TrainingRun<M>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + ImageClassifier<B>,
        M::InnerModule: ImageClassifier<B::InnerBackend>,
        O: Optimizer<M, B>,
        L: ClassificationLoss,
        T: BatchSource<XrayBatch<B>> + ?Sized,
        V: BatchSource<XrayBatch<B::InnerBackend>> + ?Sized,
    {
        // ── Dataset sizes, read once ──────────────────────────────────────────
        let train_len = train_data.num_items();
        let valid_len = valid_data.num_items();
        if self.epochs > 0 && (train_len == 0 || valid_len == 0) {
            bail!(
                "Cannot train on empty splits (train={}, valid={})",
                train_len,
                valid_len
            );
        }
        tracing::info!(
            "Training for {} epochs: {} train / {} valid samples, lr={}",
            self.epochs, train_len, valid_len, self.lr
        );

        let mut best    = BestCheckpoint::new();
        let mut history = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            let prefix = epoch_prefix(epoch, self.epochs);

            // ── Training phase ────────────────────────────────────────────────
            let progress = PassProgress::new(self.show_progress, train_len, prefix.clone())?;
            let (trained, train_totals) = self.train_pass::<B, M, O, L, T>(model, loss_fn, optim, train_data, &progress)?;
            model = trained;
            progress.finish();
            let (train_loss, train_acc) = train_totals.finish(train_len)?;

            // ── Validation phase ──────────────────────────────────────────────
            let model_valid  = model.valid();
            let progress     = PassProgress::new(self.show_progress, valid_len, format!("{prefix} valid"))?;
            let valid_totals = evaluate_pass::<B::InnerBackend, _, _, _>(&model_valid, loss_fn, valid_data, &progress)?;
            progress.finish();
            let (valid_loss, valid_acc) = valid_totals.finish(valid_len)?;

            println!("\t\tAvg train loss: {train_loss:.6}\tAvg valid loss: {valid_loss:.6}");

            // ── Checkpoint decision ───────────────────────────────────────────
            if best.is_improvement(valid_loss) {
                println!(
                    "\t\tvalid_loss decreased ({:.6} -> {:.6})\n\t\tsaving model...",
                    best.best_loss(),
                    valid_loss
                );
                self.checkpoints.save_best::<B, M>(&model)?;
                best.record_save(epoch, valid_loss);
                tracing::info!(
                    "Epoch {}: checkpoint saved to '{}'",
                    epoch,
                    self.checkpoints.checkpoint_path().display()
                );
            }

            // ── Metrics recording ─────────────────────────────────────────────
            history.push(EpochMetrics { epoch, train_loss, train_acc, valid_loss, valid_acc });
        }

        self.metrics.write_all(&history)?;

        tracing::info!(
            "Training complete. Best valid loss {:.6} at epoch {:?}",
            best.best_loss(),
            best.best_epoch()
        );
        Ok(TrainingRun { model, history, best })
    }

    /// One pass over the training split, one optimizer step per batch.
    fn train_pass<B, M, O, L, T>(
        &self,
        mut model:  M,
        loss_fn:    &L,
        optim:      &mut O,
        train_data: &T,
        progress:   &PassProgress,
    ) -> Result<(M, EpochTotals)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + ImageClassifier<B>,
        O: Optimizer<M, B>,
        L: ClassificationLoss,
        T: BatchSource<XrayBatch<B>> + ?Sized,
    {
        let mut totals = EpochTotals::new();

        for batch in train_data.batches() {
            let batch_len = batch.len();
            let logits    = model.forward(batch.images);
            ensure_batch_shape(&logits, &batch.labels)?;

            let correct = num_correct(&logits, &batch.labels);
            let loss    = loss_fn.compute(logits, batch.labels);
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + optimizer update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(self.lr, model, grads);

            totals.record(loss_val, batch_len, correct);
            progress.batch(batch_len, loss_val, &totals);
        }

        Ok((model, totals))
    }
}

/// Build loaders, model and optimizer from `cfg` and run the loop on `B`.
pub fn run_training<B: AutodiffBackend>(
    cfg:         &TrainConfig,
    train:       SplitListing,
    valid:       SplitListing,
    checkpoints: CheckpointManager,
    metrics:     MetricsLogger,
    device:      B::Device,
) -> Result<Vec<EpochMetrics>> {
    B::seed(cfg.seed);

    let num_classes = train.classes.len();
    let settings    = cfg.loader_settings();

    // Training batches carry the autodiff backend, validation batches
    // the inner backend so the validation model can consume them.
    let train_loader = split_loader::<B>(train, &settings, &device);
    let valid_loader = split_loader::<B::InnerBackend>(valid, &settings, &device);

    let looper = TrainingLoop::new(cfg.epochs, cfg.lr, checkpoints, metrics)
        .with_progress(cfg.progress);
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);

    let history = match cfg.model {
        ModelKind::Cnn => {
            let model = XrayCnnConfig::new(num_classes)
                .with_dropout(cfg.dropout)
                .init::<B>(&device);
            tracing::info!("Model ready: XrayCnn, {} classes", num_classes);
            let mut optim = optim_cfg.init();
            let run = looper.run(model, &CrossEntropy, &mut optim, &train_loader, &valid_loader)?;
            tracing::debug!("Final XrayCnn has {} parameters", run.model.num_params());
            run.history
        }
        ModelKind::Linear => {
            let model = LinearClassifierConfig::new(cfg.input_features(), num_classes).init::<B>(&device);
            tracing::info!("Model ready: LinearClassifier, {} classes", num_classes);
            let mut optim = optim_cfg.init();
            let run = looper.run(model, &CrossEntropy, &mut optim, &train_loader, &valid_loader)?;
            tracing::debug!("Final LinearClassifier has {} parameters", run.model.num_params());
            run.history
        }
    };

    tracing::info!(
        "Best checkpoint: '{}', metrics: '{}'",
        looper.checkpoints().checkpoint_path().display(),
        looper.metrics().csv_path().display()
    );
    Ok(history)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::CSV_HEADER;
    use crate::ml::model::LinearClassifier;
    use burn::backend::{Autodiff, NdArray};
    use std::{cell::Cell, fs, path::Path};

    type Inner       = NdArray<f32>;
    type TestBackend = Autodiff<Inner>;

    const SIZE:     usize = 2;
    const FEATURES: usize = 3 * SIZE * SIZE;

    /// Pre-built batches, replayed identically every epoch.
    struct MemoryBatches<B: Backend> {
        batches: Vec<XrayBatch<B>>,
    }

    impl<B: Backend> BatchSource<XrayBatch<B>> for MemoryBatches<B> {
        fn num_items(&self) -> usize {
            self.batches.iter().map(|b| b.len()).sum()
        }

        fn batches(&self) -> Box<dyn Iterator<Item = XrayBatch<B>> + '_> {
            Box::new(self.batches.iter().cloned())
        }
    }

    /// Class 0 images are dark, class 1 images are bright.
    fn batch<B: Backend>(labels: &[i64], label_rows: usize) -> XrayBatch<B> {
        let device = Default::default();
        let pixels: Vec<f32> = labels
            .iter()
            .flat_map(|&l| vec![if l == 0 { -1.0 } else { 1.0 }; FEATURES])
            .collect();
        let n = labels.len();
        let label_values: Vec<i64> = labels.iter().copied().cycle().take(label_rows).collect();
        XrayBatch {
            images: Tensor::from_data(TensorData::new(pixels, [n, 3, SIZE, SIZE]), &device),
            labels: Tensor::from_data(TensorData::new(label_values, [label_rows]), &device),
        }
    }

    /// 4 training samples (2 per class) in two batches, 2 validation samples.
    fn scenario_data() -> (MemoryBatches<TestBackend>, MemoryBatches<Inner>) {
        let train = MemoryBatches { batches: vec![batch(&[0, 1], 2), batch(&[1, 0], 2)] };
        let valid = MemoryBatches { batches: vec![batch(&[0, 1], 2)] };
        (train, valid)
    }

    fn linear_model() -> LinearClassifier<TestBackend> {
        LinearClassifierConfig::new(FEATURES, 2).init(&Default::default())
    }

    fn training_loop(dir: &Path, epochs: usize, lr: f64) -> TrainingLoop {
        let ckpt    = CheckpointManager::new(dir.join("models"), "lr_test_linear_cpu").unwrap();
        let metrics = MetricsLogger::new(dir.join("csv"), "linear").unwrap();
        TrainingLoop::new(epochs, lr, ckpt, metrics).with_progress(false)
    }

    /// Cross-entropy scaled by how many times it has been called, so
    /// validation loss strictly grows from one epoch to the next.
    struct EscalatingLoss {
        calls: Cell<u32>,
    }

    impl ClassificationLoss for EscalatingLoss {
        fn compute<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
            self.calls.set(self.calls.get() + 1);
            CrossEntropy.compute(logits, targets).mul_scalar(self.calls.get() as f64)
        }
    }

    #[test]
    fn test_single_epoch_scenario() {
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let looper         = training_loop(tmp.path(), 1, 1e-2);
        let mut optim      = AdamConfig::new().init();

        let run = looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .unwrap();

        assert_eq!(run.history.len(), 1);
        assert_eq!(run.history[0].epoch, 0);
        assert!(looper.checkpoints().checkpoint_path().exists());

        let csv = fs::read_to_string(looper.metrics().csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert_eq!(csv.lines().next().unwrap(), CSV_HEADER.join(","));
    }

    #[test]
    fn test_epochs_in_order_and_metrics_in_range() {
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let looper         = training_loop(tmp.path(), 4, 1e-2);
        let mut optim      = AdamConfig::new().init();

        let run = looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .unwrap();

        let epochs: Vec<usize> = run.history.iter().map(|m| m.epoch).collect();
        assert_eq!(epochs, vec![0, 1, 2, 3]);
        for m in &run.history {
            assert!((0.0..=1.0).contains(&m.train_acc));
            assert!((0.0..=1.0).contains(&m.valid_acc));
            assert!(m.train_loss >= 0.0);
            assert!(m.valid_loss >= 0.0);
        }

        // The best epoch is the global minimum of the validation loss
        let min = run.history.iter().map(|m| m.valid_loss).fold(f64::INFINITY, f64::min);
        let best_epoch = run.best.best_epoch().unwrap();
        assert_eq!(run.history[best_epoch].valid_loss, min);
    }

    #[test]
    fn test_zero_epochs_writes_header_only() {
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let looper         = training_loop(tmp.path(), 0, 1e-2);
        let mut optim      = AdamConfig::new().init();

        let run = looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .unwrap();

        assert!(run.history.is_empty());
        assert!(!looper.checkpoints().checkpoint_path().exists());
        let csv = fs::read_to_string(looper.metrics().csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_plateau_saves_every_epoch() {
        // lr = 0 leaves the weights untouched, so every validation loss ties
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let looper         = training_loop(tmp.path(), 3, 0.0);
        let mut optim      = AdamConfig::new().init();

        let run = looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .unwrap();

        assert_eq!(run.best.saved_epochs(), &[0, 1, 2]);
        assert_eq!(run.best.best_epoch(), Some(2));
    }

    #[test]
    fn test_rising_valid_loss_saves_only_first_epoch() {
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let looper         = training_loop(tmp.path(), 3, 0.0);
        let mut optim      = AdamConfig::new().init();
        let loss           = EscalatingLoss { calls: Cell::new(0) };

        let run = looper
            .run(linear_model(), &loss, &mut optim, &train, &valid)
            .unwrap();

        assert!(run.history[1].valid_loss > run.history[0].valid_loss);
        assert!(run.history[2].valid_loss > run.history[1].valid_loss);
        assert_eq!(run.best.saved_epochs(), &[0]);
        assert!(looper.checkpoints().checkpoint_path().exists());
    }

    #[test]
    fn test_checkpoint_on_disk_is_the_best_epoch() {
        // Training labels are the opposite of the validation labels, so
        // every step moves the model away from the validation optimum:
        // epoch 0 is the best one and later epochs must not overwrite it.
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let train = MemoryBatches {
            batches: train
                .batches
                .into_iter()
                .map(|b| XrayBatch { images: b.images, labels: b.labels.neg().add_scalar(1) })
                .collect(),
        };
        let looper     = training_loop(tmp.path(), 4, 5e-2);
        let mut optim  = AdamConfig::new().init();

        let run = looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .unwrap();
        assert_eq!(run.best.saved_epochs(), &[0]);
        let last = run.history.last().unwrap().valid_loss;
        assert!(last - run.history[0].valid_loss > 0.05);

        // Re-score whatever is on disk
        let device   = Default::default();
        let fresh    = LinearClassifierConfig::new(FEATURES, 2).init::<Inner>(&device);
        let restored = looper.checkpoints().load_model(fresh, &device).unwrap();
        let progress = PassProgress::new(false, valid.num_items(), String::new()).unwrap();
        let (loss, _) = evaluate_pass(&restored, &CrossEntropy, &valid, &progress)
            .unwrap()
            .finish(valid.num_items())
            .unwrap();

        // CompactRecorder stores half precision
        assert!((loss - run.history[0].valid_loss).abs() < 1e-2);
        assert!((loss - last).abs() > 1e-2);
    }

    #[test]
    fn test_identical_inputs_give_identical_metrics() {
        let tmp            = tempfile::tempdir().unwrap();
        let (train, valid) = scenario_data();
        let model          = linear_model();

        let mut runs = Vec::new();
        for i in 0..2 {
            let looper    = training_loop(&tmp.path().join(i.to_string()), 3, 1e-2);
            let mut optim = AdamConfig::new().init();
            let run = looper
                .run(model.clone(), &CrossEntropy, &mut optim, &train, &valid)
                .unwrap();
            runs.push(run.history);
        }

        assert_eq!(runs[0].len(), runs[1].len());
        for (a, b) in runs[0].iter().zip(&runs[1]) {
            assert_eq!(a.epoch, b.epoch);
            assert!((a.train_loss - b.train_loss).abs() < 1e-9);
            assert!((a.valid_loss - b.valid_loss).abs() < 1e-9);
            assert_eq!(a.train_acc, b.train_acc);
            assert_eq!(a.valid_acc, b.valid_acc);
        }
    }

    #[test]
    fn test_label_shape_mismatch_aborts_without_csv() {
        let tmp   = tempfile::tempdir().unwrap();
        let train = MemoryBatches::<TestBackend> { batches: vec![batch(&[0, 1], 3)] };
        let valid = MemoryBatches::<Inner> { batches: vec![batch(&[0, 1], 2)] };
        let looper    = training_loop(tmp.path(), 2, 1e-2);
        let mut optim = AdamConfig::new().init();

        let result = looper.run(linear_model(), &CrossEntropy, &mut optim, &train, &valid);

        assert!(result.is_err());
        assert!(!looper.metrics().csv_path().exists());
    }

    #[test]
    fn test_empty_split_is_rejected() {
        let tmp   = tempfile::tempdir().unwrap();
        let train = MemoryBatches::<TestBackend> { batches: Vec::new() };
        let (_, valid) = scenario_data();
        let looper    = training_loop(tmp.path(), 1, 1e-2);
        let mut optim = AdamConfig::new().init();

        assert!(looper
            .run(linear_model(), &CrossEntropy, &mut optim, &train, &valid)
            .is_err());
    }
}
