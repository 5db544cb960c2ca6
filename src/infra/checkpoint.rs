// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Keeps exactly one model snapshot on disk: the epoch with the
// lowest validation loss seen so far. Every improvement
// overwrites the same file, nothing is versioned.
//
// What gets written:
//   1. {stem}.mpk         — model record (Burn CompactRecorder)
//   2. {stem}.json        — RunManifest: training config + classes
//   3. latest_run.json    — the stem of the most recent run
//
// 2 and 3 are rewritten right after every record save, never
// before the first one: a run that dies before saving anything
// leaves the previous run's files pointing at each other.
//
// The stem is built from the run's explicit settings:
//   {lr_tag}_{run_name}_{device}     e.g. lr3e-5_xraycnn_wgpu
//
// The manifest is what lets `evaluate` rebuild the exact
// architecture before loading weights into it; a record only
// loads into a module with the same structure.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;

/// Extension CompactRecorder (named MessagePack) appends to the checkpoint path
pub const CHECKPOINT_EXTENSION: &str = "mpk";

const LATEST_RUN_FILE: &str = "latest_run.json";

/// Learning-rate part of the file stem: 3e-5 → "lr3e-5"
pub fn lr_tag(lr: f64) -> String {
    format!("lr{lr:e}")
}

/// `{lr_tag}_{run_name}_{device}`
pub fn checkpoint_stem(lr: f64, run_name: &str, device_tag: &str) -> String {
    format!("{}_{}_{}", lr_tag(lr), run_name, device_tag)
}

/// Everything needed to rebuild the model a checkpoint belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub config:  TrainConfig,
    /// Class names in label order
    pub classes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir:      PathBuf,
    stem:     String,
    /// Written alongside each saved record
    manifest: Option<RunManifest>,
}

impl CheckpointManager {
    /// Creates the directory if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, stem: stem.into(), manifest: None })
    }

    /// Attach the manifest that describes the records this manager saves.
    pub fn with_manifest(mut self, manifest: RunManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Manager for whichever run last saved a checkpoint in `dir`.
    pub fn latest(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir  = dir.into();
        let path = dir.join(LATEST_RUN_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Have you run 'train' first?", path.display())
        })?;
        let stem: String = serde_json::from_str(&json)?;
        Self::new(dir, stem)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Full path of the checkpoint file, extension included
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, CHECKPOINT_EXTENSION))
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    /// Overwrite the checkpoint with the model's current parameters,
    /// then the manifest if one is attached.
    pub fn save_best<B: Backend, M: Module<B>>(&self, model: &M) -> Result<()> {
        // Without extension, the recorder adds it
        let path = self.dir.join(&self.stem);

        <CompactRecorder as Recorder<B>>::record(
            &CompactRecorder::new(),
            model.clone().into_record(),
            path.clone(),
        )
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", self.checkpoint_path().display());

        if let Some(manifest) = &self.manifest {
            self.save_manifest(manifest)?;
        }
        Ok(())
    }

    /// Load the checkpoint into a freshly built `model` of the same shape.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path = self.dir.join(&self.stem);

        let record = <CompactRecorder as Recorder<B>>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    self.checkpoint_path().display()
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Persist the manifest and mark this run as the latest one.
    fn save_manifest(&self, manifest: &RunManifest) -> Result<()> {
        let path = self.manifest_path();
        fs::write(&path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write manifest to '{}'", path.display()))?;

        let latest = self.dir.join(LATEST_RUN_FILE);
        fs::write(&latest, serde_json::to_string(&self.stem)?)
            .with_context(|| format!("Cannot write '{}'", latest.display()))?;

        tracing::debug!("Saved run manifest '{}'", path.display());
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<RunManifest> {
        let path = self.manifest_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{LinearClassifier, LinearClassifierConfig, ModelKind};
    use burn::{backend::NdArray, record::FileRecorder};

    type TestBackend = NdArray<f32>;

    fn manifest(model: ModelKind) -> RunManifest {
        RunManifest {
            config:  TrainConfig { model, ..TrainConfig::default() },
            classes: vec!["COVID".into(), "Normal".into()],
        }
    }

    fn linear() -> LinearClassifier<TestBackend> {
        LinearClassifierConfig::new(12, 2).init(&Default::default())
    }

    #[test]
    fn test_stem_from_settings() {
        assert_eq!(lr_tag(3e-5), "lr3e-5");
        assert_eq!(checkpoint_stem(3e-5, "xraycnn", "cpu"), "lr3e-5_xraycnn_cpu");
    }

    #[test]
    fn test_extension_matches_recorder() {
        assert_eq!(
            <CompactRecorder as FileRecorder<TestBackend>>::file_extension(),
            CHECKPOINT_EXTENSION
        );
    }

    #[test]
    fn test_save_then_load_restores_weights() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(tmp.path(), "lr1e-3_linear_cpu").unwrap();

        let cfg   = LinearClassifierConfig::new(12, 2);
        let saved: LinearClassifier<TestBackend> = cfg.init(&device);
        ckpt.save_best::<TestBackend, _>(&saved).unwrap();
        assert!(ckpt.checkpoint_path().exists());

        let fresh: LinearClassifier<TestBackend> = cfg.init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let a = saved.head.weight.val().into_data().to_vec::<f32>().unwrap();
        let b = loaded.head.weight.val().into_data().to_vec::<f32>().unwrap();
        // CompactRecorder stores half precision
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_latest_manifest_written_with_checkpoint() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path(), "lr3e-5_linear_cpu")
            .unwrap()
            .with_manifest(manifest(ModelKind::Linear));

        // Nothing points at the run until a record exists
        assert!(CheckpointManager::latest(tmp.path()).is_err());

        ckpt.save_best::<TestBackend, _>(&linear()).unwrap();

        let latest = CheckpointManager::latest(tmp.path()).unwrap();
        assert_eq!(latest.stem(), "lr3e-5_linear_cpu");
        assert!(latest.checkpoint_path().exists());
        assert_eq!(latest.load_manifest().unwrap().classes, vec!["COVID", "Normal"]);
    }

    #[test]
    fn test_unsaved_run_keeps_previous_manifest() {
        let tmp  = tempfile::tempdir().unwrap();
        let stem = "lr1e-3_foo_cpu";
        CheckpointManager::new(tmp.path(), stem)
            .unwrap()
            .with_manifest(manifest(ModelKind::Linear))
            .save_best::<TestBackend, _>(&linear())
            .unwrap();

        // Same stem, other architecture, aborted before its first save
        let _rerun = CheckpointManager::new(tmp.path(), stem)
            .unwrap()
            .with_manifest(manifest(ModelKind::Cnn));

        let latest = CheckpointManager::latest(tmp.path()).unwrap();
        assert_eq!(latest.load_manifest().unwrap().config.model, ModelKind::Linear);
        assert!(latest.load_model(linear(), &Default::default()).is_ok());
    }

    #[test]
    fn test_missing_latest_run_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::latest(tmp.path()).is_err());
    }
}
