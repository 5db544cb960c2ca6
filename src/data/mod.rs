// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from image files on disk all
// the way to device-ready tensor batches.
//
//   {root}/{split}/{class}/*.png
//       │
//       ▼
//   ImageFolder       → lists (path, label) pairs per split
//       │
//       ▼
//   XrayDataset       → implements Burn's Dataset trait,
//       │               decodes + preprocesses on get()
//       ▼
//   Transform         → resize, flip (train only), normalise
//       │
//       ▼
//   XrayBatcher       → stacks items into [N, 3, S, S] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Lists labelled images from a split/class directory tree
pub mod loader;

/// Resize, augment and normalise decoded images
pub mod preprocessor;

/// Implements Burn's Dataset trait for X-ray images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::data::{
    batcher::{XrayBatch, XrayBatcher},
    dataset::XrayDataset,
    loader::SplitListing,
    preprocessor::Transform,
};
use crate::domain::traits::BatchSource;

/// Burn's data loaders are restartable (`iter()` begins a new pass)
/// and know their dataset length, which is all the loop needs.
impl<O> BatchSource<O> for Arc<dyn DataLoader<O>> {
    fn num_items(&self) -> usize {
        DataLoader::num_items(self.as_ref())
    }

    fn batches(&self) -> Box<dyn Iterator<Item = O> + '_> {
        Box::new(self.iter())
    }
}

/// Knobs shared by every split's loader.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub image_size:  u32,
    pub batch_size:  usize,
    pub num_workers: usize,
    pub seed:        u64,
}

/// Build the Burn data loader for one split.
///
/// Only the training split is shuffled; val/test keep directory order
/// so their metrics are comparable across epochs.
pub fn split_loader<B: Backend>(
    listing:  SplitListing,
    settings: &LoaderSettings,
    device:   &B::Device,
) -> Arc<dyn DataLoader<XrayBatch<B>>> {
    let split     = listing.split;
    let transform = Transform::for_split(split, settings.image_size);
    let batcher   = XrayBatcher::<B>::new(device.clone(), transform.size());
    let dataset   = XrayDataset::new(listing.samples, transform, settings.seed);

    let builder = DataLoaderBuilder::new(batcher)
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers);

    if split.is_augmented() {
        builder.shuffle(settings.seed).build(dataset)
    } else {
        builder.build(dataset)
    }
}
