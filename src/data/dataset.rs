use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::data::preprocessor::Transform;
use crate::domain::sample::XraySample;

/// One preprocessed image: a flat [C, H, W] buffer plus its class.
#[derive(Debug, Clone)]
pub struct XrayItem {
    pub pixels: Vec<f32>,
    pub label:  usize,
}

/// Lazily decoded image dataset for one split.
pub struct XrayDataset {
    samples:   Vec<XraySample>,
    transform: Transform,
    seed:      u64,
    /// How many times each sample has been fetched (one per epoch)
    visits:    Vec<AtomicU32>,
}

impl XrayDataset {
    pub fn new(samples: Vec<XraySample>, transform: Transform, seed: u64) -> Self {
        let visits = samples.iter().map(|_| AtomicU32::new(0)).collect();
        Self { samples, transform, seed, visits }
    }

    /// RNG for the `visit`-th fetch of sample `index`. Depends only on
    /// the seed and those two counters, not on which worker asks first.
    fn item_rng(&self, index: usize, visit: u32) -> StdRng {
        let mix = ((index as u64) << 32) ^ visit as u64;
        StdRng::seed_from_u64(self.seed ^ mix)
    }
}

impl Dataset<XrayItem> for XrayDataset {
    /// Decodes and preprocesses the image on every call.
    ///
    /// A file that fails to decode yields `None`, which ends the
    /// loader's pass early; the training loop turns that short pass
    /// into an error.
    fn get(&self, index: usize) -> Option<XrayItem> {
        let sample  = self.samples.get(index)?;
        let visit   = self.visits[index].fetch_add(1, Ordering::Relaxed);
        let mut rng = self.item_rng(index, visit);
        match self.transform.load(&sample.path, &mut rng) {
            Ok(pixels) => Some(XrayItem { pixels, label: sample.label }),
            Err(e) => {
                tracing::error!("{e:#}");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
