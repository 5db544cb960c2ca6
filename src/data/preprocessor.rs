// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns a decoded image into the flat float buffer the model
// consumes.
//
// Steps (applied in order):
//   1. Resize to size × size (bilinear)
//   2. Random horizontal flip, p = 0.5 (training split only)
//   3. Convert to RGB and scale bytes to [0, 1]
//   4. Normalise each channel: (x - mean) / std
//   5. Lay out channel-major: [C, H, W]
//
// Chest X-rays are greyscale; step 3 replicates the single
// channel into three so models built for RGB input work as is.
//
// The mean/std are the ImageNet statistics, which is what
// pretrained vision backbones expect.
//
// The flip draws from a caller-supplied RNG so a seeded dataset
// reproduces the same augmentation.
//
// Reference: image crate documentation (imageops)

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use rand::Rng;
use std::path::Path;

use crate::domain::sample::Split;

pub const CHANNELS: usize = 3;

pub const IMAGENET_MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; CHANNELS] = [0.229, 0.224, 0.225];

/// Per-split preprocessing pipeline.
#[derive(Debug, Clone)]
pub struct Transform {
    size:      u32,
    flip_prob: f64,
    mean:      [f32; CHANNELS],
    std:       [f32; CHANNELS],
}

impl Transform {
    /// The pipeline used for a given split: augmentation on train,
    /// deterministic resize + normalise on val and test.
    pub fn for_split(split: Split, size: u32) -> Self {
        Self {
            size,
            flip_prob: if split.is_augmented() { 0.5 } else { 0.0 },
            mean:      IMAGENET_MEAN,
            std:       IMAGENET_STD,
        }
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Length of the buffer produced by `apply`
    pub fn num_values(&self) -> usize {
        CHANNELS * self.size() * self.size()
    }

    /// Decode an image file and run the pipeline on it.
    pub fn load<R: Rng>(&self, path: &Path, rng: &mut R) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
        Ok(self.apply(&img, rng))
    }

    /// Run the pipeline on an already decoded image.
    pub fn apply<R: Rng>(&self, img: &DynamicImage, rng: &mut R) -> Vec<f32> {
        let resized = img.resize_exact(self.size, self.size, FilterType::Triangle);
        let mut rgb: RgbImage = resized.to_rgb8();

        if self.flip_prob > 0.0 && rng.gen_bool(self.flip_prob) {
            rgb = image::imageops::flip_horizontal(&rgb);
        }

        self.normalise(&rgb)
    }

    /// Scale to [0, 1], normalise per channel, and reorder HWC → CHW.
    fn normalise(&self, rgb: &RgbImage) -> Vec<f32> {
        let plane = self.size() * self.size();
        let mut out = vec![0.0f32; CHANNELS * plane];

        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..CHANNELS {
                let x = pixel.0[c] as f32 / 255.0;
                out[c * plane + i] = (x - self.mean[c]) / self.std[c];
            }
        }
        out
    }
}
