// ============================================================
// Layer 4 — X-ray Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<XrayItem>
// into tensors on the target device.
//
// How batching works here:
//   Input:  N XrayItems, each a flat [3 * S * S] buffer
//   Output: images [N, 3, S, S], labels [N]
//
// Every item was produced by the same Transform and all buffers
// have the same length. Concatenating them and reshaping is enough.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{dataset::XrayItem, preprocessor::CHANNELS};

// ─── XrayBatch ────────────────────────────────────────────────────────────────
/// A batch of images ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct XrayBatch<B: Backend> {
    /// Normalised pixels — shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Ground truth class indices — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> XrayBatch<B> {
    /// Number of samples in this batch
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }
}

// ─── XrayBatcher ──────────────────────────────────────────────────────────────
/// Holds the device tensors are created on and the square image side.
#[derive(Clone, Debug)]
pub struct XrayBatcher<B: Backend> {
    pub device: B::Device,
    pub size:   usize,
}

impl<B: Backend> XrayBatcher<B> {
    pub fn new(device: B::Device, size: usize) -> Self {
        Self { device, size }
    }
}

impl<B: Backend> Batcher<XrayItem, XrayBatch<B>> for XrayBatcher<B> {
    fn batch(&self, items: Vec<XrayItem>) -> XrayBatch<B> {
        let batch_size = items.len();

        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let pixels: Vec<f32> = items.into_iter().flat_map(|item| item.pixels).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, CHANNELS, self.size, self.size]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );

        XrayBatch { images, labels }
    }
}
