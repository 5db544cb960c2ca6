use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::CHANNELS;

/// Anything that maps an image batch to class scores.
///
/// images: [batch, channels, height, width] → logits: [batch, num_classes]
pub trait ImageClassifier<B: Backend> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// Architectures selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Small convolutional network
    Cnn,
    /// Single linear layer over the flattened image
    Linear,
}

impl ModelKind {
    /// Default run name, used in output file names
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Cnn    => "xraycnn",
            ModelKind::Linear => "linear",
        }
    }
}

// ─── XrayCnn ──────────────────────────────────────────────────────────────────

/// Output channels of each conv block
const CNN_CHANNELS: [usize; 3] = [16, 32, 64];

/// Smallest image side that survives every block's 2×2 pooling
pub const MIN_CNN_IMAGE_SIZE: u32 = 1 << CNN_CHANNELS.len();

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct XrayCnnConfig {
    pub num_classes: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl XrayCnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> XrayCnn<B> {
        let mut in_channels = CHANNELS;
        let mut blocks = Vec::with_capacity(CNN_CHANNELS.len());
        for out_channels in CNN_CHANNELS {
            blocks.push(ConvBlock {
                conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
                pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                activation: Relu::new(),
            });
            in_channels = out_channels;
        }

        XrayCnn {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout:     DropoutConfig::new(self.dropout).init(),
            head:        LinearConfig::new(in_channels, self.num_classes).init(device),
        }
    }
}

/// conv 3×3 (same padding) → ReLU → max-pool 2×2
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:       Conv2d<B>,
    pub pool:       MaxPool2d,
    pub activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.activation.forward(self.conv.forward(x)))
    }
}

/// Three conv blocks, global average pooling, linear head.
/// Each block halves the spatial size, so inputs must be at least
/// `MIN_CNN_IMAGE_SIZE` on a side.
#[derive(Module, Debug)]
pub struct XrayCnn<B: Backend> {
    pub blocks:      Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub dropout:     Dropout,
    pub head:        Linear<B>,
}

impl<B: Backend> ImageClassifier<B> for XrayCnn<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        // [batch, channels, 1, 1] → [batch, channels]
        let x = self.global_pool.forward(x).flatten::<2>(1, 3);
        self.head.forward(self.dropout.forward(x))
    }
}

// ─── LinearClassifier ─────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct LinearClassifierConfig {
    /// channels × height × width
    pub in_features: usize,
    pub num_classes: usize,
}

impl LinearClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LinearClassifier<B> {
        LinearClassifier {
            head: LinearConfig::new(self.in_features, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct LinearClassifier<B: Backend> {
    pub head: Linear<B>,
}

impl<B: Backend> ImageClassifier<B> for LinearClassifier<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(images.flatten::<2>(1, 3))
    }
}
