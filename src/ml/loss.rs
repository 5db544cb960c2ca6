use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

/// Loss collaborator of the training loop.
///
/// Generic over the backend so the same value serves the autodiff
/// training pass and the plain validation pass.
pub trait ClassificationLoss {
    /// logits: [batch, num_classes], targets: [batch] → mean loss, shape [1]
    fn compute<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1>;
}

/// Softmax cross-entropy, averaged over the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy;

impl ClassificationLoss for CrossEntropy {
    fn compute<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets)
    }
}
