// ============================================================
// Layer 3 — X-ray Sample Domain Types
// ============================================================
// Plain data describing one labelled image on disk and which
// dataset split it belongs to.
//
// The dataset is laid out as one directory per split, with one
// sub-directory per class:
//
//   data/
//     train/
//       COVID/            ← class 0 (sorted by name)
//         COVID-1.png
//       Normal/           ← class 1
//         Normal-1.png
//     val/ ...
//     test/ ...
//
// No image bytes live here, only the path and the class index.

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// The three dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Directory name of this split under the data root
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        }
    }

    /// Only the training split gets random augmentation
    pub fn is_augmented(self) -> bool {
        matches!(self, Split::Train)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One labelled image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XraySample {
    /// Path to the encoded image (png / jpeg / bmp)
    pub path: PathBuf,

    /// Class index into the sorted list of class names
    pub label: usize,
}

impl XraySample {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self { path: path.into(), label }
    }
}
