// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Walks a split directory and lists every labelled image in it.
//
// Expected layout:
//   {root}/{split}/{class_name}/{image file}
//
// Class indices are assigned by sorting the class directory
// names, so the same tree always yields the same labels no
// matter what order the filesystem returns entries in.
//
// Only file paths are collected here. Decoding happens lazily
// in XrayDataset::get so a 20k-image split never has to fit in
// memory at once.
//
// Reference: Rust Book §9 (Error Handling)
//            std::fs::read_dir

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::{Split, XraySample};

/// File extensions treated as images (compared case-insensitively)
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Everything found under one split directory.
#[derive(Debug, Clone)]
pub struct SplitListing {
    pub split:   Split,
    /// Sorted class names; position in this Vec is the label
    pub classes: Vec<String>,
    pub samples: Vec<XraySample>,
}

impl SplitListing {
    /// Number of images in each class, in label order
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for s in &self.samples {
            counts[s.label] += 1;
        }
        counts
    }

    /// Fail unless this split uses exactly the same classes as `expected`.
    /// A val/test split with a missing or renamed class would silently
    /// shift every label after it.
    pub fn ensure_classes(&self, expected: &[String]) -> Result<()> {
        if self.classes != expected {
            bail!(
                "Split '{}' has classes {:?} but training used {:?}",
                self.split,
                self.classes,
                expected
            );
        }
        Ok(())
    }
}

/// Lists labelled images from a `{root}/{split}/{class}` tree.
pub struct ImageFolder {
    root: PathBuf,
}

impl ImageFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.dir_name())
    }

    /// Scan one split directory.
    pub fn load_split(&self, split: Split) -> Result<SplitListing> {
        let dir = self.split_dir(split);

        let mut classes: Vec<String> = fs::read_dir(&dir)
            .with_context(|| format!("Cannot read split directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        classes.sort();

        if classes.is_empty() {
            bail!("No class directories found in '{}'", dir.display());
        }

        let mut samples = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let class_dir = dir.join(class);
            let mut files = list_images(&class_dir)?;
            files.sort();

            if files.is_empty() {
                tracing::warn!("Class directory '{}' contains no images", class_dir.display());
            }
            samples.extend(files.into_iter().map(|path| XraySample::new(path, label)));
        }

        tracing::info!(
            "Split '{}': {} images across {} classes",
            split,
            samples.len(),
            classes.len()
        );

        Ok(SplitListing { split, classes, samples })
    }
}

/// Collect the image files directly inside `dir`.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read class directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not decoded by the loader").unwrap();
    }

    #[test]
    fn test_classes_sorted_and_labelled() {
        let tmp  = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("train/Normal/a.png"));
        touch(&root.join("train/COVID/b.PNG"));
        touch(&root.join("train/COVID/c.jpg"));
        touch(&root.join("train/COVID/notes.txt"));

        let listing = ImageFolder::new(root).load_split(Split::Train).unwrap();

        assert_eq!(listing.classes, vec!["COVID".to_string(), "Normal".to_string()]);
        assert_eq!(listing.samples.len(), 3);
        assert_eq!(listing.class_counts(), vec![2, 1]);
        assert!(listing.samples.iter().all(|s| {
            let class = s.path.parent().unwrap().file_name().unwrap().to_str().unwrap();
            listing.classes[s.label] == class
        }));
    }

    #[test]
    fn test_missing_split_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ImageFolder::new(tmp.path()).load_split(Split::Val).is_err());
    }

    #[test]
    fn test_class_mismatch_detected() {
        let tmp  = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("val/COVID/a.png"));

        let listing  = ImageFolder::new(root).load_split(Split::Val).unwrap();
        let expected = vec!["COVID".to_string(), "Normal".to_string()];
        assert!(listing.ensure_classes(&expected).is_err());
        assert!(listing.ensure_classes(&expected[..1]).is_ok());
    }
}
