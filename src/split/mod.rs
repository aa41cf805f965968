//! Train/validation split of a curated dataset.
//!
//! Expects a curated root with `photos/` and `annotations/` and copies each
//! image + annotation pair into `split/train/...` or `split/validate/...`.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BbchError;
use crate::ir::io_voc_xml::has_xml_extension;

/// Split options.
#[derive(Clone, Debug)]
pub struct SplitOptions {
    /// Fraction of pairs placed in the training subset.
    pub train_fraction: f64,
    /// Seed for a reproducible shuffle; random when `None`.
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: None,
        }
    }
}

/// An image and its annotation file, sharing a file stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePair {
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// Counts written by a split.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub train: usize,
    pub validate: usize,
    /// Files with no partner of the same stem.
    pub unpaired: usize,
}

/// Validate split options before running.
pub fn validate_split_options(opts: &SplitOptions) -> Result<(), BbchError> {
    if !(0.0..=1.0).contains(&opts.train_fraction) {
        return Err(BbchError::InvalidSplitParams {
            message: "train fraction must be in the interval [0.0, 1.0]".to_string(),
        });
    }
    Ok(())
}

/// Number of pairs that go to the training subset.
pub fn train_count(total: usize, train_fraction: f64) -> usize {
    ((total as f64 * train_fraction).floor() as usize).min(total)
}

/// Pair images and annotations by file stem.
///
/// Returns the pairs sorted by stem and the number of unpaired files. When
/// several images share a stem, the first by file name is paired and the
/// rest count as unpaired.
pub fn pair_files(photo_dir: &Path, annotation_dir: &Path) -> Result<(Vec<FilePair>, usize), BbchError> {
    let mut images: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut unpaired = 0;
    for path in list_files(photo_dir)? {
        if has_xml_extension(&path) {
            continue;
        }
        let Some(stem) = file_stem(&path) else {
            continue;
        };
        match images.entry(stem) {
            Entry::Vacant(slot) => {
                slot.insert(path);
            }
            Entry::Occupied(kept) => {
                warn!(
                    kept = %kept.get().display(),
                    skipped = %path.display(),
                    "another image has the same name; skipping"
                );
                unpaired += 1;
            }
        }
    }

    let mut pairs = Vec::new();
    for path in list_files(annotation_dir)? {
        if !has_xml_extension(&path) {
            continue;
        }
        match file_stem(&path).and_then(|stem| images.remove(&stem)) {
            Some(image) => pairs.push(FilePair {
                image,
                annotation: path,
            }),
            None => {
                warn!(annotation = %path.display(), "no image with the same name; skipping");
                unpaired += 1;
            }
        }
    }

    for image in images.values() {
        warn!(image = %image.display(), "no annotation with the same name; skipping");
        unpaired += 1;
    }

    pairs.sort_by(|a, b| a.annotation.cmp(&b.annotation));
    Ok((pairs, unpaired))
}

/// Split `<root>/photos` + `<root>/annotations` into `<root>/split/{train,validate}`.
pub fn split_dataset(root: &Path, opts: &SplitOptions) -> Result<SplitSummary, BbchError> {
    validate_split_options(opts)?;

    let (mut pairs, unpaired) = pair_files(&root.join("photos"), &root.join("annotations"))?;

    match opts.seed {
        Some(seed) => pairs.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => pairs.shuffle(&mut rand::rng()),
    }

    let cut = train_count(pairs.len(), opts.train_fraction);
    let (train, validate) = pairs.split_at(cut);

    let split_root = root.join("split");
    copy_pairs(train, &split_root.join("train"))?;
    copy_pairs(validate, &split_root.join("validate"))?;

    let summary = SplitSummary {
        train: train.len(),
        validate: validate.len(),
        unpaired,
    };
    info!(
        train = summary.train,
        validate = summary.validate,
        unpaired = summary.unpaired,
        "split finished"
    );
    Ok(summary)
}

fn copy_pairs(pairs: &[FilePair], subset_dir: &Path) -> Result<(), BbchError> {
    let photos = subset_dir.join("photos");
    let annotations = subset_dir.join("annotations");
    fs::create_dir_all(&photos).map_err(BbchError::Io)?;
    fs::create_dir_all(&annotations).map_err(BbchError::Io)?;

    for pair in pairs {
        copy_into(&pair.image, &photos)?;
        copy_into(&pair.annotation, &annotations)?;
    }
    Ok(())
}

fn copy_into(file: &Path, dir: &Path) -> Result<(), BbchError> {
    let name = file.file_name().ok_or_else(|| {
        BbchError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", file.display()),
        ))
    })?;
    fs::copy(file, dir.join(name)).map_err(BbchError::Io)?;
    Ok(())
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, BbchError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(BbchError::Io)? {
        let path = entry.map_err(BbchError::Io)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_curated(root: &Path, stems: &[&str]) {
        fs::create_dir_all(root.join("photos")).expect("create photos");
        fs::create_dir_all(root.join("annotations")).expect("create annotations");
        for stem in stems {
            fs::write(root.join(format!("photos/{stem}.jpg")), stem).expect("write image");
            fs::write(root.join(format!("annotations/{stem}.xml")), stem).expect("write xml");
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn validate_opts_rejects_out_of_range_fraction() {
        for fraction in [-0.1, 1.5, f64::NAN] {
            let opts = SplitOptions {
                train_fraction: fraction,
                seed: None,
            };
            assert!(validate_split_options(&opts).is_err());
        }
        assert!(validate_split_options(&SplitOptions::default()).is_ok());
    }

    #[test]
    fn train_count_floors() {
        assert_eq!(train_count(10, 0.8), 8);
        assert_eq!(train_count(7, 0.5), 3);
        assert_eq!(train_count(3, 1.0), 3);
        assert_eq!(train_count(0, 0.8), 0);
    }

    #[test]
    fn split_keeps_pairs_together() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let stems = ["a", "b", "c", "d", "e"];
        make_curated(temp.path(), &stems);

        let summary = split_dataset(
            temp.path(),
            &SplitOptions {
                train_fraction: 0.6,
                seed: Some(7),
            },
        )
        .expect("split");

        assert_eq!(summary.train, 3);
        assert_eq!(summary.validate, 2);
        for subset in ["train", "validate"] {
            let dir = temp.path().join("split").join(subset);
            let photos: Vec<String> = names(&dir.join("photos"))
                .into_iter()
                .map(|n| n.trim_end_matches(".jpg").to_string())
                .collect();
            let annotations: Vec<String> = names(&dir.join("annotations"))
                .into_iter()
                .map(|n| n.trim_end_matches(".xml").to_string())
                .collect();
            assert_eq!(photos, annotations);
        }
    }

    #[test]
    fn seeded_split_is_deterministic() {
        let first = tempfile::tempdir().expect("create temp dir");
        let second = tempfile::tempdir().expect("create temp dir");
        let stems = ["a", "b", "c", "d", "e", "f", "g", "h"];
        make_curated(first.path(), &stems);
        make_curated(second.path(), &stems);

        let opts = SplitOptions {
            train_fraction: 0.5,
            seed: Some(42),
        };
        split_dataset(first.path(), &opts).expect("split first");
        split_dataset(second.path(), &opts).expect("split second");

        assert_eq!(
            names(&first.path().join("split/train/photos")),
            names(&second.path().join("split/train/photos"))
        );
    }

    #[test]
    fn images_sharing_a_stem_pair_only_once() {
        let temp = tempfile::tempdir().expect("create temp dir");
        make_curated(temp.path(), &["a", "b"]);
        fs::write(temp.path().join("photos/a.png"), "png").expect("write duplicate stem");

        let (pairs, unpaired) =
            pair_files(&temp.path().join("photos"), &temp.path().join("annotations")).expect("pair");
        assert_eq!(pairs.len(), 2);
        assert_eq!(unpaired, 1);
        assert_eq!(pairs[0].image, temp.path().join("photos/a.jpg"));
    }

    #[test]
    fn unpaired_files_are_counted_and_skipped() {
        let temp = tempfile::tempdir().expect("create temp dir");
        make_curated(temp.path(), &["a", "b"]);
        fs::write(temp.path().join("photos/orphan.jpg"), "x").expect("write orphan");
        fs::write(temp.path().join("annotations/lonely.xml"), "x").expect("write lonely");

        let summary = split_dataset(
            temp.path(),
            &SplitOptions {
                train_fraction: 1.0,
                seed: Some(1),
            },
        )
        .expect("split");
        assert_eq!(summary.train, 2);
        assert_eq!(summary.validate, 0);
        assert_eq!(summary.unpaired, 2);
    }
}
