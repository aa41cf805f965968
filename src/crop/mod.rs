//! Per-label object crops.
//!
//! Every object's bounding box is cut out of its image and saved as
//! `<output>/<label>/<id>.jpg`, producing a classification dataset from a
//! detection dataset.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BbchError;
use crate::ir::io_voc_xml::parse_voc_xml;
use crate::ir::{AnnotationDocument, ObjectAnnotation};
use crate::sync::IdGenerator;

const CROP_EXTENSION: &str = "jpg";

/// Counts from a crop run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CropSummary {
    /// Crops written.
    pub cropped: usize,
    /// Objects whose image could not be read or whose box was empty.
    pub failed: usize,
    /// Labels that received a directory.
    pub labels: BTreeSet<String>,
}

/// Crop every object of every annotation file.
///
/// Annotation files must parse; unreadable images and degenerate boxes are
/// counted in [`CropSummary::failed`] and skipped.
pub fn crop_objects(
    paths: &[PathBuf],
    photo_dir: &Path,
    output_dir: &Path,
    ids: &mut dyn IdGenerator,
) -> Result<CropSummary, BbchError> {
    let documents = paths
        .iter()
        .map(|path| parse_voc_xml(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = CropSummary::default();
    for document in &documents {
        for object in &document.objects {
            summary.labels.insert(label_dir_name(&object.label));
        }
    }
    for label in &summary.labels {
        fs::create_dir_all(output_dir.join(label)).map_err(BbchError::Io)?;
    }
    info!(
        objects = documents.iter().map(|d| d.objects.len()).sum::<usize>(),
        labels = summary.labels.len(),
        "cropping objects"
    );

    for document in &documents {
        crop_document(document, photo_dir, output_dir, ids, &mut summary);
    }

    info!(cropped = summary.cropped, failed = summary.failed, "cropping finished");
    Ok(summary)
}

fn crop_document(
    document: &AnnotationDocument,
    photo_dir: &Path,
    output_dir: &Path,
    ids: &mut dyn IdGenerator,
    summary: &mut CropSummary,
) {
    if document.objects.is_empty() {
        return;
    }

    let image_path = photo_dir.join(document.image_basename());
    let image = match image::open(&image_path) {
        Ok(image) => image,
        Err(source) => {
            let err = BbchError::ImageRead {
                path: image_path,
                source,
            };
            warn!(objects = document.objects.len(), "{err}");
            summary.failed += document.objects.len();
            return;
        }
    };

    for object in &document.objects {
        match crop_object(&image, object, output_dir, ids) {
            Ok(Some(path)) => {
                debug!(crop = %path.display(), "crop written");
                summary.cropped += 1;
            }
            Ok(None) => {
                warn!(
                    image = %image_path.display(),
                    label = %object.label,
                    "bounding box is empty inside the image; skipping"
                );
                summary.failed += 1;
            }
            Err(err) => {
                warn!("{err}");
                summary.failed += 1;
            }
        }
    }
}

fn crop_object(
    image: &image::DynamicImage,
    object: &ObjectAnnotation,
    output_dir: &Path,
    ids: &mut dyn IdGenerator,
) -> Result<Option<PathBuf>, BbchError> {
    let Some((x, y, width, height)) = object.bbox.clamped_region(image.width(), image.height())
    else {
        return Ok(None);
    };

    let path = output_dir
        .join(label_dir_name(&object.label))
        .join(format!("{}.{CROP_EXTENSION}", ids.next_id()));
    image
        .crop_imm(x, y, width, height)
        .to_rgb8()
        .save(&path)
        .map_err(|source| BbchError::ImageWrite {
            path: path.clone(),
            source,
        })?;
    Ok(Some(path))
}

/// Directory name for a label; path separators are not allowed in it.
fn label_dir_name(label: &str) -> String {
    let name = label.trim().replace(['/', '\\'], "_");
    if name.is_empty() || name == "." || name == ".." {
        "_".to_string()
    } else {
        name
    }
}
