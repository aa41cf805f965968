//! Flat detection-format JSON export.
//!
//! Each VOC file becomes one JSON document listing its boxes as
//! `left/top/width/height` with an integer `class_id`. Class ids are assigned
//! in first-seen order across the whole export, so the same label gets the
//! same id in every file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::BbchError;
use crate::ir::io_voc_xml::parse_voc_xml;
use crate::ir::AnnotationDocument;

/// Channel count written for every image.
const IMAGE_DEPTH: u32 = 3;

/// Label -> class id, assigned in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct ClassRegistry {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl ClassRegistry {
    /// Returns the id of `label`, assigning the next free id on first sight.
    pub fn class_id(&mut self, label: &str) -> u32 {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = self.names.len() as u32;
        self.ids.insert(label.to_string(), id);
        self.names.push(label.to_string());
        id
    }

    /// Labels in id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One exported document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionDocument {
    pub file: String,
    pub image_size: Vec<DetectionImageSize>,
    pub annotations: Vec<DetectionBox>,
    pub categories: Vec<DetectionCategory>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionImageSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionBox {
    pub class_id: u32,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionCategory {
    pub class_id: u32,
    pub name: String,
}

/// Result of an export run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportSummary {
    pub documents: usize,
    /// Class names in id order.
    pub classes: Vec<String>,
}

/// Convert one document, registering its labels.
///
/// `dimensions` supplies the image size when the document has none.
pub fn to_detection_document(
    document: &AnnotationDocument,
    registry: &mut ClassRegistry,
    dimensions: Option<(u32, u32)>,
) -> Result<DetectionDocument, BbchError> {
    let (width, height) = match (document.width(), document.height()) {
        (Some(width), Some(height)) => (width, height),
        _ => dimensions.ok_or_else(|| BbchError::VocXmlParse {
            path: document.source_path.clone(),
            message: "missing <size> width/height and no image to measure".to_string(),
        })?,
    };

    let mut annotations = Vec::with_capacity(document.objects.len());
    let mut categories: Vec<DetectionCategory> = Vec::new();

    for object in &document.objects {
        let class_id = registry.class_id(&object.label);
        if !categories.iter().any(|category| category.class_id == class_id) {
            categories.push(DetectionCategory {
                class_id,
                name: object.label.clone(),
            });
        }

        let (left, top, box_width, box_height) = object.bbox.to_ltwh_rounded();
        annotations.push(DetectionBox {
            class_id,
            top,
            left,
            width: box_width,
            height: box_height,
        });
    }

    Ok(DetectionDocument {
        file: document.image_filename.clone(),
        image_size: vec![DetectionImageSize {
            width,
            height,
            depth: IMAGE_DEPTH,
        }],
        annotations,
        categories,
    })
}

/// Export every annotation file to `<output_dir>/<stem>.json`.
///
/// When `image_dir` is given, documents without a `<size>` are measured from
/// the image header instead of failing.
pub fn export_detection_json(
    paths: &[PathBuf],
    output_dir: &Path,
    image_dir: Option<&Path>,
) -> Result<ExportSummary, BbchError> {
    fs::create_dir_all(output_dir).map_err(BbchError::Io)?;
    let mut registry = ClassRegistry::default();

    for path in paths {
        let document = parse_voc_xml(path)?;
        let dimensions = match (document.width(), document.height(), image_dir) {
            (Some(_), Some(_), _) | (_, _, None) => None,
            (_, _, Some(dir)) => Some(measure_image(&dir.join(document.image_basename()))?),
        };

        let exported = to_detection_document(&document, &mut registry, dimensions)?;

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| document.image_basename().to_string());
        let output_path = output_dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(&exported).map_err(|source| {
            BbchError::JsonWrite {
                path: output_path.clone(),
                source,
            }
        })?;
        fs::write(&output_path, json).map_err(BbchError::Io)?;
        debug!(source = %path.display(), output = %output_path.display(), "exported");
    }

    info!(
        documents = paths.len(),
        classes = registry.names().len(),
        "detection export finished"
    );
    Ok(ExportSummary {
        documents: paths.len(),
        classes: registry.names().to_vec(),
    })
}

fn measure_image(path: &Path) -> Result<(u32, u32), BbchError> {
    let size = imagesize::size(path).map_err(|err| BbchError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("cannot read image dimensions: {err}"),
    })?;
    Ok((size.width as u32, size.height as u32))
}
