//! In-memory model of one image's annotation document.
//!
//! A document is loaded from a single VOC XML file, rewritten by the rule
//! pipeline, and either discarded or written back out under a new name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::bbox::BoundingBox;

/// One image's bounding-box annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    /// Path of the XML file this document was read from.
    #[serde(default)]
    pub source_path: PathBuf,

    /// Owning-folder field (`<folder>`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Reference to the paired image file (`<filename>`).
    pub image_filename: String,

    /// Absolute path recorded by the annotation tool (`<path>`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Image dimensions (`<size>`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,

    /// Object annotations in document order.
    #[serde(default)]
    pub objects: Vec<ObjectAnnotation>,

    /// Top-level elements the model does not interpret (`<source>`,
    /// `<segmented>`, ...), written back unchanged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<RawElement>,
}

impl AnnotationDocument {
    /// Creates an empty document referencing the given image.
    pub fn new(image_filename: impl Into<String>) -> Self {
        Self {
            image_filename: image_filename.into(),
            ..Default::default()
        }
    }

    /// Sets the image dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(ImageSize {
            width: Some(width),
            height: Some(height),
            depth: None,
        });
        self
    }

    /// Appends an object.
    pub fn with_object(mut self, object: ObjectAnnotation) -> Self {
        self.objects.push(object);
        self
    }

    /// Image width in pixels, if recorded.
    pub fn width(&self) -> Option<u32> {
        self.size.as_ref().and_then(|size| size.width)
    }

    /// Image height in pixels, if recorded.
    pub fn height(&self) -> Option<u32> {
        self.size.as_ref().and_then(|size| size.height)
    }

    /// The last path component of `image_filename`.
    ///
    /// Annotation tools sometimes record the image as `subdir/name.jpg`; the
    /// image itself always lives flat in the photo directory.
    pub fn image_basename(&self) -> &str {
        self.image_filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.image_filename)
    }

    /// Extension of the paired image, without the dot.
    pub fn image_extension(&self) -> Option<&str> {
        let name = self.image_basename();
        name.rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// Returns true if no objects remain.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// The last interpreted field that preceded a passthrough element.
///
/// The writer emits each passthrough element right after its anchor, which
/// keeps the producer's element order for the usual VOC layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementAnchor {
    /// Before any interpreted field.
    #[default]
    Start,
    Folder,
    Filename,
    Path,
    Size,
    /// After an `<object>`; written after all objects.
    Objects,
}

/// A top-level element kept verbatim as rendered XML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawElement {
    /// Tag name, e.g. `segmented`.
    pub name: String,
    /// The element and its subtree as XML.
    pub xml: String,
    #[serde(default)]
    pub anchor: ElementAnchor,
}

/// The `<size>` block. Every field is optional; some producers omit it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

/// One bounding-box instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectAnnotation {
    /// Classification code (`<name>`).
    pub label: String,

    /// Bounding box in pixel coordinates.
    pub bbox: BoundingBox,

    /// Named attributes from the `<attributes>` block (e.g. `BBCH`, `rotation`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Standard VOC object fields (`pose`, `truncated`, `difficult`, `occluded`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl ObjectAnnotation {
    /// Creates a new object with no attributes.
    pub fn new(label: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            bbox,
            attributes: BTreeMap::new(),
            extras: BTreeMap::new(),
        }
    }

    /// Adds a named attribute to the object.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Looks up a named attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
