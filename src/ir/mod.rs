//! Annotation model for bbchkit.
//!
//! Every tool in the crate (the curation pipeline, the cropper, the stats
//! counter, the detection exporter) reads and writes this one model.
//!
//! # Design Principles
//!
//! 1. **One document per image**: an [`AnnotationDocument`] mirrors a single
//!    VOC XML file, so curation decisions are made per image.
//!
//! 2. **Permissive Construction**: boxes are not checked for ordering at
//!    parse time; consumers that need a valid region check it themselves.
//!
//! 3. **Lossless where it matters**: fields the rules never touch (size,
//!    path, pose/truncated flags, and any top-level element the model does
//!    not interpret, such as `<source>` or `<segmented>`) survive a
//!    parse/write cycle unchanged.
//!
//! # Example
//!
//! ```
//! use bbchkit::ir::{AnnotationDocument, BoundingBox, ObjectAnnotation};
//!
//! let document = AnnotationDocument::new("IMG_0001.jpg")
//!     .with_size(4000, 3000)
//!     .with_object(
//!         ObjectAnnotation::new("grape", BoundingBox::from_xyxy(10.0, 20.0, 100.0, 200.0))
//!             .with_attribute("BBCH", "71"),
//!     );
//! assert_eq!(document.objects.len(), 1);
//! ```

mod bbox;
pub mod io_voc_xml;
mod model;

// Re-export core types for convenient access
pub use bbox::BoundingBox;
pub use model::{AnnotationDocument, ElementAnchor, ImageSize, ObjectAnnotation, RawElement};
