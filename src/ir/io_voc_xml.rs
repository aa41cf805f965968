//! Pascal VOC XML reader and writer.
//!
//! Documents follow the VOC layout produced by CVAT's "Pascal VOC" export:
//! one XML file per image, with per-object named attributes nested as
//! `<attributes><attribute><name/><value/></attribute></attributes>`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use tracing::warn;
use walkdir::WalkDir;

use super::model::{AnnotationDocument, ElementAnchor, ImageSize, ObjectAnnotation, RawElement};
use super::BoundingBox;
use crate::error::BbchError;

pub(crate) const VOC_XML_EXTENSION: &str = "xml";

/// Standard VOC per-object fields, in the order they are written back.
const OBJECT_EXTRA_FIELDS: [&str; 4] = ["pose", "truncated", "difficult", "occluded"];

/// Read one VOC XML file into an [`AnnotationDocument`].
pub fn parse_voc_xml(path: &Path) -> Result<AnnotationDocument, BbchError> {
    let xml = fs::read_to_string(path).map_err(|source| BbchError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("cannot read file: {source}"),
    })?;
    parse_voc_xml_str(&xml, path)
}

/// Parse VOC XML from a UTF-8 string.
///
/// This helper is primarily useful for testing/fuzzing parse behavior in-memory.
pub fn from_voc_xml_str(xml: &str) -> Result<AnnotationDocument, BbchError> {
    parse_voc_xml_str(xml, Path::new("<memory>"))
}

/// Parse VOC XML from bytes.
///
/// The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<AnnotationDocument, BbchError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| BbchError::VocXmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml)
}

/// Write a document as VOC XML to `path`.
pub fn write_voc_xml(document: &AnnotationDocument, path: &Path) -> Result<(), BbchError> {
    fs::write(path, to_voc_xml_string(document)).map_err(BbchError::Io)
}

/// Render a document as VOC XML.
pub fn to_voc_xml_string(document: &AnnotationDocument) -> String {
    let mut xml = String::new();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    write_passthrough(&mut xml, document, ElementAnchor::Start);
    if let Some(folder) = &document.folder {
        write_text_element(&mut xml, 1, "folder", folder);
    }
    write_passthrough(&mut xml, document, ElementAnchor::Folder);
    write_text_element(&mut xml, 1, "filename", &document.image_filename);
    write_passthrough(&mut xml, document, ElementAnchor::Filename);
    if let Some(path) = &document.path {
        write_text_element(&mut xml, 1, "path", path);
    }
    write_passthrough(&mut xml, document, ElementAnchor::Path);

    if let Some(size) = &document.size {
        writeln!(xml, "  <size>").expect("write to string");
        for (tag, value) in [
            ("width", size.width),
            ("height", size.height),
            ("depth", size.depth),
        ] {
            if let Some(value) = value {
                writeln!(xml, "    <{tag}>{value}</{tag}>").expect("write to string");
            }
        }
        writeln!(xml, "  </size>").expect("write to string");
    }
    write_passthrough(&mut xml, document, ElementAnchor::Size);

    for object in &document.objects {
        writeln!(xml, "  <object>").expect("write to string");
        write_text_element(&mut xml, 2, "name", &object.label);

        for key in OBJECT_EXTRA_FIELDS {
            if let Some(value) = object.extras.get(key) {
                write_text_element(&mut xml, 2, key, value);
            }
        }

        writeln!(xml, "    <bndbox>").expect("write to string");
        writeln!(xml, "      <xmin>{}</xmin>", object.bbox.xmin).expect("write to string");
        writeln!(xml, "      <ymin>{}</ymin>", object.bbox.ymin).expect("write to string");
        writeln!(xml, "      <xmax>{}</xmax>", object.bbox.xmax).expect("write to string");
        writeln!(xml, "      <ymax>{}</ymax>", object.bbox.ymax).expect("write to string");
        writeln!(xml, "    </bndbox>").expect("write to string");

        if !object.attributes.is_empty() {
            writeln!(xml, "    <attributes>").expect("write to string");
            for (name, value) in &object.attributes {
                writeln!(xml, "      <attribute>").expect("write to string");
                write_text_element(&mut xml, 4, "name", name);
                write_text_element(&mut xml, 4, "value", value);
                writeln!(xml, "      </attribute>").expect("write to string");
            }
            writeln!(xml, "    </attributes>").expect("write to string");
        }

        writeln!(xml, "  </object>").expect("write to string");
    }
    write_passthrough(&mut xml, document, ElementAnchor::Objects);

    writeln!(xml, "</annotation>").expect("write to string");
    xml
}

/// List the `.xml` files directly inside `dir`, sorted by file name.
///
/// Nested directories are not scanned; a warning names the first skipped file.
pub fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, BbchError> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).map_err(BbchError::Io)? {
        let entry = entry.map_err(BbchError::Io)?;
        let path = entry.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| rel_string(dir, path))
    });

    let mut nested_xml = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).min_depth(2) {
        let entry = entry.map_err(|source| BbchError::Io(source.into()))?;
        if entry.file_type().is_file() && has_xml_extension(entry.path()) {
            nested_xml.push(entry.path().to_path_buf());
        }
    }

    if !nested_xml.is_empty() {
        nested_xml.sort_by_cached_key(|path| rel_string(dir, path));
        warn!(
            skipped = nested_xml.len(),
            example = %rel_string(dir, &nested_xml[0]),
            "annotation directory is scanned flat; skipping nested .xml files"
        );
    }

    Ok(files)
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<AnnotationDocument, BbchError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| BbchError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(BbchError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let image_filename = required_child_text(annotation, "filename", path, "<annotation>")?;
    let folder = child_element(annotation, "folder").map(element_text);
    let path_field = optional_child_text(annotation, "path");

    let size = child_element(annotation, "size")
        .map(|size| -> Result<ImageSize, BbchError> {
            Ok(ImageSize {
                width: parse_size_field(size, "width", path),
                height: parse_size_field(size, "height", path),
                depth: parse_size_field(size, "depth", path),
            })
        })
        .transpose()?;

    let mut objects = Vec::new();
    for object in child_elements(annotation, "object") {
        let label = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        let bbox = BoundingBox::from_xyxy(
            parse_required_f64(bndbox, "xmin", path)?,
            parse_required_f64(bndbox, "ymin", path)?,
            parse_required_f64(bndbox, "xmax", path)?,
            parse_required_f64(bndbox, "ymax", path)?,
        );

        let mut extras = BTreeMap::new();
        for key in OBJECT_EXTRA_FIELDS {
            if let Some(value) = optional_child_text(object, key) {
                extras.insert(key.to_string(), value);
            }
        }

        let mut attributes = BTreeMap::new();
        if let Some(block) = child_element(object, "attributes") {
            for attribute in child_elements(block, "attribute") {
                let Some(name) = optional_child_text(attribute, "name") else {
                    continue;
                };
                let value = child_element(attribute, "value")
                    .map(element_text)
                    .unwrap_or_default();
                match attributes.entry(name) {
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                    Entry::Occupied(first) => warn!(
                        path = %path.display(),
                        label = %label,
                        attribute = %first.key(),
                        kept = %first.get(),
                        ignored = %value,
                        "duplicate attribute; keeping the first value"
                    ),
                }
            }
        }

        objects.push(ObjectAnnotation {
            label,
            bbox,
            attributes,
            extras,
        });
    }

    let passthrough = collect_passthrough(annotation, path_field.is_some());

    Ok(AnnotationDocument {
        source_path: path.to_path_buf(),
        folder,
        image_filename,
        path: path_field,
        size,
        objects,
        passthrough,
    })
}

/// Top-level elements outside the model, each anchored to the last
/// interpreted field before it. Repeats of a singleton field are kept too.
fn collect_passthrough(annotation: Node<'_, '_>, has_path: bool) -> Vec<RawElement> {
    let mut seen = BTreeSet::new();
    let mut anchor = ElementAnchor::Start;
    let mut passthrough = Vec::new();

    for child in annotation.children().filter(Node::is_element) {
        let name = child.tag_name().name();
        let slot = match name {
            "folder" => Some(ElementAnchor::Folder),
            "filename" => Some(ElementAnchor::Filename),
            "path" if has_path => Some(ElementAnchor::Path),
            "size" => Some(ElementAnchor::Size),
            "object" => Some(ElementAnchor::Objects),
            _ => None,
        };

        match slot {
            Some(ElementAnchor::Objects) => anchor = ElementAnchor::Objects,
            Some(slot) if seen.insert(name) => anchor = slot,
            _ => {
                let mut xml = String::new();
                render_element(child, &mut xml);
                passthrough.push(RawElement {
                    name: name.to_string(),
                    xml,
                    anchor,
                });
            }
        }
    }

    passthrough
}

/// Render an element subtree as XML. Comments, processing instructions and
/// namespaced attributes are dropped; text keeps its original whitespace.
fn render_element(node: Node<'_, '_>, xml: &mut String) {
    let name = node.tag_name().name();
    write!(xml, "<{name}").expect("write to string");
    for attribute in node.attributes().filter(|a| a.namespace().is_none()) {
        write!(xml, " {}=\"{}\"", attribute.name(), xml_escape(attribute.value()))
            .expect("write to string");
    }

    if !node.has_children() {
        xml.push_str("/>");
        return;
    }

    xml.push('>');
    for child in node.children() {
        if child.is_element() {
            render_element(child, xml);
        } else if child.is_text() {
            xml.push_str(&xml_escape(child.text().unwrap_or_default()));
        }
    }
    write!(xml, "</{name}>").expect("write to string");
}

fn write_passthrough(xml: &mut String, document: &AnnotationDocument, anchor: ElementAnchor) {
    for element in document.passthrough.iter().filter(|e| e.anchor == anchor) {
        writeln!(xml, "  {}", element.xml).expect("write to string");
    }
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, BbchError> {
    child_element(node, tag).ok_or_else(|| BbchError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, BbchError> {
    optional_child_text(node, tag).ok_or_else(|| BbchError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

/// A `<size>` field. Integral floats such as `640.0` are accepted; other
/// unparseable values are logged and treated as absent.
fn parse_size_field(node: Node<'_, '_>, tag: &str, path: &Path) -> Option<u32> {
    let raw = optional_child_text(node, tag)?;
    if let Ok(value) = raw.parse::<u32>() {
        return Some(value);
    }

    match raw.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value.fract() == 0.0
                && value <= f64::from(u32::MAX) =>
        {
            Some(value as u32)
        }
        _ => {
            warn!(
                path = %path.display(),
                "ignoring invalid <{tag}> value '{raw}' in <size>; expected an integer"
            );
            None
        }
    }
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<f64, BbchError> {
    let raw = required_child_text(node, tag, path, "<bndbox>")?;
    raw.parse::<f64>().map_err(|_| BbchError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in <bndbox>; expected floating-point number"),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

fn element_text(node: Node<'_, '_>) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn write_text_element(xml: &mut String, depth: usize, tag: &str, text: &str) {
    let indent = "  ".repeat(depth);
    writeln!(xml, "{indent}<{tag}>{}</{tag}>", xml_escape(text)).expect("write to string");
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub(crate) fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
