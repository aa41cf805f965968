#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// One `<object>` of a fixture document.
#[derive(Clone, Debug)]
pub struct FixtureObject {
    pub label: String,
    pub bbox: (f64, f64, f64, f64),
    pub attributes: Vec<(String, String)>,
}

impl FixtureObject {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            bbox: (1.0, 1.0, 5.0, 5.0),
            attributes: Vec::new(),
        }
    }

    pub fn bbox(mut self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        self.bbox = (xmin, ymin, xmax, ymax);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }
}

/// Render a CVAT-style VOC document.
pub fn voc_xml(filename: &str, width: u32, height: u32, objects: &[FixtureObject]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<annotation>\n");
    xml.push_str("  <folder>source</folder>\n");
    xml.push_str(&format!("  <filename>{filename}</filename>\n"));
    xml.push_str("  <source>\n    <database>Unknown</database>\n  </source>\n");
    xml.push_str(&format!(
        "  <size>\n    <width>{width}</width>\n    <height>{height}</height>\n    <depth>3</depth>\n  </size>\n"
    ));
    xml.push_str("  <segmented>0</segmented>\n");
    for object in objects {
        let (xmin, ymin, xmax, ymax) = object.bbox;
        xml.push_str("  <object>\n");
        xml.push_str(&format!("    <name>{}</name>\n", object.label));
        xml.push_str(&format!(
            "    <bndbox><xmin>{xmin}</xmin><ymin>{ymin}</ymin><xmax>{xmax}</xmax><ymax>{ymax}</ymax></bndbox>\n"
        ));
        if !object.attributes.is_empty() {
            xml.push_str("    <attributes>\n");
            for (name, value) in &object.attributes {
                xml.push_str(&format!(
                    "      <attribute><name>{name}</name><value>{value}</value></attribute>\n"
                ));
            }
            xml.push_str("    </attributes>\n");
        }
        xml.push_str("  </object>\n");
    }
    xml.push_str("</annotation>\n");
    xml
}

/// A source dataset on disk: `annotations/*.xml` and `photos/*.bmp`.
pub struct SourceDataset {
    pub annotations: PathBuf,
    pub photos: PathBuf,
}

impl SourceDataset {
    pub fn create(root: &Path) -> Self {
        let annotations = root.join("annotations");
        let photos = root.join("photos");
        fs::create_dir_all(&annotations).expect("create annotations dir");
        fs::create_dir_all(&photos).expect("create photos dir");
        Self {
            annotations,
            photos,
        }
    }

    /// Write `<stem>.xml` referencing `<stem>.bmp`, and the image unless `with_image` is false.
    pub fn add(&self, stem: &str, objects: &[FixtureObject], with_image: bool) -> PathBuf {
        let image_name = format!("{stem}.bmp");
        if with_image {
            write_bmp(&self.photos.join(&image_name), 16, 12);
        }
        let path = self.annotations.join(format!("{stem}.xml"));
        fs::write(&path, voc_xml(&image_name, 16, 12, objects)).expect("write annotation");
        path
    }
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// File stems in `dir`, sorted.
pub fn file_stems(dir: &Path) -> Vec<String> {
    let mut stems: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .path()
                .file_stem()
                .expect("file stem")
                .to_string_lossy()
                .to_string()
        })
        .collect();
    stems.sort();
    stems
}
