use std::path::PathBuf;
use thiserror::Error;

/// The main error type for bbchkit operations.
#[derive(Debug, Error)]
pub enum BbchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse VOC XML {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Object '{label}' in {path} has no '{attribute}' attribute")]
    MissingAttribute {
        path: PathBuf,
        attribute: String,
        label: String,
    },

    #[error("Object '{label}' in {path} has invalid '{attribute}' value '{value}'")]
    InvalidAttribute {
        path: PathBuf,
        attribute: String,
        label: String,
        value: String,
    },

    #[error("Malformed object in {path}: {message}")]
    MalformedObject { path: PathBuf, message: String },

    #[error("Cannot canonicalize label '{label}' in {path}")]
    LabelCanonicalization { path: PathBuf, label: String },

    #[error("Image {path} could not be transferred: {source}")]
    MissingImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule order: {message}")]
    RuleOrder { message: String },

    #[error("Could not draw a fresh identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },

    #[error("Failed to read rule configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid split parameters: {message}")]
    InvalidSplitParams { message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
