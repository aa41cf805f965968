//! Dataset synchronizer.
//!
//! Drives a curation run: each source document is parsed, run through the
//! pipeline, and then either discarded (no objects left) or re-emitted as an
//! annotation + image pair named by a fresh identifier. Per-document failures
//! are recorded in the [`RunSummary`] and never abort the batch.

mod ids;
mod report;

pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use report::{RunSummary, SyncIssue, SyncIssueCode};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::BbchError;
use crate::ir::io_voc_xml::{parse_voc_xml, write_voc_xml, VOC_XML_EXTENSION};
use crate::ir::AnnotationDocument;
use crate::pipeline::Pipeline;

/// Draws per document before giving up on the identifier generator.
const MAX_ID_ATTEMPTS: usize = 16;

/// How the paired image reaches the output directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Copy the image, leaving the source in place.
    #[default]
    Copy,
    /// Move the image out of the source directory.
    Move,
}

/// Directory layout of a synchronizer run.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Directory holding the source images referenced by `<filename>`.
    pub source_image_dir: PathBuf,
    /// Directory receiving the rewritten annotation files.
    pub output_annotation_dir: PathBuf,
    /// Directory receiving the renamed images.
    pub output_image_dir: PathBuf,
    pub transfer: TransferMode,
}

impl SyncOptions {
    /// Options writing to `<output_root>/annotations` and `<output_root>/photos`.
    pub fn with_output_root(source_image_dir: impl Into<PathBuf>, output_root: &Path) -> Self {
        Self {
            source_image_dir: source_image_dir.into(),
            output_annotation_dir: output_root.join("annotations"),
            output_image_dir: output_root.join("photos"),
            transfer: TransferMode::Copy,
        }
    }
}

/// Synchronize a batch of source annotation files.
///
/// Returns an error only when the run cannot proceed at all (output
/// directories cannot be created, or the identifier generator keeps
/// repeating itself). Everything else is counted in the summary.
pub fn synchronize_dataset(
    sources: &[PathBuf],
    pipeline: &Pipeline,
    opts: &SyncOptions,
    ids: &mut dyn IdGenerator,
) -> Result<RunSummary, BbchError> {
    fs::create_dir_all(&opts.output_annotation_dir).map_err(BbchError::Io)?;
    fs::create_dir_all(&opts.output_image_dir).map_err(BbchError::Io)?;

    info!(
        documents = sources.len(),
        rules = pipeline.rules().len(),
        "starting synchronization"
    );

    let mut synchronizer = Synchronizer {
        pipeline,
        opts,
        ids,
        issued: HashSet::new(),
        summary: RunSummary::new(),
    };

    for source in sources {
        synchronizer.sync_document(source)?;
    }

    let summary = synchronizer.summary;
    info!(
        kept = summary.documents_kept,
        discarded = summary.documents_discarded,
        failed = summary.documents_failed,
        images_copied = summary.images_copied,
        images_missing = summary.images_missing,
        "synchronization finished"
    );
    Ok(summary)
}

struct Synchronizer<'a, 'g> {
    pipeline: &'a Pipeline,
    opts: &'a SyncOptions,
    ids: &'g mut dyn IdGenerator,
    issued: HashSet<String>,
    summary: RunSummary,
}

/// What happened to one source document.
enum Outcome {
    Kept,
    Discarded,
    Failed(SyncIssue),
    ImageMissing(SyncIssue),
}

/// Output locations reserved for one surviving document.
struct Target {
    image_name: String,
    image_path: PathBuf,
    annotation_path: PathBuf,
}

impl Synchronizer<'_, '_> {
    fn sync_document(&mut self, source: &Path) -> Result<(), BbchError> {
        self.summary.documents_processed += 1;

        match self.process(source)? {
            Outcome::Kept => {
                self.summary.documents_kept += 1;
                self.summary.images_copied += 1;
            }
            Outcome::Discarded => {
                debug!(source = %source.display(), "no objects left; discarding");
                self.summary.documents_discarded += 1;
            }
            Outcome::Failed(issue) => {
                warn!(source = %source.display(), "{}", issue.message);
                self.summary.documents_failed += 1;
                self.summary.add(issue);
            }
            Outcome::ImageMissing(issue) => {
                warn!(source = %source.display(), "{}", issue.message);
                self.summary.images_missing += 1;
                self.summary.add(issue);
            }
        }

        Ok(())
    }

    fn process(&mut self, source: &Path) -> Result<Outcome, BbchError> {
        let document = match parse_voc_xml(source) {
            Ok(document) => document,
            Err(err) => {
                return Ok(Outcome::Failed(SyncIssue::new(
                    SyncIssueCode::MalformedDocument,
                    source,
                    err.to_string(),
                )))
            }
        };

        let mut document = match self.pipeline.process(document) {
            Ok(document) => document,
            Err(err) => {
                return Ok(Outcome::Failed(SyncIssue::new(
                    SyncIssueCode::RuleFailed,
                    source,
                    err.to_string(),
                )))
            }
        };

        if document.is_empty() {
            return Ok(Outcome::Discarded);
        }

        let source_image = self.opts.source_image_dir.join(document.image_basename());
        let target = self.reserve_target(&document)?;

        if let Err(err) = transfer_image(&source_image, &target.image_path, self.opts.transfer) {
            return Ok(Outcome::ImageMissing(SyncIssue::new(
                SyncIssueCode::MissingImage,
                source,
                err.to_string(),
            )));
        }

        document.folder = document.folder.as_ref().map(|_| String::new());
        document.image_filename = target.image_name.clone();

        if let Err(err) = write_voc_xml(&document, &target.annotation_path) {
            undo_transfer(&source_image, &target.image_path, self.opts.transfer);
            return Ok(Outcome::Failed(SyncIssue::new(
                SyncIssueCode::WriteFailed,
                source,
                format!(
                    "cannot write {}: {err}",
                    target.annotation_path.display()
                ),
            )));
        }

        debug!(
            source = %source.display(),
            annotation = %target.annotation_path.display(),
            objects = document.objects.len(),
            "document kept"
        );
        Ok(Outcome::Kept)
    }

    /// Draw an identifier not yet issued in this run and not already present
    /// in the output directories.
    fn reserve_target(&mut self, document: &AnnotationDocument) -> Result<Target, BbchError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            if id.is_empty() || self.issued.contains(&id) {
                continue;
            }

            let image_name = match document.image_extension() {
                Some(ext) => format!("{id}.{ext}"),
                None => id.clone(),
            };
            let image_path = self.opts.output_image_dir.join(&image_name);
            let annotation_path = self
                .opts
                .output_annotation_dir
                .join(format!("{id}.{VOC_XML_EXTENSION}"));
            if image_path.exists() || annotation_path.exists() {
                continue;
            }

            self.issued.insert(id);
            return Ok(Target {
                image_name,
                image_path,
                annotation_path,
            });
        }

        Err(BbchError::IdentifierExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

fn transfer_image(from: &Path, to: &Path, mode: TransferMode) -> Result<(), BbchError> {
    let missing = |source: io::Error| BbchError::MissingImage {
        path: from.to_path_buf(),
        source,
    };

    if !from.is_file() {
        return Err(missing(io::Error::new(
            io::ErrorKind::NotFound,
            "image file not found",
        )));
    }

    match mode {
        TransferMode::Copy => fs::copy(from, to).map(|_| ()).map_err(missing),
        TransferMode::Move => fs::rename(from, to).or_else(|_| {
            // rename fails across filesystems; fall back to copy + delete.
            fs::copy(from, to)
                .and_then(|_| fs::remove_file(from))
                .map_err(missing)
        }),
    }
}

fn undo_transfer(from: &Path, to: &Path, mode: TransferMode) {
    let result = match mode {
        TransferMode::Copy => fs::remove_file(to),
        TransferMode::Move => fs::rename(to, from),
    };
    if let Err(err) = result {
        warn!(image = %to.display(), "could not roll back image transfer: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;

    const DOC: &str = r#"<annotation>
  <folder>task_3</folder>
  <filename>task_3/IMG_1.JPG</filename>
  <size><width>100</width><height>80</height></size>
  <object>
    <name>grape</name>
    <bndbox><xmin>1</xmin><ymin>2</ymin><xmax>30</xmax><ymax>40</ymax></bndbox>
    <attributes><attribute><name>rotation</name><value>0</value></attribute></attributes>
  </object>
</annotation>"#;

    struct RepeatingGenerator;

    impl IdGenerator for RepeatingGenerator {
        fn next_id(&mut self) -> String {
            "same".to_string()
        }
    }

    fn setup(root: &Path) -> (PathBuf, SyncOptions) {
        let annotations = root.join("in/annotations");
        let photos = root.join("in/photos");
        fs::create_dir_all(&annotations).expect("create annotations");
        fs::create_dir_all(&photos).expect("create photos");
        let source = annotations.join("IMG_1.xml");
        fs::write(&source, DOC).expect("write xml");
        fs::write(photos.join("IMG_1.JPG"), b"jpeg bytes").expect("write image");
        (source, SyncOptions::with_output_root(photos, &root.join("out")))
    }

    #[test]
    fn kept_document_is_renamed_and_folder_cleared() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let (source, opts) = setup(temp.path());
        let mut ids = SequentialIdGenerator::new("t");

        let summary = synchronize_dataset(&[source], &Pipeline::default(), &opts, &mut ids)
            .expect("synchronize");

        assert_eq!(summary.documents_kept, 1);
        assert_eq!(summary.images_copied, 1);
        let image = opts.output_image_dir.join("t-000001.JPG");
        assert_eq!(fs::read(&image).expect("read image"), b"jpeg bytes");

        let written = parse_voc_xml(&opts.output_annotation_dir.join("t-000001.xml"))
            .expect("parse output");
        assert_eq!(written.image_filename, "t-000001.JPG");
        assert_eq!(written.folder.as_deref(), Some(""));
        assert_eq!(written.width(), Some(100));
    }

    #[test]
    fn move_mode_removes_source_image() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let (source, mut opts) = setup(temp.path());
        opts.transfer = TransferMode::Move;
        let source_image = opts.source_image_dir.join("IMG_1.JPG");

        let summary = synchronize_dataset(
            &[source],
            &Pipeline::default(),
            &opts,
            &mut SequentialIdGenerator::new("m"),
        )
        .expect("synchronize");

        assert_eq!(summary.documents_kept, 1);
        assert!(!source_image.exists());
        assert!(opts.output_image_dir.join("m-000001.JPG").is_file());
    }

    #[test]
    fn repeating_generator_aborts_on_second_document() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let (source, opts) = setup(temp.path());
        let second = source.with_file_name("IMG_2.xml");
        fs::copy(&source, &second).expect("copy xml");

        let err = synchronize_dataset(
            &[source, second],
            &Pipeline::default(),
            &opts,
            &mut RepeatingGenerator,
        )
        .expect_err("identifier exhausted");
        assert!(matches!(err, BbchError::IdentifierExhausted { .. }));
    }

    #[test]
    fn rule_failure_counts_as_failed_document() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let (source, opts) = setup(temp.path());
        let pipeline = Pipeline::new(vec![Rule::ExtractLabelFromAttribute {
            attribute: "BBCH".to_string(),
            on_missing: Default::default(),
        }])
        .expect("pipeline");

        let summary = synchronize_dataset(&[source], &pipeline, &opts, &mut UuidGenerator)
            .expect("synchronize");

        assert_eq!(summary.documents_failed, 1);
        assert_eq!(summary.issues[0].code, SyncIssueCode::RuleFailed);
        assert_eq!(
            fs::read_dir(&opts.output_image_dir).expect("list output").count(),
            0
        );
    }
}
