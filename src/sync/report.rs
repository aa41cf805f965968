//! Run summary for the dataset synchronizer.
//!
//! Partial success is the normal outcome of a curation run, so the summary
//! records what happened to every document rather than failing the run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Counters and per-document issues accumulated over one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Source documents seen.
    pub documents_processed: usize,
    /// Documents written to the output with their image.
    pub documents_kept: usize,
    /// Documents left with no objects after the pipeline.
    pub documents_discarded: usize,
    /// Documents that could not be parsed, transformed or written.
    pub documents_failed: usize,
    /// Images transferred to the output directory.
    pub images_copied: usize,
    /// Images that could not be located or transferred.
    pub images_missing: usize,
    /// One entry per failed document or missing image.
    pub issues: Vec<SyncIssue>,
}

impl RunSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an issue to the summary.
    pub fn add(&mut self, issue: SyncIssue) {
        self.issues.push(issue);
    }

    /// Returns true if every document was either kept or discarded.
    pub fn is_clean(&self) -> bool {
        self.documents_failed == 0 && self.images_missing == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed {} document(s):", self.documents_processed)?;
        writeln!(f, "  kept:      {}", self.documents_kept)?;
        writeln!(f, "  discarded: {}", self.documents_discarded)?;
        writeln!(f, "  failed:    {}", self.documents_failed)?;
        writeln!(
            f,
            "Images: {} copied, {} missing",
            self.images_copied, self.images_missing
        )?;

        if !self.issues.is_empty() {
            writeln!(f)?;
            writeln!(f, "Issues ({}):", self.issues.len())?;
            for issue in &self.issues {
                writeln!(f, "  {}", issue)?;
            }
        }

        Ok(())
    }
}

/// A single per-document problem.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncIssue {
    pub code: SyncIssueCode,
    pub source: PathBuf,
    pub message: String,
}

impl SyncIssue {
    pub fn new(code: SyncIssueCode, source: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            code,
            source: source.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {}: {}",
            self.code,
            self.source.display(),
            self.message
        )
    }
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncIssueCode {
    /// The annotation document could not be parsed.
    MalformedDocument,
    /// A rule rejected the document (missing attribute, bad label, ...).
    RuleFailed,
    /// The paired image could not be found or transferred.
    MissingImage,
    /// The output annotation could not be written.
    WriteFailed,
}
