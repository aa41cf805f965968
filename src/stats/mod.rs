//! Label frequency statistics over a corpus of annotation files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::BbchError;
use crate::ir::io_voc_xml::parse_voc_xml;

/// Object counts per label, sorted by label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    /// Number of annotation files read.
    pub documents: usize,
    /// Total number of objects.
    pub objects: usize,
    /// Objects per label.
    pub labels: BTreeMap<String, usize>,
}

impl LabelStats {
    /// Count one label occurrence.
    pub fn record(&mut self, label: &str) {
        self.objects += 1;
        *self.labels.entry(label.to_string()).or_insert(0) += 1;
    }

    /// Labels ordered by descending count, ties broken by label.
    pub fn by_frequency(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> = self
            .labels
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

impl fmt::Display for LabelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} object(s) in {} document(s), {} label(s)",
            self.objects,
            self.documents,
            self.labels.len()
        )?;

        let width = self.labels.keys().map(|label| label.len()).max().unwrap_or(0);
        for (label, count) in &self.labels {
            writeln!(f, "  {label:<width$}  {count}")?;
        }
        Ok(())
    }
}

/// Count objects per label across the given annotation files.
///
/// Unlike the synchronizer, statistics are all-or-nothing: an unreadable
/// file fails the whole count.
pub fn count_labels(paths: &[PathBuf]) -> Result<LabelStats, BbchError> {
    let mut stats = LabelStats::default();

    for path in paths {
        let document = parse_voc_xml(path)?;
        stats.documents += 1;
        for object in &document.objects {
            stats.record(&object.label);
        }
    }

    Ok(stats)
}
