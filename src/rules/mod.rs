//! Transform rules over one document's objects.
//!
//! Each rule is a pure function from a document to a document. Rules only
//! relabel or remove objects; they never add objects, never move a bounding
//! box, and never touch the document-level fields (`filename`, `size`, ...).
//!
//! Every rule consumes the old object list and builds a new retained list,
//! so a removal can never cause the following object to be skipped.

mod canonical;

pub use canonical::{canonical_label, ClusterTable};

use std::collections::BTreeSet;

use crate::config::{MissingAttributePolicy, RuleSpec};
use crate::error::BbchError;
use crate::ir::{AnnotationDocument, ObjectAnnotation};

/// Attribute consulted by [`Rule::RemoveByRotation`].
pub const ROTATION_ATTRIBUTE: &str = "rotation";

/// A single relabeling/filtering step.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// Replace each label with the value of the named attribute.
    ExtractLabelFromAttribute {
        attribute: String,
        on_missing: MissingAttributePolicy,
    },
    /// Remove objects whose `rotation` attribute parses to a nonzero value.
    RemoveByRotation,
    /// Remove objects whose canonical label is not in the set.
    FilterByAllowList(BTreeSet<String>),
    /// Rewrite labels to their cluster key; remove labels with no cluster.
    ClusterLabels(ClusterTable),
    /// Truncate labels to their first character (BBCH principal stage).
    GeneralizeLabel,
}

impl Rule {
    /// Build a rule from its configuration.
    pub fn from_spec(spec: &RuleSpec) -> Self {
        match spec {
            RuleSpec::ExtractLabelFromAttribute {
                attribute,
                on_missing,
            } => Rule::ExtractLabelFromAttribute {
                attribute: attribute.clone(),
                on_missing: *on_missing,
            },
            RuleSpec::RemoveByRotation => Rule::RemoveByRotation,
            RuleSpec::FilterByAllowList { labels } => Rule::FilterByAllowList(
                labels
                    .iter()
                    .filter_map(|label| canonical_label(&label.to_string()))
                    .collect(),
            ),
            RuleSpec::ClusterLabels { clusters } => {
                Rule::ClusterLabels(ClusterTable::from_clusters(clusters))
            }
            RuleSpec::GeneralizeLabel => Rule::GeneralizeLabel,
        }
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::ExtractLabelFromAttribute { .. } => "extract_label_from_attribute",
            Rule::RemoveByRotation => "remove_by_rotation",
            Rule::FilterByAllowList(_) => "filter_by_allow_list",
            Rule::ClusterLabels(_) => "cluster_labels",
            Rule::GeneralizeLabel => "generalize_label",
        }
    }

    /// True for rules that inspect or rewrite the label by value.
    ///
    /// These must run after any label extraction.
    pub fn reads_label(&self) -> bool {
        matches!(
            self,
            Rule::FilterByAllowList(_) | Rule::ClusterLabels(_) | Rule::GeneralizeLabel
        )
    }

    /// True for rules that replace the label from another source.
    pub fn writes_label_from_attribute(&self) -> bool {
        matches!(self, Rule::ExtractLabelFromAttribute { .. })
    }

    /// Apply the rule to a document, returning the rewritten document.
    pub fn apply(&self, mut document: AnnotationDocument) -> Result<AnnotationDocument, BbchError> {
        let objects = std::mem::take(&mut document.objects);
        let mut retained = Vec::with_capacity(objects.len());

        for object in objects {
            if let Some(object) = self.apply_object(object, &document)? {
                retained.push(object);
            }
        }

        document.objects = retained;
        Ok(document)
    }

    /// Returns `Ok(None)` when the object is removed.
    fn apply_object(
        &self,
        mut object: ObjectAnnotation,
        document: &AnnotationDocument,
    ) -> Result<Option<ObjectAnnotation>, BbchError> {
        match self {
            Rule::ExtractLabelFromAttribute {
                attribute,
                on_missing,
            } => {
                let value = object
                    .attribute(attribute)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(ToOwned::to_owned);

                match (value, on_missing) {
                    (Some(value), _) => {
                        object.label = value;
                        Ok(Some(object))
                    }
                    (None, MissingAttributePolicy::DropObject) => Ok(None),
                    (None, MissingAttributePolicy::Fail) => Err(BbchError::MissingAttribute {
                        path: document.source_path.clone(),
                        attribute: attribute.clone(),
                        label: object.label,
                    }),
                }
            }
            Rule::RemoveByRotation => {
                let Some(raw) = object
                    .attribute(ROTATION_ATTRIBUTE)
                    .map(str::trim)
                    .filter(|raw| !raw.is_empty())
                else {
                    return Ok(Some(object));
                };

                let rotation = raw.parse::<f64>().map_err(|_| BbchError::InvalidAttribute {
                    path: document.source_path.clone(),
                    attribute: ROTATION_ATTRIBUTE.to_string(),
                    label: object.label.clone(),
                    value: raw.to_string(),
                })?;

                Ok((rotation == 0.0).then_some(object))
            }
            Rule::FilterByAllowList(allowed) => {
                let canonical = canonical_label(&object.label).ok_or_else(|| {
                    BbchError::LabelCanonicalization {
                        path: document.source_path.clone(),
                        label: object.label.clone(),
                    }
                })?;
                Ok(allowed.contains(&canonical).then_some(object))
            }
            Rule::ClusterLabels(table) => match table.cluster_key(&object.label) {
                Some(key) => {
                    object.label = key.to_string();
                    Ok(Some(object))
                }
                None => Ok(None),
            },
            Rule::GeneralizeLabel => {
                let first = object.label.chars().next().ok_or_else(|| {
                    BbchError::MalformedObject {
                        path: document.source_path.clone(),
                        message: "cannot generalize an empty label".to_string(),
                    }
                })?;
                object.label = first.to_string();
                Ok(Some(object))
            }
        }
    }
}

impl From<&RuleSpec> for Rule {
    fn from(spec: &RuleSpec) -> Self {
        Rule::from_spec(spec)
    }
}
