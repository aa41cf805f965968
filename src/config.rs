//! Rule chain configuration.
//!
//! The configuration is a plain serde model. The CLI loads it from YAML;
//! library callers may build it directly.
//!
//! ```yaml
//! rules:
//!   - kind: extract_label_from_attribute
//!     attribute: BBCH
//!   - kind: remove_by_rotation
//!   - kind: cluster_labels
//!     clusters: [[71, 73], [75, 77, 79]]
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BbchError;

/// An ordered list of rule specifications.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleChainConfiguration {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Parameters for one transform rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Replace each label with the value of a named attribute.
    ExtractLabelFromAttribute {
        attribute: String,
        #[serde(default)]
        on_missing: MissingAttributePolicy,
    },
    /// Drop objects whose `rotation` attribute is nonzero.
    RemoveByRotation,
    /// Keep only objects whose label is listed.
    FilterByAllowList { labels: Vec<LabelValue> },
    /// Map labels to cluster keys; drop labels that belong to no cluster.
    ClusterLabels { clusters: Vec<Vec<LabelValue>> },
    /// Truncate labels to their first character.
    GeneralizeLabel,
}

/// What extraction does when an object lacks the source attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAttributePolicy {
    /// Fail the whole document.
    #[default]
    Fail,
    /// Remove the object and keep going.
    DropObject,
}

/// A label as written in configuration: BBCH codes are usually bare integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Integer(value) => write!(f, "{value}"),
            LabelValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Integer(value)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

/// Load a rule chain from a YAML file.
pub fn load_rule_chain(path: &Path) -> Result<RuleChainConfiguration, BbchError> {
    let raw = fs::read_to_string(path).map_err(|source| BbchError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| BbchError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
