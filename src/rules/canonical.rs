//! Canonical label form shared by allow-listing and clustering.

use std::collections::HashMap;

use tracing::debug;

use crate::config::LabelValue;

/// Separator used to join cluster members into a cluster key.
pub const CLUSTER_KEY_SEPARATOR: &str = "_";

/// Canonical form of a label.
///
/// Surrounding whitespace is ignored. Integer labels are rendered in plain
/// decimal, so `"071"`, `"+71"` and the configured integer `71` all compare
/// equal. Returns `None` for a blank label.
pub fn canonical_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<i64>() {
        Ok(code) => Some(code.to_string()),
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Precomputed label -> cluster key lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterTable {
    keys: HashMap<String, String>,
}

impl ClusterTable {
    /// Build the table from cluster groupings.
    ///
    /// Each cluster's key is its canonical members joined with `_` in the
    /// configured order. A label listed in several clusters maps to the last.
    pub fn from_clusters(clusters: &[Vec<LabelValue>]) -> Self {
        let mut keys = HashMap::new();

        for cluster in clusters {
            let members: Vec<String> = cluster
                .iter()
                .filter_map(|member| canonical_label(&member.to_string()))
                .collect();
            if members.is_empty() {
                continue;
            }

            let key = members.join(CLUSTER_KEY_SEPARATOR);
            for member in members {
                if let Some(previous) = keys.insert(member.clone(), key.clone()) {
                    debug!(label = %member, %previous, current = %key, "label listed in several clusters");
                }
            }
        }

        Self { keys }
    }

    /// Cluster key for a label, if it belongs to a cluster.
    pub fn cluster_key(&self, label: &str) -> Option<&str> {
        canonical_label(label).and_then(|canonical| self.keys.get(&canonical).map(String::as_str))
    }

    /// Number of labels with a cluster entry.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_label_normalizes_integers() {
        assert_eq!(canonical_label("71"), Some("71".to_string()));
        assert_eq!(canonical_label(" 071 "), Some("71".to_string()));
        assert_eq!(canonical_label("+71"), Some("71".to_string()));
        assert_eq!(canonical_label("71_73"), Some("71_73".to_string()));
        assert_eq!(canonical_label("grape"), Some("grape".to_string()));
        assert_eq!(canonical_label("   "), None);
    }

    #[test]
    fn cluster_table_maps_every_member_to_joined_key() {
        let table = ClusterTable::from_clusters(&[
            vec![71.into(), 73.into()],
            vec!["75".into(), 77.into()],
        ]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.cluster_key("71"), Some("71_73"));
        assert_eq!(table.cluster_key("73"), Some("71_73"));
        assert_eq!(table.cluster_key("075"), Some("75_77"));
        assert_eq!(table.cluster_key("81"), None);
        assert_eq!(table.cluster_key(""), None);
    }

    #[test]
    fn later_cluster_wins_for_duplicated_label() {
        let table = ClusterTable::from_clusters(&[vec![71.into()], vec![71.into(), 73.into()]]);
        assert_eq!(table.cluster_key("71"), Some("71_73"));
    }

    #[test]
    fn empty_clusters_are_ignored() {
        let table = ClusterTable::from_clusters(&[vec![], vec!["  ".into()]]);
        assert!(table.is_empty());
    }
}
