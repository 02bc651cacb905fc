//! Record eligibility filtering for one profile view.
//!
//! A pipe record takes part in a view's annotation only when all three
//! criteria hold:
//!
//! 1. its network is displayed in the target profile view,
//! 2. its network name matches no exclusion pattern (casing/sleeve
//!    networks are drawn but never annotated),
//! 3. its name is not in the view's per-pipe exclusion set.
//!
//! The output set carries no ordering guarantee; ordering is the chain
//! builder's job.

use serde::{Deserialize, Serialize};

use crate::types::{PipeRecord, ProfileView};

/// Network-level exclusion rules applied during record filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Case-insensitive substrings; a record whose network name
    /// contains any of them is excluded.
    pub exclude_network_patterns: Vec<String>,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            // Casing/sleeve networks under roads and railways.
            exclude_network_patterns: vec!["футляр".to_owned()],
        }
    }
}

impl RecordFilter {
    /// Whether `network` matches any exclusion pattern.
    #[must_use]
    pub fn excludes_network(&self, network: &str) -> bool {
        let lowered = network.to_lowercase();
        self.exclude_network_patterns
            .iter()
            .any(|pattern| lowered.contains(&pattern.to_lowercase()))
    }
}

/// Select the records eligible for `view` from the scene-wide set.
#[must_use]
pub fn records_for_view<'a>(
    records: &'a [PipeRecord],
    view: &ProfileView,
    filter: &RecordFilter,
) -> Vec<&'a PipeRecord> {
    records
        .iter()
        .filter(|record| {
            view.networks.contains(&record.network)
                && !filter.excludes_network(&record.network)
                && !view.excluded_pipes.contains(&record.name)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::{NetworkKind, Point2, Point3};

    fn record(name: &str, network: &str) -> PipeRecord {
        PipeRecord {
            name: name.to_owned(),
            network: network.to_owned(),
            network_kind: NetworkKind::Gravity,
            size_label: "300".to_owned(),
            start: Point3::new(0.0, 0.0, 95.0),
            end: Point3::new(10.0, 0.0, 94.8),
            start_structure: "КК-1".to_owned(),
            end_structure: "КК-2".to_owned(),
            length_2d: 10.0,
            slope: 0.02,
            diameter: 0.3,
        }
    }

    fn view(networks: &[&str], excluded: &[&str]) -> ProfileView {
        ProfileView {
            name: "К2 профиль".to_owned(),
            insertion: Point2::new(0.0, 0.0),
            networks: networks.iter().map(|n| (*n).to_owned()).collect(),
            excluded_pipes: excluded.iter().map(|n| (*n).to_owned()).collect(),
        }
    }

    #[test]
    fn keeps_only_displayed_networks() {
        let records = vec![record("a", "К2-сеть"), record("b", "В1-сеть")];
        let selected = records_for_view(
            &records,
            &view(&["К2-сеть"], &[]),
            &RecordFilter::default(),
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "a");
    }

    #[test]
    fn excludes_casing_networks_case_insensitively() {
        let records = vec![record("a", "К2-сеть"), record("b", "К2 Футляр ж/д")];
        let selected = records_for_view(
            &records,
            &view(&["К2-сеть", "К2 Футляр ж/д"], &[]),
            &RecordFilter::default(),
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "a");
    }

    #[test]
    fn excludes_style_overridden_pipes() {
        let records = vec![record("a", "К2-сеть"), record("b", "К2-сеть")];
        let selected = records_for_view(
            &records,
            &view(&["К2-сеть"], &["b"]),
            &RecordFilter::default(),
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "a");
    }

    #[test]
    fn empty_pattern_list_excludes_nothing() {
        let filter = RecordFilter {
            exclude_network_patterns: Vec::new(),
        };
        let records = vec![record("a", "К2 футляр")];
        let selected = records_for_view(&records, &view(&["К2 футляр"], &[]), &filter);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn default_filter_round_trips_through_json() {
        let filter = RecordFilter::default();
        let json = serde_json::to_string(&filter).unwrap();
        let back: RecordFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn no_networks_means_nothing_selected() {
        let records = vec![record("a", "К2-сеть")];
        let selected: Vec<&PipeRecord> = records_for_view(
            &records,
            &ProfileView {
                name: "К2".to_owned(),
                insertion: Point2::new(0.0, 0.0),
                networks: BTreeSet::new(),
                excluded_pipes: BTreeSet::new(),
            },
            &RecordFilter::default(),
        );
        assert!(selected.is_empty());
    }
}
