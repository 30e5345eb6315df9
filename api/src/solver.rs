//! Greedy minimal-cover over snapshot timestamps.
//!
//! Given, per required package, the set of timestamps at which its exact
//! (name, version, architecture) was observed at one location, pick a small
//! set of timestamps hitting every coverable package: repeatedly take the
//! timestamp covering the most still-uncovered packages, most recent first
//! on ties. Packages no timestamp covers are reported as missing.

use std::collections::{BTreeMap, BTreeSet};

/// Outcome of the cover computation for one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    /// Chosen timestamps, chronological.
    pub timestamps: Vec<String>,
    /// Labels of the packages the timestamps cover.
    pub covered: Vec<String>,
    /// Labels of the packages nothing at this location covers.
    pub missing: Vec<String>,
}

/// Compute the greedy cover. `availability` maps a package label to the
/// timestamps at which it was present; an empty set means uncoverable.
pub fn greedy_cover(availability: &BTreeMap<String, BTreeSet<String>>) -> Cover {
    let mut uncovered: BTreeSet<&str> = availability
        .iter()
        .filter(|(_, timestamps)| !timestamps.is_empty())
        .map(|(label, _)| label.as_str())
        .collect();
    let missing: Vec<String> = availability
        .iter()
        .filter(|(_, timestamps)| timestamps.is_empty())
        .map(|(label, _)| label.clone())
        .collect();
    let covered: Vec<String> = uncovered.iter().map(|l| l.to_string()).collect();

    // timestamp -> packages present at it
    let mut by_timestamp: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (label, timestamps) in availability {
        for timestamp in timestamps {
            by_timestamp
                .entry(timestamp.as_str())
                .or_default()
                .insert(label.as_str());
        }
    }

    let mut chosen: Vec<String> = Vec::new();
    while !uncovered.is_empty() {
        // most packages first; iteration order makes the most recent
        // timestamp win ties
        let best = by_timestamp
            .iter()
            .map(|(timestamp, packages)| {
                let gain = packages.intersection(&uncovered).count();
                (gain, *timestamp)
            })
            .max()
            .filter(|(gain, _)| *gain > 0);
        let Some((_, timestamp)) = best else {
            break;
        };
        for label in &by_timestamp[timestamp] {
            uncovered.remove(label);
        }
        chosen.push(timestamp.to_string());
    }

    chosen.sort();
    Cover {
        timestamps: chosen,
        covered,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn availability(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        entries
            .iter()
            .map(|(label, timestamps)| {
                (
                    label.to_string(),
                    timestamps.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    const T1: &str = "20210221T150011Z";
    const T2: &str = "20210222T150011Z";
    const T3: &str = "20210223T150011Z";

    #[test]
    fn test_single_timestamp_covers_all() {
        let cover = greedy_cover(&availability(&[
            ("a=1", &[T1, T2]),
            ("b=2", &[T2]),
            ("c=3", &[T2, T3]),
        ]));
        assert_eq!(cover.timestamps, vec![T2]);
        assert!(cover.missing.is_empty());
        assert_eq!(cover.covered.len(), 3);
    }

    #[test]
    fn test_disjoint_packages_need_two_timestamps() {
        let cover = greedy_cover(&availability(&[("a=1", &[T1]), ("b=2", &[T3])]));
        assert_eq!(cover.timestamps, vec![T1, T3]);
        assert!(cover.missing.is_empty());
    }

    #[test]
    fn test_tie_breaks_on_most_recent() {
        // both timestamps cover one package; the newer one must win
        let cover = greedy_cover(&availability(&[("a=1", &[T1, T3])]));
        assert_eq!(cover.timestamps, vec![T3]);
    }

    #[test]
    fn test_missing_packages_reported() {
        let cover = greedy_cover(&availability(&[("a=1", &[T1]), ("ghost:amd64=9", &[])]));
        assert_eq!(cover.timestamps, vec![T1]);
        assert_eq!(cover.missing, vec!["ghost:amd64=9"]);
        assert_eq!(cover.covered, vec!["a=1"]);
    }

    #[test]
    fn test_nothing_coverable() {
        let cover = greedy_cover(&availability(&[("a=1", &[]), ("b=2", &[])]));
        assert!(cover.timestamps.is_empty());
        assert!(cover.covered.is_empty());
        assert_eq!(cover.missing.len(), 2);
    }

    #[test]
    fn test_every_choice_reduces_uncovered() {
        // greedy picks larger gain first, never a zero-gain timestamp
        let input = availability(&[
            ("a=1", &[T1]),
            ("b=2", &[T1, T2]),
            ("c=3", &[T2]),
            ("d=4", &[T2, T3]),
        ]);
        let cover = greedy_cover(&input);
        // T2 covers b, c, d; then T1 covers a
        assert_eq!(cover.timestamps, vec![T1, T2]);

        let mut uncovered: BTreeSet<&String> = input.keys().collect();
        for timestamp in &cover.timestamps {
            let before = uncovered.len();
            uncovered.retain(|label| !input[*label].contains(timestamp));
            assert!(uncovered.len() < before, "{timestamp} reduced nothing");
        }
    }
}
