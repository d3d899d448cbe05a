//! Namespace and table properties, and the properties reconciler.
//!
//! [`reconcile`] computes the property set that results from removing some keys
//! and upserting others, along with a summary of what actually changed. Every
//! backend's `update_namespace_properties` goes through it, so the outcome is the
//! same no matter which store backs the catalog.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Free-form string properties attached to a namespace or table.
pub type Properties = HashMap<String, String>;

/// Outcome of a properties update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesUpdateSummary {
    /// Keys that existed and were deleted
    #[serde(default)]
    pub removed: Vec<String>,
    /// Keys whose value changed, including newly added keys
    #[serde(default)]
    pub updated: Vec<String>,
    /// Keys requested for removal that did not exist
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Reject requests that both remove and update the same key.
///
/// The error names every overlapping key, in removal order.
pub fn check_for_overlap(removals: &[String], updates: &Properties) -> Result<()> {
    let overlap: Vec<String> = removals
        .iter()
        .filter(|key| updates.contains_key(key.as_str()))
        .cloned()
        .collect();

    if !overlap.is_empty() {
        return Err(Error::PropertiesConflict { keys: overlap });
    }
    Ok(())
}

/// Apply `removals` then `updates` to a copy of `current`.
///
/// `current` is never modified. On conflict nothing is computed and the error
/// lists all conflicting keys.
pub fn reconcile(
    current: &Properties,
    removals: &[String],
    updates: &Properties,
) -> Result<(Properties, PropertiesUpdateSummary)> {
    check_for_overlap(removals, updates)?;

    let mut props = current.clone();
    let mut removed = Vec::with_capacity(removals.len());
    let mut updated = Vec::with_capacity(updates.len());

    for key in removals {
        if props.remove(key).is_some() {
            removed.push(key.clone());
        }
    }

    // Sorted so the summary does not depend on hash order
    let mut pending: Vec<(&String, &String)> = updates.iter().collect();
    pending.sort_unstable_by(|a, b| a.0.cmp(b.0));

    for (key, value) in pending {
        if props.get(key) != Some(value) {
            props.insert(key.clone(), value.clone());
            updated.push(key.clone());
        }
    }

    let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();
    let missing = removals
        .iter()
        .filter(|key| !removed_set.contains(key.as_str()))
        .cloned()
        .collect();

    Ok((
        props,
        PropertiesUpdateSummary {
            removed,
            updated,
            missing,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_mixed_request() {
        let current = props(&[("a", "1"), ("b", "2")]);
        let (result, summary) = reconcile(
            &current,
            &keys(&["b", "c"]),
            &props(&[("a", "1"), ("d", "4")]),
        )
        .unwrap();

        assert_eq!(result, props(&[("a", "1"), ("d", "4")]));
        assert_eq!(summary.removed, keys(&["b"]));
        assert_eq!(summary.updated, keys(&["d"]));
        assert_eq!(summary.missing, keys(&["c"]));
    }

    #[test]
    fn test_reconcile_empty_current() {
        let (result, summary) =
            reconcile(&Properties::new(), &keys(&["x"]), &Properties::new()).unwrap();

        assert!(result.is_empty());
        assert!(summary.removed.is_empty());
        assert!(summary.updated.is_empty());
        assert_eq!(summary.missing, keys(&["x"]));
    }

    #[test]
    fn test_reconcile_conflict_leaves_current_untouched() {
        let current = props(&[("a", "0"), ("b", "0")]);
        let before = current.clone();

        let err = reconcile(
            &current,
            &keys(&["a", "b", "c"]),
            &props(&[("a", "1"), ("b", "2")]),
        )
        .unwrap_err();

        match err {
            Error::PropertiesConflict { keys: conflicting } => {
                assert_eq!(conflicting, keys(&["a", "b"]));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(current, before);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let current = props(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let removals = keys(&["a", "z"]);
        let updates = props(&[("b", "20"), ("d", "4")]);

        let (first, _) = reconcile(&current, &removals, &updates).unwrap();
        let (second, summary) = reconcile(&first, &removals, &updates).unwrap();

        assert_eq!(first, second);
        assert!(summary.removed.is_empty());
        assert!(summary.updated.is_empty());
        assert_eq!(summary.missing, removals);
    }

    #[test]
    fn test_noop_update_not_reported() {
        let current = props(&[("owner", "data-eng")]);
        let (_, summary) =
            reconcile(&current, &[], &props(&[("owner", "data-eng")])).unwrap();
        assert!(summary.updated.is_empty());
    }

    #[test]
    fn test_updated_keys_are_sorted() {
        let (_, summary) = reconcile(
            &Properties::new(),
            &[],
            &props(&[("zeta", "1"), ("alpha", "2"), ("mid", "3")]),
        )
        .unwrap();
        assert_eq!(summary.updated, keys(&["alpha", "mid", "zeta"]));
    }

    #[test]
    fn test_removed_and_missing_partition_removals() {
        let current = props(&[("a", "1"), ("c", "3")]);
        let removals = keys(&["a", "b", "c", "d"]);
        let (_, summary) = reconcile(&current, &removals, &Properties::new()).unwrap();

        for key in &removals {
            let in_removed = summary.removed.contains(key);
            let in_missing = summary.missing.contains(key);
            assert!(in_removed ^ in_missing, "{key} must be in exactly one list");
        }
    }

    #[test]
    fn test_summary_json_keys() {
        let summary = PropertiesUpdateSummary {
            removed: keys(&["a"]),
            updated: vec![],
            missing: keys(&["b"]),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["removed"], serde_json::json!(["a"]));
        assert_eq!(json["updated"], serde_json::json!([]));
        assert_eq!(json["missing"], serde_json::json!(["b"]));
    }
}
