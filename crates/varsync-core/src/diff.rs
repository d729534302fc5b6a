//! Delta computation and baseline merge
//!
//! The default [`DiffMode::PresenceSubtraction`] drops every key the baseline
//! already holds, whatever its value. Once a key is merged it never re-enters
//! a delta, even if its value later changes. [`DiffMode::ValueComparison`]
//! keeps keys whose value differs from the baseline's instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::snapshot::{Delta, Snapshot};

/// How a snapshot is compared against its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Remove every key present in the baseline
    #[default]
    PresenceSubtraction,
    /// Remove only keys whose baseline value is identical
    ValueComparison,
}

/// Presence-subtraction diff of `new` against `baseline`
pub fn diff(new: &Snapshot, baseline: &Snapshot) -> Delta {
    diff_with(DiffMode::PresenceSubtraction, new, baseline)
}

/// Diff of `new` against `baseline` under the given mode
pub fn diff_with(mode: DiffMode, new: &Snapshot, baseline: &Snapshot) -> Delta {
    Delta {
        varb: subtract(mode, &new.varb, &baseline.varb),
        varp: subtract(mode, &new.varp, &baseline.varp),
        level: subtract(mode, &new.level, &baseline.level),
    }
}

fn subtract<K: Ord + Clone>(
    mode: DiffMode,
    new: &BTreeMap<K, i32>,
    baseline: &BTreeMap<K, i32>,
) -> BTreeMap<K, i32> {
    new.iter()
        .filter(|(key, value)| match (mode, baseline.get(*key)) {
            (_, None) => true,
            (DiffMode::PresenceSubtraction, Some(_)) => false,
            (DiffMode::ValueComparison, Some(old)) => old != *value,
        })
        .map(|(key, value)| (key.clone(), *value))
        .collect()
}

/// Overlay `delta` onto `baseline`. Existing keys are replaced, none removed.
pub fn merge(baseline: &mut Snapshot, delta: &Delta) {
    baseline
        .varb
        .extend(delta.varb.iter().map(|(k, v)| (*k, *v)));
    baseline
        .varp
        .extend(delta.varp.iter().map(|(k, v)| (*k, *v)));
    baseline
        .level
        .extend(delta.level.iter().map(|(k, v)| (k.clone(), *v)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn varb(entries: &[(i32, i32)]) -> Snapshot {
        Snapshot {
            varb: entries.iter().copied().collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_first_observation_then_identical_snapshot() {
        let mut baseline = Snapshot::new();
        let snapshot = varb(&[(1, 5)]);

        let delta = diff(&snapshot, &baseline);
        assert_eq!(delta, varb(&[(1, 5)]));

        merge(&mut baseline, &delta);
        assert_eq!(baseline, varb(&[(1, 5)]));

        assert!(diff(&snapshot, &baseline).is_empty());
    }

    #[test]
    fn test_presence_subtraction_suppresses_changed_value() {
        let baseline = varb(&[(1, 5)]);
        let snapshot = varb(&[(1, 7)]);

        assert!(diff(&snapshot, &baseline).is_empty());
    }

    #[test]
    fn test_value_comparison_reports_changed_value() {
        let baseline = varb(&[(1, 5), (2, 3)]);
        let snapshot = varb(&[(1, 7), (2, 3)]);

        let delta = diff_with(DiffMode::ValueComparison, &snapshot, &baseline);
        assert_eq!(delta, varb(&[(1, 7)]));
    }

    #[test]
    fn test_merge_replaces_and_keeps() {
        let mut baseline = varb(&[(1, 5), (2, 2)]);
        baseline.level.insert("Attack".into(), 40);

        let mut delta = varb(&[(1, 9), (3, 3)]);
        delta.level.insert("Defence".into(), 1);
        merge(&mut baseline, &delta);

        assert_eq!(baseline.varb, varb(&[(1, 9), (2, 2), (3, 3)]).varb);
        assert_eq!(baseline.level.len(), 2);
    }

    fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
        (
            prop::collection::btree_map(0i32..40, any::<i32>(), 0..12),
            prop::collection::btree_map(0i32..40, any::<i32>(), 0..12),
            prop::collection::btree_map("[a-e]{1,2}", 1i32..100, 0..6),
        )
            .prop_map(|(varb, varp, level)| Snapshot { varb, varp, level })
    }

    fn arb_mode() -> impl Strategy<Value = DiffMode> {
        prop_oneof![
            Just(DiffMode::PresenceSubtraction),
            Just(DiffMode::ValueComparison)
        ]
    }

    fn keys(s: &Snapshot) -> BTreeSet<String> {
        s.varb
            .keys()
            .map(|k| format!("b{k}"))
            .chain(s.varp.keys().map(|k| format!("p{k}")))
            .chain(s.level.keys().map(|k| format!("l{k}")))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_self_diff_is_empty(b in arb_snapshot(), mode in arb_mode()) {
            prop_assert!(diff_with(mode, &b, &b).is_empty());
        }

        #[test]
        fn prop_merged_diff_is_idempotent(s in arb_snapshot(), b in arb_snapshot(), mode in arb_mode()) {
            let mut merged = b.clone();
            merge(&mut merged, &diff_with(mode, &s, &b));
            prop_assert!(diff_with(mode, &s, &merged).is_empty());
        }

        #[test]
        fn prop_delta_keys_come_from_snapshot_only(s in arb_snapshot(), b in arb_snapshot()) {
            let delta = diff(&s, &b);
            let delta_keys = keys(&delta);
            prop_assert!(delta_keys.is_subset(&keys(&s)));
            prop_assert!(delta_keys.is_disjoint(&keys(&b)));
        }

        #[test]
        fn prop_merge_is_key_union(b in arb_snapshot(), d in arb_snapshot()) {
            let mut merged = b.clone();
            merge(&mut merged, &d);
            let expected: BTreeSet<_> = keys(&b).union(&keys(&d)).cloned().collect();
            prop_assert_eq!(keys(&merged), expected);
        }
    }
}
