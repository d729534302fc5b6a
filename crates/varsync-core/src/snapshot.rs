//! Point-in-time reads of every tracked field

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manifest::Manifest;
use crate::source::{Skill, ValueSource};

/// Value recorded for a field the client could not resolve
pub const UNRESOLVED: i32 = -1;

/// Tracked values of one identity at one point in time.
///
/// The same shape doubles as a [`Delta`]; ordered maps keep the serialized
/// form stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Varbit id -> extracted value
    pub varb: BTreeMap<i32, i32>,
    /// Varp id -> raw value
    pub varp: BTreeMap<i32, i32>,
    /// Skill name -> level
    pub level: BTreeMap<String, i32>,
}

/// Entries of a snapshot not yet present in the baseline
pub type Delta = Snapshot;

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when all three maps are empty
    pub fn is_empty(&self) -> bool {
        self.varb.is_empty() && self.varp.is_empty() && self.level.is_empty()
    }

    /// Total number of entries across the three maps
    pub fn len(&self) -> usize {
        self.varb.len() + self.varp.len() + self.level.len()
    }
}

/// Read every field the manifest names, plus all skill levels.
///
/// Never fails: a field the source cannot resolve is recorded as
/// [`UNRESOLVED`] rather than dropped.
pub fn build_snapshot(source: &dyn ValueSource, manifest: &Manifest) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for &id in &manifest.varbits {
        let value = source
            .varbit_composition(id)
            .and_then(|composition| {
                source
                    .varp(composition.index)
                    .map(|raw| composition.extract(raw))
            })
            .unwrap_or(UNRESOLVED);
        snapshot.varb.insert(id, value);
    }

    for &id in &manifest.varps {
        snapshot
            .varp
            .insert(id, source.varp(id).unwrap_or(UNRESOLVED));
    }

    for skill in Skill::ALL {
        snapshot.level.insert(
            skill.name().to_string(),
            source.skill_level(skill).unwrap_or(UNRESOLVED),
        );
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{StaticValueSource, VarbitComposition};

    #[test]
    fn test_build_reads_manifest_fields() {
        let source = StaticValueSource::new()
            .with_varp(101, 0b1101)
            .with_varp(200, 55)
            .with_varbit(7, VarbitComposition::new(101, 2, 3))
            .with_level(Skill::Magic, 94);
        let manifest = Manifest::new(vec![7], vec![101, 200]);

        let snapshot = build_snapshot(&source, &manifest);

        assert_eq!(snapshot.varb.get(&7), Some(&0b11));
        assert_eq!(snapshot.varp.get(&101), Some(&0b1101));
        assert_eq!(snapshot.varp.get(&200), Some(&55));
        assert_eq!(snapshot.level.get("Magic"), Some(&94));
        assert_eq!(snapshot.level.len(), Skill::ALL.len());
    }

    #[test]
    fn test_unknown_fields_degrade_to_unresolved() {
        let source = StaticValueSource::new()
            .with_varbit(9, VarbitComposition::new(300, 0, 4));
        let manifest = Manifest::new(vec![8, 9], vec![404]);

        let snapshot = build_snapshot(&source, &manifest);

        // 8 has no composition, 9 has one but its backing varp is missing
        assert_eq!(snapshot.varb.get(&8), Some(&UNRESOLVED));
        assert_eq!(snapshot.varb.get(&9), Some(&UNRESOLVED));
        assert_eq!(snapshot.varp.get(&404), Some(&UNRESOLVED));
        assert_eq!(snapshot.level.get("Attack"), Some(&UNRESOLVED));
    }

    #[test]
    fn test_serialized_shape() {
        let mut snapshot = Snapshot::new();
        snapshot.varb.insert(1, 5);
        snapshot.level.insert("Attack".to_string(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"varb": {"1": 5}, "varp": {}, "level": {"Attack": 1}})
        );
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
    }
}
