use std::collections::BTreeMap;

use super::EntityKind;
use crate::errors::{RemapError, RemapResult};

/// Source id → {target database id → copied id} for one entity kind.
///
/// Entries are only ever added during a run; a lookup miss is an explicit
/// [`RemapError::Unmapped`].
#[derive(Debug, Clone)]
pub struct TranslationMap {
    kind: EntityKind,
    entries: BTreeMap<i32, BTreeMap<i32, i32>>,
}

impl TranslationMap {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, source_id: i32, target: i32, copied_id: i32) {
        self.entries
            .entry(source_id)
            .or_default()
            .insert(target, copied_id);
    }

    /// Copied id of `source_id` in `target`, if it was copied there
    pub fn lookup(&self, source_id: i32, target: i32) -> Option<i32> {
        self.entries
            .get(&source_id)
            .and_then(|copies| copies.get(&target))
            .copied()
    }

    pub fn get(&self, source_id: i32, target: i32) -> RemapResult<i32> {
        self.lookup(source_id, target).ok_or(RemapError::Unmapped {
            kind: self.kind,
            source_id,
            target,
        })
    }

    pub fn contains(&self, source_id: i32, target: i32) -> bool {
        self.lookup(source_id, target).is_some()
    }

    /// Every (target, copied id) pair of one source row, ordered by target
    pub fn copies_of(&self, source_id: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.entries
            .get(&source_id)
            .into_iter()
            .flat_map(|copies| copies.iter().map(|(target, id)| (*target, *id)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The translation maps threaded through one copy run
#[derive(Debug, Clone)]
pub struct IdMaps {
    pub collections: TranslationMap,
    pub cards: TranslationMap,
    pub dashboards: TranslationMap,
    pub dashboard_cards: TranslationMap,
}

impl IdMaps {
    pub fn new() -> Self {
        Self {
            collections: TranslationMap::new(EntityKind::Collection),
            cards: TranslationMap::new(EntityKind::Card),
            dashboards: TranslationMap::new(EntityKind::Dashboard),
            dashboard_cards: TranslationMap::new(EntityKind::DashboardCard),
        }
    }
}

impl Default for IdMaps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_miss() {
        let mut map = TranslationMap::new(EntityKind::Card);
        map.insert(5, 2, 50);
        map.insert(5, 3, 60);

        assert_eq!(map.get(5, 2), Ok(50));
        assert_eq!(map.get(5, 3), Ok(60));
        assert_eq!(
            map.get(5, 4),
            Err(RemapError::Unmapped {
                kind: EntityKind::Card,
                source_id: 5,
                target: 4,
            })
        );
        assert!(!map.contains(6, 2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_copies_ordered_by_target() {
        let mut map = TranslationMap::new(EntityKind::Collection);
        map.insert(1, 9, 90);
        map.insert(1, 3, 30);

        let copies: Vec<_> = map.copies_of(1).collect();
        assert_eq!(copies, vec![(3, 30), (9, 90)]);
        assert_eq!(map.copies_of(2).count(), 0);
    }
}
