//! Entity-hierarchy membership search.

use std::collections::{HashSet, VecDeque};

use crate::traits::EntityGetter;
use crate::types::EntityUid;

/// True if `start` or any ancestor reachable through `parents` edges is one
/// of `targets`. Every entity is visited at most once, so cyclic graphs
/// terminate. Entities missing from the store have no parents.
pub fn is_descendant_of(
    entities: &dyn EntityGetter,
    start: &EntityUid,
    targets: &[EntityUid],
) -> bool {
    if targets.is_empty() {
        return false;
    }
    if targets.contains(start) {
        return true;
    }

    let mut visited: HashSet<&EntityUid> = HashSet::from([start]);
    let mut queue: VecDeque<&EntityUid> = VecDeque::from([start]);
    while let Some(uid) = queue.pop_front() {
        let Some(entity) = entities.get(uid) else {
            continue;
        };
        for parent in entity.parents() {
            if targets.contains(parent) {
                return true;
            }
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entities, Entity};

    fn uid(id: &str) -> EntityUid {
        EntityUid::new("Group", id)
    }

    fn graph(edges: &[(&str, &str)]) -> Entities {
        let mut entities = Entities::new();
        for (child, parent) in edges {
            let existing = entities.get(&uid(child)).cloned();
            let entity = existing.unwrap_or_else(|| Entity::new(uid(child)));
            entities.upsert(entity.with_parent(uid(parent)));
        }
        entities
    }

    #[test]
    fn test_self_membership() {
        let entities = Entities::new();
        assert!(is_descendant_of(&entities, &uid("a"), &[uid("a")]));
        assert!(!is_descendant_of(&entities, &uid("a"), &[]));
    }

    #[test]
    fn test_transitive_membership() {
        let entities = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert!(is_descendant_of(&entities, &uid("a"), &[uid("d")]));
        assert!(!is_descendant_of(&entities, &uid("d"), &[uid("a")]));
    }

    #[test]
    fn test_cycle_terminates() {
        let entities = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(is_descendant_of(&entities, &uid("a"), &[uid("c")]));
        assert!(!is_descendant_of(&entities, &uid("a"), &[uid("z")]));
    }

    #[test]
    fn test_missing_parent_entity() {
        let entities = graph(&[("a", "ghost")]);
        assert!(is_descendant_of(&entities, &uid("a"), &[uid("ghost")]));
        assert!(!is_descendant_of(&entities, &uid("a"), &[uid("other")]));
    }
}
