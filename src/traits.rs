use std::collections::HashMap;

use crate::types::{Entity, EntityUid};

/// Read-only entity lookup used during evaluation.
///
/// Implement this to evaluate against an entity source other than
/// [`crate::types::Entities`], e.g. a cache shared between requests.
pub trait EntityGetter {
    fn get(&self, uid: &EntityUid) -> Option<&Entity>;
}

impl EntityGetter for HashMap<EntityUid, Entity> {
    fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        HashMap::get(self, uid)
    }
}
