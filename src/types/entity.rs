//! Entities and the in-memory entity store.
//!
//! JSON follows the Cedar entities format: an array of objects with `uid`,
//! `attrs`, `parents` and optional `tags`. Entity references may be written
//! either as `{"type": .., "id": ..}` or wrapped in `{"__entity": ..}`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use super::{EntityUid, Record, Value};
use crate::error::PolicyError;
use crate::traits::EntityGetter;

#[derive(Deserialize)]
#[serde(untagged)]
enum UidRepr {
    Escaped {
        #[serde(rename = "__entity")]
        entity: EntityUid,
    },
    Plain(EntityUid),
}

impl From<UidRepr> for EntityUid {
    fn from(repr: UidRepr) -> Self {
        match repr {
            UidRepr::Escaped { entity } | UidRepr::Plain(entity) => entity,
        }
    }
}

pub(crate) fn deserialize_uid<'de, D: Deserializer<'de>>(d: D) -> Result<EntityUid, D::Error> {
    UidRepr::deserialize(d).map(EntityUid::from)
}

fn deserialize_uids<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<EntityUid>, D::Error> {
    let reprs = Vec::<UidRepr>::deserialize(d)?;
    Ok(reprs.into_iter().map(EntityUid::from).collect())
}

/// One node of the entity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "deserialize_uid")]
    uid: EntityUid,
    #[serde(default)]
    attrs: Record,
    #[serde(default, deserialize_with = "deserialize_uids")]
    parents: BTreeSet<EntityUid>,
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    tags: Record,
}

impl Entity {
    pub fn new(uid: EntityUid) -> Self {
        Entity {
            uid,
            attrs: Record::new(),
            parents: BTreeSet::new(),
            tags: Record::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: EntityUid) -> Self {
        self.parents.insert(parent);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn uid(&self) -> &EntityUid {
        &self.uid
    }

    pub fn attrs(&self) -> &Record {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn parents(&self) -> impl Iterator<Item = &EntityUid> {
        self.parents.iter()
    }

    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }
}

/// Entity store keyed by uid. Read-only during authorization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities(HashMap<EntityUid, Entity>);

impl Entities {
    pub fn new() -> Self {
        Entities::default()
    }

    /// Build a store, rejecting duplicate uids.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self, PolicyError> {
        let mut map = HashMap::new();
        for entity in entities {
            if map.contains_key(&entity.uid) {
                return Err(PolicyError::EntityError(format!(
                    "duplicate entity `{}`",
                    entity.uid
                )));
            }
            map.insert(entity.uid.clone(), entity);
        }
        Ok(Entities(map))
    }

    pub fn from_json_value(json: serde_json::Value) -> Result<Self, PolicyError> {
        let entities: Vec<Entity> =
            serde_json::from_value(json).map_err(|e| PolicyError::EntityError(e.to_string()))?;
        Entities::from_entities(entities)
    }

    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let entities: Vec<Entity> =
            serde_json::from_str(json).map_err(|e| PolicyError::EntityError(e.to_string()))?;
        Entities::from_entities(entities)
    }

    /// Insert or replace an entity.
    pub fn upsert(&mut self, entity: Entity) {
        self.0.insert(entity.uid.clone(), entity);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.values()
    }
}

impl EntityGetter for Entities {
    fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        self.0.get(uid)
    }
}
