//! Authorization request type.

use serde::{Deserialize, Serialize};

use super::entity::deserialize_uid;
use super::{EntityUid, Record, Value};

/// The four inputs of an authorization call.
///
/// Slots that name no entity should hold [`EntityUid::unspecified`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(deserialize_with = "deserialize_uid")]
    pub principal: EntityUid,
    #[serde(deserialize_with = "deserialize_uid")]
    pub action: EntityUid,
    #[serde(deserialize_with = "deserialize_uid")]
    pub resource: EntityUid,
    #[serde(default)]
    pub context: Record,
}

impl Request {
    pub fn new(principal: EntityUid, action: EntityUid, resource: EntityUid) -> Self {
        Request {
            principal,
            action,
            resource,
            context: Record::new(),
        }
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
