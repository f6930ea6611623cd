//! Entity identifiers: a (possibly namespaced) type path plus an id.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PolicyError;
use crate::parser;
use crate::parser::lexer::quote;

/// Type path of an entity, e.g. `User` or `Infra::Host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(path: impl Into<String>) -> Self {
        EntityType(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(path: &str) -> Self {
        EntityType::new(path)
    }
}

const UNSPECIFIED_TYPE: &str = "__cedar::unspecified";

/// Identifies one entity. Equality is structural over type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct EntityUid {
    #[serde(rename = "type")]
    entity_type: EntityType,
    id: String,
}

impl EntityUid {
    pub fn new(entity_type: impl Into<EntityType>, id: impl Into<String>) -> Self {
        EntityUid {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Placeholder for a request slot that names no entity.
    pub fn unspecified() -> Self {
        EntityUid::new(EntityType::new(UNSPECIFIED_TYPE), "")
    }

    pub fn is_unspecified(&self) -> bool {
        self.entity_type.as_str() == UNSPECIFIED_TYPE
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for EntityUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}::{}", self.entity_type, quote(&self.id, false))
    }
}

impl FromStr for EntityUid {
    type Err = PolicyError;

    /// Accepts Cedar entity literal syntax, e.g. `Infra::Host::"web-01"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parser::parse_entity_uid(s)?)
    }
}
