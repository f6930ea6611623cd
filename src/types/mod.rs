//! Value model and request/response types.
//!
//! Canonical string forms:
//! - Entity: `User::"alice"` or `NS::User::"alice"`
//! - Extension values: `decimal("1.5")`, `ip("10.0.0.0/8")`,
//!   `datetime("2024-01-01")`, `duration("1h30m")`

mod datetime;
mod decimal;
mod decision;
mod entity;
mod entity_uid;
mod ipaddr;
mod pattern;
mod principal_policies;
mod request;
mod value;

pub use datetime::{Datetime, Duration};
pub use decimal::Decimal;
pub use decision::{
    Decision, Diagnostic, DiagnosticError, DiagnosticReason, Evaluation, PolicyVersion, Response,
};
pub use entity::{Entities, Entity};
pub use entity_uid::{EntityType, EntityUid};
pub use ipaddr::IpAddr;
pub use pattern::{Pattern, PatternComponent};
pub use principal_policies::{
    PolicyEffectFilter, PolicyMatch, PolicyMatchReason, PrincipalPolicies,
};
pub use request::Request;
pub use value::{Record, Set, Value};

pub(crate) use value::entity_from_json;
