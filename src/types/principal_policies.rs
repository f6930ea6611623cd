//! Policies whose scope applies to a given principal.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use crate::ast::{Effect, Policy, Scope};
use crate::policy_set::PolicyId;
use crate::types::EntityUid;

/// Which scope clause made a policy match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, StrumDisplay,
)]
pub enum PolicyMatchReason {
    PrincipalEq,
    PrincipalIn,
    PrincipalAny,
    PrincipalIs,
    PrincipalIsIn,
    ActionEq,
    ActionIn,
    ActionAny,
    ResourceEq,
    ResourceIn,
    ResourceAny,
    ResourceIs,
    ResourceIsIn,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PolicyEffectFilter {
    #[default]
    Any,
    Permit,
    Forbid,
}

impl PolicyEffectFilter {
    pub fn accepts(self, effect: Effect) -> bool {
        match self {
            PolicyEffectFilter::Any => true,
            PolicyEffectFilter::Permit => effect == Effect::Permit,
            PolicyEffectFilter::Forbid => effect == Effect::Forbid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyMatch {
    pub policy_id: PolicyId,
    pub policy: Policy,
    pub reasons: Vec<PolicyMatchReason>,
}

impl Serialize for PolicyMatch {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = ser.serialize_struct("PolicyMatch", 3)?;
        s.serialize_field("policy_id", &self.policy_id)?;
        s.serialize_field("policy", &self.policy.to_json())?;
        s.serialize_field("reasons", &self.reasons)?;
        s.end()
    }
}

/// The policies listed for one principal, in policy-set order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrincipalPolicies {
    principal: EntityUid,
    #[serde(rename = "policies")]
    matches: Vec<PolicyMatch>,
}

impl PrincipalPolicies {
    pub fn new(principal: EntityUid, matches: Vec<PolicyMatch>) -> Self {
        PrincipalPolicies { principal, matches }
    }

    pub fn principal(&self) -> &EntityUid {
        &self.principal
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self) -> &[PolicyMatch] {
        &self.matches
    }

    pub fn policies(&self) -> Vec<&Policy> {
        self.matches.iter().map(|m| &m.policy).collect()
    }

    /// Actions named by the listed policies' action scopes. Unconstrained
    /// action scopes contribute nothing.
    pub fn actions(&self) -> Vec<&EntityUid> {
        self.matches
            .iter()
            .flat_map(|m| match &m.policy.action {
                Scope::Eq(uid) | Scope::In(uid) => vec![uid],
                Scope::InSet(uids) => uids.iter().collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Distinct action names, sorted.
    pub fn actions_by_name(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .map(|a| a.to_string())
            .sorted()
            .dedup()
            .collect()
    }

    /// The listed policies rendered as text, sorted.
    pub fn policies_by_name(&self) -> Vec<String> {
        self.matches
            .iter()
            .map(|m| m.policy.to_string())
            .sorted()
            .collect()
    }
}
