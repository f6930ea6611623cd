//! Authorization outcome types: decision, diagnostic and policy version.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;
use utoipa::ToSchema;

use crate::parser::Position;
use crate::policy_set::PolicyId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, StrumDisplay,
)]
pub enum Decision {
    Allow,
    Deny,
}

/// A policy that determined the decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DiagnosticReason {
    pub policy_id: PolicyId,
    pub position: Position,
}

/// A policy that failed to evaluate and was treated as not matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DiagnosticError {
    pub policy_id: PolicyId,
    pub position: Position,
    pub message: String,
}

/// Explanation of a decision. Both lists follow policy-set order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Diagnostic {
    pub reasons: Vec<DiagnosticReason>,
    pub errors: Vec<DiagnosticError>,
}

impl Diagnostic {
    pub fn reason_ids(&self) -> Vec<&str> {
        self.reasons.iter().map(|r| r.policy_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Response {
    pub decision: Decision,
    pub diagnostic: Diagnostic,
}

impl Response {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.decision)?;
        if !self.diagnostic.reasons.is_empty() {
            write!(f, " ({})", self.diagnostic.reason_ids().join(", "))?;
        }
        if !self.diagnostic.errors.is_empty() {
            write!(f, " [{} errors]", self.diagnostic.errors.len())?;
        }
        Ok(())
    }
}

/// Version metadata for the policy set used during an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct PolicyVersion {
    /// SHA-256 of the policy source, hex encoded.
    pub hash: String,
    /// When this policy set was loaded into the engine (RFC 3339).
    pub loaded_at: String,
}

impl Display for PolicyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} @ {}", self.hash, self.loaded_at)
    }
}

/// An engine response tagged with the policy version that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct Evaluation {
    pub response: Response,
    pub version: PolicyVersion,
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}(hash={})", self.response, self.version.hash)
    }
}
