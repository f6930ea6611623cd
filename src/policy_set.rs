//! Ordered collection of compiled policies.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ast::Policy;
use crate::error::PolicyError;
use crate::eval::{self, Evaluable};

/// Identifier of a policy within a [`PolicySet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    pub fn new(id: impl Into<String>) -> Self {
        PolicyId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PolicyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for PolicyId {
    fn from(id: &str) -> Self {
        PolicyId::new(id)
    }
}

/// A policy together with its compiled expression.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    id: PolicyId,
    policy: Policy,
    evaluable: Evaluable,
}

impl CompiledPolicy {
    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn evaluable(&self) -> &Evaluable {
        &self.evaluable
    }
}

/// Policies in insertion order, each compiled once when added.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<CompiledPolicy>,
    index: HashMap<PolicyId, usize>,
}

impl PolicySet {
    pub fn new() -> Self {
        PolicySet::default()
    }

    /// Build a set from parsed policies, naming them `policy0`, `policy1`, ...
    pub fn from_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        let mut set = PolicySet::new();
        for (n, policy) in policies.into_iter().enumerate() {
            set.push(PolicyId::new(format!("policy{n}")), policy);
        }
        set
    }

    pub fn add(&mut self, id: impl Into<PolicyId>, policy: Policy) -> Result<(), PolicyError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(PolicyError::DuplicatePolicyId(id.to_string()));
        }
        self.push(id, policy);
        Ok(())
    }

    fn push(&mut self, id: PolicyId, policy: Policy) {
        let evaluable = eval::compile(&policy);
        self.index.insert(id.clone(), self.policies.len());
        self.policies.push(CompiledPolicy {
            id,
            policy,
            evaluable,
        });
    }

    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.index.get(id).map(|&i| &self.policies[i].policy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledPolicy> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies in the JSON format, in set order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.policies.iter().map(|p| p.policy.to_json()).collect())
    }
}

impl Display for PolicySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (n, compiled) in self.policies.iter().enumerate() {
            if n > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{}", compiled.policy)?;
        }
        Ok(())
    }
}
