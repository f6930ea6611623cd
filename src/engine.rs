use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::authorizer::Authorizer;
use crate::error::PolicyError;
use crate::loader;
use crate::metrics::{self, EvaluationPhases, EvaluationStats};
use crate::policy_match::{action_match_reason, principal_match_reason, resource_match_reason};
use crate::policy_set::PolicySet;
use crate::timers::{PhaseTimer, as_millis_f64};
use crate::traits::EntityGetter;
use crate::types::{
    EntityUid, Evaluation, PolicyEffectFilter, PolicyMatch, PolicyVersion, PrincipalPolicies,
    Request,
};

/// A policy set together with the version it was loaded as.
#[derive(Debug)]
struct Snapshot {
    policies: PolicySet,
    version: PolicyVersion,
}

impl Snapshot {
    fn new(policies: PolicySet, source: &str) -> Self {
        let version = PolicyVersion {
            hash: format!("{:x}", Sha256::digest(source.as_bytes())),
            loaded_at: Utc::now().to_rfc3339(),
        };
        Snapshot { policies, version }
    }
}

/// The main engine handle. Cloneable and thread-safe; clones share the
/// same policy snapshot, and a reload is seen by all of them.
#[derive(Clone, Debug)]
pub struct PolicyEngine {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl PolicyEngine {
    pub fn new_from_str(policy_text: &str) -> Result<Self, PolicyError> {
        let set = loader::compile_policy(policy_text)?;
        Ok(PolicyEngine::from_snapshot(Snapshot::new(set, policy_text)))
    }

    /// Build an engine from policies in the JSON format.
    pub fn new_from_json(policy_json: &str) -> Result<Self, PolicyError> {
        let set = loader::compile_policy_json(policy_json)?;
        Ok(PolicyEngine::from_snapshot(Snapshot::new(set, policy_json)))
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        info!(
            event = "Load",
            policies = snapshot.policies.len(),
            hash = snapshot.version.hash.as_str()
        );
        PolicyEngine {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Replace the policy set. On error the current set stays in place.
    pub fn reload_from_str(&self, policy_text: &str) -> Result<(), PolicyError> {
        let set = loader::compile_policy(policy_text)?;
        self.swap(Snapshot::new(set, policy_text))
    }

    pub fn reload_from_json(&self, policy_json: &str) -> Result<(), PolicyError> {
        let set = loader::compile_policy_json(policy_json)?;
        self.swap(Snapshot::new(set, policy_json))
    }

    fn swap(&self, snapshot: Snapshot) -> Result<(), PolicyError> {
        let count = snapshot.policies.len();
        let hash = snapshot.version.hash.clone();
        *self.inner.write()? = Arc::new(snapshot);
        info!(event = "Reload", policies = count, hash = hash.as_str());
        metrics::record_reload(count, hash);
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>, PolicyError> {
        Ok(Arc::clone(&*self.inner.read()?))
    }

    pub fn current_version(&self) -> Result<PolicyVersion, PolicyError> {
        Ok(self.snapshot()?.version.clone())
    }

    /// The loaded policy set.
    pub fn policies(&self) -> Result<PolicySet, PolicyError> {
        Ok(self.snapshot()?.policies.clone())
    }

    pub fn evaluate(
        &self,
        request: &Request,
        entities: &dyn EntityGetter,
    ) -> Result<Evaluation, PolicyError> {
        let started = Instant::now();
        let mut snapshot_time = Duration::ZERO;
        let mut authorize_time = Duration::ZERO;

        debug!(
            event = "Request",
            phase = "Evaluation",
            principal = request.principal.to_string(),
            action = request.action.to_string(),
            resource = request.resource.to_string()
        );

        let snapshot = {
            let _timer = PhaseTimer::new(&mut snapshot_time);
            self.snapshot()?
        };

        let response = {
            let _timer = PhaseTimer::new(&mut authorize_time);
            Authorizer::new().is_authorized(request, entities, &snapshot.policies)
        };

        debug!(
            event = "Request",
            phase = "Result",
            decision = %response.decision,
            errors = response.diagnostic.errors.len()
        );
        info!(
            event = "Request",
            phase = "Decision",
            decision = %response.decision,
            reasons = response.diagnostic.reason_ids().join(","),
            hash = snapshot.version.hash.as_str()
        );

        let total = started.elapsed();
        metrics::record_evaluation(
            EvaluationStats {
                duration: total,
                allowed: response.is_allowed(),
                errors: response.diagnostic.errors.len(),
                principal_id: request.principal.to_string(),
                action_id: request.action.to_string(),
            },
            EvaluationPhases {
                snapshot_ms: as_millis_f64(snapshot_time),
                authorize_ms: as_millis_f64(authorize_time),
                total_ms: as_millis_f64(total),
            },
        );

        Ok(Evaluation {
            response,
            version: snapshot.version.clone(),
        })
    }

    /// Policies whose principal scope admits `principal`, whatever their
    /// action, resource and conditions.
    pub fn list_policies_for_principal(
        &self,
        principal: &EntityUid,
        entities: &dyn EntityGetter,
    ) -> Result<PrincipalPolicies, PolicyError> {
        self.list_policies_matching(principal, None, None, entities, PolicyEffectFilter::Any)
    }

    /// Like [`list_policies_for_principal`](Self::list_policies_for_principal),
    /// additionally requiring the action and resource scopes to admit the
    /// given entities when present. Conditions are not evaluated.
    pub fn list_policies_matching(
        &self,
        principal: &EntityUid,
        action: Option<&EntityUid>,
        resource: Option<&EntityUid>,
        entities: &dyn EntityGetter,
        filter: PolicyEffectFilter,
    ) -> Result<PrincipalPolicies, PolicyError> {
        let snapshot = self.snapshot()?;
        let mut matches = Vec::new();

        for compiled in snapshot.policies.iter() {
            let policy = compiled.policy();
            if !filter.accepts(policy.effect) {
                continue;
            }
            let Some(principal_reason) =
                principal_match_reason(&policy.principal, principal, entities)
            else {
                continue;
            };
            let Some(action_reason) = action_match_reason(&policy.action, action, entities) else {
                continue;
            };
            let Some(resource_reason) =
                resource_match_reason(&policy.resource, resource, entities)
            else {
                continue;
            };

            let reasons = std::iter::once(principal_reason)
                .chain(action_reason)
                .chain(resource_reason)
                .collect();
            matches.push(PolicyMatch {
                policy_id: compiled.id().clone(),
                policy: policy.clone(),
                reasons,
            });
        }

        debug!(
            event = "List",
            principal = principal.to_string(),
            matches = matches.len()
        );
        Ok(PrincipalPolicies::new(principal.clone(), matches))
    }
}

#[cfg(test)]
mod tests;
