//! Decision procedure over a policy set.
//!
//! Every policy is evaluated for every request so the diagnostic is
//! complete. A matching `forbid` wins over any `permit`; with no match the
//! answer is an implicit deny.

use tracing::debug;

use crate::ast::Effect;
use crate::eval::Env;
use crate::policy_set::PolicySet;
use crate::traits::EntityGetter;
use crate::types::{Decision, Diagnostic, DiagnosticError, DiagnosticReason, Request, Response};

#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn new() -> Self {
        Authorizer
    }

    pub fn is_authorized(
        &self,
        request: &Request,
        entities: &dyn EntityGetter,
        policies: &PolicySet,
    ) -> Response {
        let env = Env::new(request, entities);
        let mut permits = Vec::new();
        let mut forbids = Vec::new();
        let mut errors = Vec::new();

        for compiled in policies.iter() {
            let policy = compiled.policy();
            match compiled.evaluable().is_true(&env) {
                Ok(true) => {
                    let reason = DiagnosticReason {
                        policy_id: compiled.id().clone(),
                        position: policy.position,
                    };
                    match policy.effect {
                        Effect::Permit => permits.push(reason),
                        Effect::Forbid => forbids.push(reason),
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(
                        event = "Authorize",
                        phase = "PolicyError",
                        policy_id = compiled.id().as_str(),
                        error = err.to_string()
                    );
                    errors.push(DiagnosticError {
                        policy_id: compiled.id().clone(),
                        position: policy.position,
                        message: err.to_string(),
                    });
                }
            }
        }

        let (decision, reasons) = if !forbids.is_empty() {
            (Decision::Deny, forbids)
        } else if !permits.is_empty() {
            (Decision::Allow, permits)
        } else {
            (Decision::Deny, Vec::new())
        };

        debug!(
            event = "Authorize",
            phase = "Decision",
            decision = %decision,
            reasons = reasons.len(),
            errors = errors.len()
        );

        Response {
            decision,
            diagnostic: Diagnostic { reasons, errors },
        }
    }
}

/// Authorize `request` against `policies` with a default [`Authorizer`].
pub fn authorize(policies: &PolicySet, entities: &dyn EntityGetter, request: &Request) -> Response {
    Authorizer::new().is_authorized(request, entities, policies)
}
