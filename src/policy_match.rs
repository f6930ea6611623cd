//! Scope-only matching, used to list the policies that may apply to a
//! principal without evaluating their conditions.
//!
//! `None` means the clause excludes the query. The action and resource
//! matchers take an optional query; an absent query matches every clause
//! and contributes no reason.

use crate::ast::Scope;
use crate::eval::is_descendant_of;
use crate::traits::EntityGetter;
use crate::types::{EntityUid, PolicyMatchReason};

pub(crate) fn principal_match_reason(
    scope: &Scope,
    principal: &EntityUid,
    entities: &dyn EntityGetter,
) -> Option<PolicyMatchReason> {
    let is_in = |target: &EntityUid| is_descendant_of(entities, principal, std::slice::from_ref(target));
    match scope {
        Scope::All => Some(PolicyMatchReason::PrincipalAny),
        Scope::Eq(uid) if uid == principal => Some(PolicyMatchReason::PrincipalEq),
        Scope::In(uid) if is_in(uid) => Some(PolicyMatchReason::PrincipalIn),
        Scope::Is(ty) if ty == principal.entity_type() => Some(PolicyMatchReason::PrincipalIs),
        Scope::IsIn(ty, uid) if ty == principal.entity_type() && is_in(uid) => {
            Some(PolicyMatchReason::PrincipalIsIn)
        }
        _ => None,
    }
}

pub(crate) fn action_match_reason(
    scope: &Scope,
    action: Option<&EntityUid>,
    entities: &dyn EntityGetter,
) -> Option<Option<PolicyMatchReason>> {
    let Some(action) = action else {
        return Some(None);
    };

    let reason = match scope {
        Scope::All => PolicyMatchReason::ActionAny,
        Scope::Eq(uid) if uid == action => PolicyMatchReason::ActionEq,
        Scope::In(uid) if is_descendant_of(entities, action, std::slice::from_ref(uid)) => {
            PolicyMatchReason::ActionIn
        }
        Scope::InSet(uids) if is_descendant_of(entities, action, uids) => {
            PolicyMatchReason::ActionIn
        }
        _ => return None,
    };
    Some(Some(reason))
}

pub(crate) fn resource_match_reason(
    scope: &Scope,
    resource: Option<&EntityUid>,
    entities: &dyn EntityGetter,
) -> Option<Option<PolicyMatchReason>> {
    let Some(resource) = resource else {
        return Some(None);
    };

    let is_in = |target: &EntityUid| is_descendant_of(entities, resource, std::slice::from_ref(target));
    let reason = match scope {
        Scope::All => PolicyMatchReason::ResourceAny,
        Scope::Eq(uid) if uid == resource => PolicyMatchReason::ResourceEq,
        Scope::In(uid) if is_in(uid) => PolicyMatchReason::ResourceIn,
        Scope::Is(ty) if ty == resource.entity_type() => PolicyMatchReason::ResourceIs,
        Scope::IsIn(ty, uid) if ty == resource.entity_type() && is_in(uid) => {
            PolicyMatchReason::ResourceIsIn
        }
        _ => return None,
    };
    Some(Some(reason))
}
