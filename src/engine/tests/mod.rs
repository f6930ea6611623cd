use super::*;
use crate::types::{Decision, Entities, Entity, PolicyMatchReason, Value};
use sha2::{Digest, Sha256};
use yare::parameterized;


const TEST_POLICY: &str = r#"
permit (
    principal == User::"alice",
    action in [Action::"view", Action::"edit", Action::"delete"],
    resource == Photo::"VacationPhoto94.jpg"
);

permit (
    principal == User::"bob",
    action == Action::"view",
    resource == Photo::"VacationPhoto94.jpg"
);
"#;

const TEST_POLICY_WITHOUT_BOB: &str = r#"
permit (
    principal == User::"alice",
    action in [Action::"view", Action::"edit", Action::"delete"],
    resource == Photo::"VacationPhoto94.jpg"
);
"#;

const TEST_POLICY_WITH_CONTEXT: &str = r#"
permit (
    principal == User::"alice",
    action == Action::"create_host",
    resource is Host
) when {
    resource.name like "web*" &&
    resource.ip.isInRange(ip("192.0.1.0/24"))
};

permit (
    principal == User::"bob",
    action == Action::"create_host",
    resource is Host
) when {
    resource.name like "bob*" &&
    resource.ip.isInRange(ip("192.0.0.0/24"))
};
"#;

const TEST_PERMISSION_POLICY: &str = r#"
permit (
    principal == User::"alice",
    action in [Action::"view", Action::"edit", Action::"delete"],
    resource == Photo::"VacationPhoto94.jpg"
);

permit (
    principal == User::"alice",
    action == Action::"create_host",
    resource is Host
);

permit (
    principal == User::"bob",
    action == Action::"view",
    resource == Photo::"VacationPhoto94.jpg"
);
"#;

const TEST_POLICY_WITH_FORBID: &str = r#"
permit (
    principal == User::"alice",
    action in [Action::"view", Action::"edit", Action::"delete"],
    resource == Photo::"VacationPhoto94.jpg"
);
forbid (
    principal == User::"alice",
    action == Action::"edit",
    resource == Photo::"VacationPhoto94.jpg"
);
forbid (
    principal,
    action == Action::"delete",
    resource == Photo::"VacationPhoto94.jpg"
);
"#;

const TEST_POLICY_WITH_GROUPS: &str = r#"
permit (
    principal in Group::"admins",
    action in [Action::"delete", Action::"view"],
    resource is Photo
);

permit (
    principal in Group::"users",
    action == Action::"view",
    resource is Photo
);
"#;

const TEST_POLICY_WITH_IS_AND_ISIN: &str = r#"
permit (
    principal is User,
    action == Action::"read",
    resource
);

permit (
    principal is User in Group::"admins",
    action == Action::"write",
    resource
);

permit (
    principal is Group,
    action == Action::"group_read",
    resource
);
"#;

const TEST_POLICY_WITH_RESOURCE_CONSTRAINTS: &str = r#"
permit (
    principal,
    action == Action::"view",
    resource is Photo
);
permit (
    principal,
    action == Action::"edit",
    resource == Photo::"vacation.jpg"
);
permit (
    principal,
    action == Action::"create",
    resource is Host
);
"#;

fn engine_from_policy(policy_text: &str) -> PolicyEngine {
    PolicyEngine::new_from_str(policy_text).expect("policy should load")
}

fn user(id: &str) -> EntityUid {
    EntityUid::new("User", id)
}

fn group(id: &str) -> EntityUid {
    EntityUid::new("Group", id)
}

fn action(id: &str) -> EntityUid {
    EntityUid::new("Action", id)
}

fn user_request(user_id: &str, action_id: &str, resource: EntityUid) -> Request {
    Request::new(user(user_id), action(action_id), resource)
}

/// A user entity that belongs to `groups`.
fn member(user_id: &str, groups: &[&str]) -> Entity {
    groups
        .iter()
        .fold(Entity::new(user(user_id)), |entity, g| entity.with_parent(group(g)))
}

fn host(name: &str, ip: &str) -> (EntityUid, Entity) {
    let uid = EntityUid::new("Host", name);
    let entity = Entity::new(uid.clone())
        .with_attr("name", name)
        .with_attr("ip", Value::IpAddr(ip.parse().unwrap()));
    (uid, entity)
}

fn assert_allow(evaluation: &Evaluation) {
    assert_eq!(evaluation.response.decision, Decision::Allow, "{evaluation}");
}

fn assert_deny(evaluation: &Evaluation) {
    assert_eq!(evaluation.response.decision, Decision::Deny, "{evaluation}");
}

include!("core.rs");
include!("evaluate.rs");
include!("listing.rs");
