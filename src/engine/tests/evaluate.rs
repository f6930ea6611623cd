#[parameterized(
        alice_edit_allow = { "alice", "edit", "VacationPhoto94.jpg", Decision::Allow },
        alice_view_allow = { "alice", "view", "VacationPhoto94.jpg", Decision::Allow },
        alice_delete_allow = { "alice", "delete", "VacationPhoto94.jpg", Decision::Allow },
        alice_view_deny_wrong_photo = { "alice", "view", "wrongphoto.jpg", Decision::Deny },
        bob_view_allow = { "bob", "view", "VacationPhoto94.jpg", Decision::Allow },
        bob_edit_deny = { "bob", "edit", "VacationPhoto94.jpg", Decision::Deny },
        bob_view_deny_wrong_photo = { "bob", "edit", "wrongphoto.jpg", Decision::Deny },
        charlie_view_deny = { "charlie", "view", "VacationPhoto94.jpg", Decision::Deny },
    )]
fn test_evaluate_requests(user_id: &str, action_id: &str, photo: &str, expected: Decision) {
    let engine = engine_from_policy(TEST_POLICY);
    let request = user_request(user_id, action_id, EntityUid::new("Photo", photo));
    let evaluation = engine.evaluate(&request, &Entities::new()).unwrap();
    assert_eq!(evaluation.response.decision, expected, "{evaluation}");
}

#[parameterized(
        alice_create_host_allow = { "alice", "web-01.example.com", "192.0.1.1", Decision::Allow },
        bob_create_host_allow = { "bob", "bob-01.example.com", "192.0.0.1", Decision::Allow },
        alice_create_host_wrong_net_deny = { "alice", "web-99.example.com", "192.0.2.1", Decision::Deny },
        alice_create_host_wrong_name_deny = { "alice", "abc.example.com", "192.0.1.2", Decision::Deny },
    )]
fn test_create_host_requests(user_id: &str, host_name: &str, ip: &str, expected: Decision) {
    let engine = engine_from_policy(TEST_POLICY_WITH_CONTEXT);
    let (uid, entity) = host(host_name, ip);
    let entities = Entities::from_entities([entity]).unwrap();

    let request = user_request(user_id, "create_host", uid);
    let evaluation = engine.evaluate(&request, &entities).unwrap();
    assert_eq!(evaluation.response.decision, expected, "{evaluation}");
    assert!(evaluation.response.diagnostic.errors.is_empty());
}

#[test]
fn test_missing_host_entity_is_an_error_not_a_match() {
    let engine = engine_from_policy(TEST_POLICY_WITH_CONTEXT);
    let request = user_request("alice", "create_host", EntityUid::new("Host", "web-01"));
    let evaluation = engine.evaluate(&request, &Entities::new()).unwrap();
    assert_deny(&evaluation);
    let errors = &evaluation.response.diagnostic.errors;
    assert_eq!(errors.len(), 1);
    insta::assert_snapshot!(errors[0].message, @r#"entity `Host::"web-01"` does not exist"#);
}

#[parameterized(
        alice_view_allow = { "view", Decision::Allow, &["policy0"] },
        alice_edit_deny_explicit = { "edit", Decision::Deny, &["policy1"] },
        alice_delete_forbid_any = { "delete", Decision::Deny, &["policy2"] },
    )]
fn test_policy_with_forbid(action_id: &str, expected: Decision, reasons: &[&str]) {
    let engine = engine_from_policy(TEST_POLICY_WITH_FORBID);
    let request = user_request("alice", action_id, EntityUid::new("Photo", "VacationPhoto94.jpg"));
    let evaluation = engine.evaluate(&request, &Entities::new()).unwrap();
    assert_eq!(evaluation.response.decision, expected);
    assert_eq!(evaluation.response.diagnostic.reason_ids(), reasons);
}

#[parameterized(
        alice_delete_allow = { "alice", &["admins"], "delete", Decision::Allow },
        alice_view_allow = { "alice", &["admins"], "view", Decision::Allow },
        bob_delete_deny = { "bob", &["users"], "delete", Decision::Deny },
        bob_view_allow = { "bob", &["users"], "view", Decision::Allow },
        carol_no_groups_deny = { "carol", &[], "view", Decision::Deny },
    )]
fn test_policy_with_groups(user_id: &str, groups: &[&str], action_id: &str, expected: Decision) {
    let engine = engine_from_policy(TEST_POLICY_WITH_GROUPS);
    let entities = Entities::from_entities([member(user_id, groups)]).unwrap();
    let request = user_request(user_id, action_id, EntityUid::new("Photo", "photo.jpg"));
    let evaluation = engine.evaluate(&request, &entities).unwrap();
    assert_eq!(evaluation.response.decision, expected, "{evaluation}");
}

#[test]
fn test_nested_group_membership() {
    let engine = engine_from_policy(TEST_POLICY_WITH_GROUPS);
    let entities = Entities::from_entities([
        member("dave", &["oncall"]),
        Entity::new(group("oncall")).with_parent(group("admins")),
    ])
    .unwrap();
    let request = user_request("dave", "delete", EntityUid::new("Photo", "photo.jpg"));
    assert_allow(&engine.evaluate(&request, &entities).unwrap());
}

#[test]
fn test_evaluation_carries_version() {
    let engine = engine_from_policy(TEST_POLICY);
    let request = user_request("alice", "view", EntityUid::new("Photo", "VacationPhoto94.jpg"));
    let evaluation = engine.evaluate(&request, &Entities::new()).unwrap();
    assert_eq!(evaluation.version, engine.current_version().unwrap());
    assert_eq!(
        evaluation.to_string(),
        format!("Allow (policy0)(hash={})", evaluation.version.hash)
    );
}

#[test]
fn test_entities_and_request_from_json() {
    let engine = engine_from_policy(TEST_POLICY_WITH_GROUPS);
    let entities = Entities::from_json_str(
        r#"[
            {"uid": {"type": "User", "id": "erin"}, "attrs": {}, "parents": [{"type": "Group", "id": "users"}]},
            {"uid": {"type": "Group", "id": "users"}, "attrs": {}, "parents": []}
        ]"#,
    )
    .unwrap();
    let request: Request = serde_json::from_str(
        r#"{
            "principal": {"type": "User", "id": "erin"},
            "action": {"__entity": {"type": "Action", "id": "view"}},
            "resource": {"type": "Photo", "id": "cat.jpg"},
            "context": {}
        }"#,
    )
    .unwrap();
    assert_allow(&engine.evaluate(&request, &entities).unwrap());
}
