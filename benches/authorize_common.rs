use canopy::{Entities, Entity, EntityUid, PolicyEngine, Request, Value};

#[derive(Debug, Clone, Copy)]
pub struct ScenarioSpec {
    pub name: &'static str,
    pub noise_policies: usize,
    /// Length of the group chain above the principal.
    pub group_depth: usize,
    pub conditions: bool,
    pub deny: bool,
}

pub struct Scenario {
    pub name: &'static str,
    pub engine: PolicyEngine,
    pub entities: Entities,
    pub request: Request,
}

pub fn build_policy_text(spec: ScenarioSpec) -> String {
    let mut text = String::new();

    if spec.group_depth > 0 {
        let top = spec.group_depth - 1;
        text.push_str(&format!(
            "permit (principal in Group::\"group_{top}\", action == Action::\"view_host\", resource is Host);\n"
        ));
    } else {
        text.push_str(
            "permit (principal == User::\"target\", action == Action::\"view_host\", resource is Host);\n",
        );
    }

    if spec.conditions {
        text.push_str(
            "permit (principal, action == Action::\"view_host\", resource is Host) when {\n    \
             resource.name like \"web-*\" && resource.ip.isInRange(ip(\"10.0.0.0/8\")) && context.level * 2 > 5\n};\n",
        );
    }

    // Non-matching policies that still have to be evaluated.
    for idx in 0..spec.noise_policies {
        text.push_str(&format!(
            "permit (principal == User::\"noise_{idx}\", action == Action::\"noise_{idx}\", resource is Host);\n"
        ));
    }

    text
}

pub fn build_scenario(spec: ScenarioSpec) -> Scenario {
    let engine = PolicyEngine::new_from_str(&build_policy_text(spec))
        .expect("benchmark policy must compile");

    let principal = EntityUid::new("User", "target");
    let host = EntityUid::new("Host", "web-01.example.com");

    let mut entities = Vec::new();
    let mut user = Entity::new(principal.clone());
    if spec.group_depth > 0 {
        user = user.with_parent(EntityUid::new("Group", "group_0"));
    }
    entities.push(user);
    for idx in 0..spec.group_depth {
        let mut group = Entity::new(EntityUid::new("Group", format!("group_{idx}")));
        if idx + 1 < spec.group_depth {
            group = group.with_parent(EntityUid::new("Group", format!("group_{}", idx + 1)));
        }
        entities.push(group);
    }
    entities.push(
        Entity::new(host.clone())
            .with_attr("name", "web-01.example.com")
            .with_attr("ip", Value::IpAddr("10.0.0.42".parse().expect("valid ip"))),
    );

    let action = if spec.deny { "delete_host" } else { "view_host" };
    let request = Request::new(principal, EntityUid::new("Action", action), host)
        .with_context_value("level", Value::Long(3));

    Scenario {
        name: spec.name,
        engine,
        entities: Entities::from_entities(entities).expect("benchmark entities are unique"),
        request,
    }
}

pub fn specs() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec {
            name: "s_small_allow",
            noise_policies: 8,
            group_depth: 0,
            conditions: false,
            deny: false,
        },
        ScenarioSpec {
            name: "s_small_deny",
            noise_policies: 8,
            group_depth: 0,
            conditions: false,
            deny: true,
        },
        ScenarioSpec {
            name: "m_medium_allow",
            noise_policies: 80,
            group_depth: 0,
            conditions: false,
            deny: false,
        },
        ScenarioSpec {
            name: "l_large_allow",
            noise_policies: 400,
            group_depth: 0,
            conditions: false,
            deny: false,
        },
        ScenarioSpec {
            name: "m_groups_10",
            noise_policies: 80,
            group_depth: 10,
            conditions: false,
            deny: false,
        },
        ScenarioSpec {
            name: "m_conditions",
            noise_policies: 80,
            group_depth: 0,
            conditions: true,
            deny: false,
        },
    ]
}
