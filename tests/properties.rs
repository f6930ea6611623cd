use std::collections::HashSet;

use canopy::ast::{BinaryOp, Node, Policy, Scope, UnaryOp, Var};
use canopy::eval::{Env, compile_node, is_descendant_of};
use canopy::parser::{parse_expression, parse_policy};
use canopy::types::{Pattern, PatternComponent};
use canopy::{Entities, Entity, EntityType, EntityUid, EvalError, Request, Value};
use proptest::prelude::*;
use proptest::sample::select;

fn eval(node: &Node) -> Result<Value, EvalError> {
    let entities = Entities::new();
    let request = Request::new(
        EntityUid::new("User", "u"),
        EntityUid::new("Action", "a"),
        EntityUid::new("Thing", "r"),
    );
    compile_node(node).eval(&Env::new(&request, &entities))
}

fn interesting_long() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(i64::MIN),
        Just(i64::MIN + 1),
        Just(-1i64),
        Just(0i64),
        Just(1i64),
        Just(i64::MAX - 1),
        Just(i64::MAX),
        any::<i64>(),
    ]
}

fn arithmetic_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![Just(BinaryOp::Add), Just(BinaryOp::Sub), Just(BinaryOp::Mul)]
}

/// Integer expressions over the arithmetic, negation and comparison
/// operators.
fn arith_node() -> impl Strategy<Value = Node> {
    let leaf = interesting_long().prop_map(Node::value);
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (arithmetic_op(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| Node::binary(op, l, r)),
            inner.clone().prop_map(|n| Node::unary(UnaryOp::Negate, n)),
        ]
    })
}

fn bool_node() -> impl Strategy<Value = Node> {
    let relation = prop_oneof![
        Just(BinaryOp::Less),
        Just(BinaryOp::LessEq),
        Just(BinaryOp::Eq),
        Just(BinaryOp::NotEq),
    ];
    let leaf = (relation, arith_node(), arith_node()).prop_map(|(op, l, r)| Node::binary(op, l, r));
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l.or(r)),
            inner.clone().prop_map(Node::not),
        ]
    })
}

fn string_literal() -> impl Strategy<Value = String> {
    "[a-z *\"\\\\\n]{0,5}"
}

fn attr_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,5}",
        string_literal(),
        select(vec!["if".to_string(), "like".to_string(), "true".to_string()]),
    ]
}

fn entity_type() -> impl Strategy<Value = EntityType> {
    select(vec!["User", "App::Photo"]).prop_map(EntityType::new)
}

fn entity_uid() -> impl Strategy<Value = EntityUid> {
    (select(vec!["User", "App::Photo"]), "[a-z\"]{0,4}")
        .prop_map(|(ty, id)| EntityUid::new(ty, id))
}

fn pattern() -> impl Strategy<Value = Pattern> {
    let component = prop_oneof![
        "[a-c*\\\\]{1,3}".prop_map(PatternComponent::Literal),
        Just(PatternComponent::Wildcard),
    ];
    prop::collection::vec(component, 0..4).prop_map(Pattern::new)
}

fn call(name: &str, args: Vec<Node>) -> Node {
    Node::ExtensionCall {
        name: name.to_string(),
        args,
    }
}

/// Every expression shape the grammar produces, with unsigned literal
/// receivers under negation given their own arm.
fn expr_node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        interesting_long().prop_map(Node::value),
        any::<bool>().prop_map(Node::value),
        string_literal().prop_map(Node::value),
        entity_uid().prop_map(Node::value),
        select(vec![Var::Principal, Var::Action, Var::Resource, Var::Context]).prop_map(Node::var),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        let infix = select(vec![
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Eq,
            BinaryOp::NotEq,
            BinaryOp::Less,
            BinaryOp::LessEq,
            BinaryOp::Greater,
            BinaryOp::GreaterEq,
            BinaryOp::In,
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
        ]);
        let method = select(vec![
            BinaryOp::Contains,
            BinaryOp::ContainsAll,
            BinaryOp::ContainsAny,
            BinaryOp::HasTag,
            BinaryOp::GetTag,
        ]);
        let unary = select(vec![UnaryOp::Not, UnaryOp::Negate, UnaryOp::IsEmpty]);
        let operators = prop_oneof![
            (unary, inner.clone()).prop_map(|(op, n)| Node::unary(op, n)),
            (infix, inner.clone(), inner.clone()).prop_map(|(op, l, r)| Node::binary(op, l, r)),
            (method, inner.clone(), inner.clone()).prop_map(|(op, l, r)| Node::binary(op, l, r)),
            (inner.clone(), attr_name()).prop_map(|(n, attr)| n.access(attr)),
            (inner.clone(), attr_name()).prop_map(|(n, attr)| n.has(attr)),
            (inner.clone(), pattern()).prop_map(|(n, pattern)| Node::Like {
                arg: Box::new(n),
                pattern,
            }),
            (0i64..10, attr_name(), select(vec![UnaryOp::Negate, UnaryOp::Not])).prop_map(
                |(n, attr, op)| Node::unary(op, Node::value(n).access(attr))
            ),
        ];
        let structures = prop_oneof![
            (inner.clone(), entity_type()).prop_map(|(n, ty)| n.is(ty)),
            (inner.clone(), entity_type(), inner.clone())
                .prop_map(|(n, ty, entity)| n.is_in(ty, entity)),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(cond, then, otherwise)| {
                Node::IfThenElse {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                }
            }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Node::Set),
            prop::collection::btree_map("[a-z ]{0,3}", inner.clone(), 0..3)
                .prop_map(|fields| Node::Record(fields.into_iter().collect())),
            (select(vec!["ip", "decimal", "datetime", "duration"]), string_literal())
                .prop_map(|(name, arg)| call(name, vec![Node::value(arg)])),
            (select(vec!["isIpv4", "isLoopback", "toDays"]), inner.clone())
                .prop_map(|(name, receiver)| call(name, vec![receiver])),
            (select(vec!["lessThan", "isInRange", "offset"]), inner.clone(), inner.clone())
                .prop_map(|(name, receiver, arg)| call(name, vec![receiver, arg])),
        ];
        prop_oneof![operators, structures]
    })
}

fn principal_scope() -> impl Strategy<Value = Scope> {
    prop_oneof![
        Just(Scope::All),
        entity_uid().prop_map(Scope::Eq),
        entity_uid().prop_map(Scope::In),
        entity_type().prop_map(Scope::Is),
        (entity_type(), entity_uid()).prop_map(|(ty, uid)| Scope::IsIn(ty, uid)),
    ]
}

fn action_scope() -> impl Strategy<Value = Scope> {
    let action = "[a-z]{1,4}".prop_map(|id| EntityUid::new("Action", id));
    prop_oneof![
        Just(Scope::All),
        action.clone().prop_map(Scope::Eq),
        action.clone().prop_map(Scope::In),
        prop::collection::vec(action, 1..3).prop_map(Scope::InSet),
    ]
}

fn policy() -> impl Strategy<Value = Policy> {
    (
        any::<bool>(),
        prop::collection::btree_map(select(vec!["id", "owner", "team_1"]), string_literal(), 0..3),
        principal_scope(),
        action_scope(),
        principal_scope(),
        prop::collection::vec((any::<bool>(), expr_node()), 0..3),
    )
        .prop_map(|(permit, annotations, principal, action, resource, conditions)| {
            let mut policy = if permit { Policy::permit() } else { Policy::forbid() };
            for (key, value) in annotations {
                policy = policy.annotate(key, value).unwrap();
            }
            policy = policy.principal(principal).action(action).resource(resource);
            for (when, body) in conditions {
                policy = if when { policy.when(body) } else { policy.unless(body) };
            }
            policy
        })
}

proptest! {
    #[test]
    fn arithmetic_is_exact_or_overflows(a in interesting_long(), b in interesting_long(), op in arithmetic_op()) {
        let expected = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            _ => a.checked_mul(b),
        };
        let result = eval(&Node::binary(op, Node::value(a), Node::value(b)));
        match expected {
            Some(n) => prop_assert_eq!(result, Ok(Value::Long(n))),
            None => {
                let is_overflow = matches!(result, Err(EvalError::Overflow { .. }));
                prop_assert!(is_overflow);
            }
        }
    }

    #[test]
    fn negation_is_exact_or_overflows(a in interesting_long()) {
        let result = eval(&Node::unary(UnaryOp::Negate, Node::value(a)));
        match a.checked_neg() {
            Some(n) => prop_assert_eq!(result, Ok(Value::Long(n))),
            None => prop_assert_eq!(result, Err(EvalError::NegationOverflow(a))),
        }
    }

    #[test]
    fn arithmetic_text_round_trips(node in arith_node()) {
        let text = node.to_string();
        let reparsed = parse_expression(&text).unwrap();
        prop_assert_eq!(&reparsed, &node, "{}", text);
    }

    #[test]
    fn boolean_text_round_trips(node in bool_node()) {
        let text = node.to_string();
        let reparsed = parse_expression(&text).unwrap();
        prop_assert_eq!(reparsed.to_string(), text);
        prop_assert_eq!(eval(&reparsed), eval(&node));
    }

    #[test]
    fn json_round_trips(node in bool_node()) {
        let decoded = Node::from_json(&node.to_json()).unwrap();
        prop_assert_eq!(decoded, node);
    }

    #[test]
    fn expression_text_round_trips(node in expr_node()) {
        let text = node.to_string();
        let reparsed = parse_expression(&text);
        prop_assert!(reparsed.is_ok(), "{}: {:?}", text, reparsed);
        prop_assert_eq!(reparsed.unwrap(), node, "{}", text);
    }

    #[test]
    fn expression_json_round_trips(node in expr_node()) {
        let decoded = Node::from_json(&node.to_json()).unwrap();
        prop_assert_eq!(decoded, node);
    }

    #[test]
    fn policy_text_round_trips(policy in policy()) {
        let first = parse_policy(&policy.to_string()).unwrap();
        let second = parse_policy(&first.to_string()).unwrap();
        prop_assert_eq!(&first, &second);

        let mut expected = policy;
        expected.position = first.position;
        prop_assert_eq!(first, expected);
    }

    #[test]
    fn policy_json_round_trips(policy in policy()) {
        let decoded = Policy::from_json(&policy.to_json()).unwrap();
        prop_assert_eq!(decoded, policy);
    }

    #[test]
    fn star_matches_everything(input in ".*") {
        let pattern = Pattern::new([PatternComponent::Wildcard]);
        prop_assert!(pattern.matches(&input));
    }

    #[test]
    fn literal_pattern_is_equality(input in "[a-c*]{0,6}", literal in "[a-c*]{0,6}") {
        let pattern = Pattern::new([PatternComponent::Literal(literal.clone())]);
        prop_assert_eq!(pattern.matches(&input), input == literal);
    }

    #[test]
    fn membership_matches_reachability(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        start in 0usize..8,
        target in 0usize..8,
    ) {
        let uid = |n: usize| EntityUid::new("Node", n.to_string());
        let mut entities = Entities::new();
        for n in 0..8 {
            let entity = edges
                .iter()
                .filter(|(child, _)| *child == n)
                .fold(Entity::new(uid(n)), |e, (_, parent)| e.with_parent(uid(*parent)));
            entities.upsert(entity);
        }

        // Reference: naive fixpoint over the edge list.
        let mut reachable = HashSet::from([start]);
        loop {
            let next: HashSet<usize> = edges
                .iter()
                .filter(|(child, _)| reachable.contains(child))
                .map(|(_, parent)| *parent)
                .collect();
            let before = reachable.len();
            reachable.extend(next);
            if reachable.len() == before {
                break;
            }
        }

        prop_assert_eq!(
            is_descendant_of(&entities, &uid(start), &[uid(target)]),
            reachable.contains(&target)
        );
    }
}
