//! Policy syntax tree.
//!
//! [`Node`] covers every expression form of the policy language. A
//! [`Policy`] pairs an effect with three scope clauses and an ordered list of
//! conditions. Text rendering lives in [`display`], the JSON format in
//! [`json`].

mod display;
mod json;

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::parser::Position;
use crate::types::{EntityType, EntityUid, Pattern, Value};

pub use display::is_identifier;

/// Binding strength, weakest first. Used only when rendering text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    IfThenElse,
    Or,
    And,
    Relation,
    Add,
    Mult,
    Unary,
    Member,
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Var {
    Principal,
    Action,
    Resource,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "neg")]
    Negate,
    #[strum(serialize = "isEmpty")]
    IsEmpty,
}

impl UnaryOp {
    pub fn precedence(self) -> Precedence {
        match self {
            UnaryOp::Not | UnaryOp::Negate => Precedence::Unary,
            UnaryOp::IsEmpty => Precedence::Member,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum BinaryOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEq,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "containsAll")]
    ContainsAll,
    #[strum(serialize = "containsAny")]
    ContainsAny,
    #[strum(serialize = "hasTag")]
    HasTag,
    #[strum(serialize = "getTag")]
    GetTag,
}

impl BinaryOp {
    pub fn precedence(self) -> Precedence {
        match self {
            BinaryOp::Or => Precedence::Or,
            BinaryOp::And => Precedence::And,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Less
            | BinaryOp::LessEq
            | BinaryOp::Greater
            | BinaryOp::GreaterEq
            | BinaryOp::In => Precedence::Relation,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Add,
            BinaryOp::Mul => Precedence::Mult,
            BinaryOp::Contains
            | BinaryOp::ContainsAll
            | BinaryOp::ContainsAny
            | BinaryOp::HasTag
            | BinaryOp::GetTag => Precedence::Member,
        }
    }

    /// Rendered as `left.op(right)` rather than infix.
    pub fn is_method(self) -> bool {
        self.precedence() == Precedence::Member
    }

    /// Method name to operator, for the dotted built-ins.
    pub fn from_method(name: &str) -> Option<BinaryOp> {
        match name {
            "contains" => Some(BinaryOp::Contains),
            "containsAll" => Some(BinaryOp::ContainsAll),
            "containsAny" => Some(BinaryOp::ContainsAny),
            "hasTag" => Some(BinaryOp::HasTag),
            "getTag" => Some(BinaryOp::GetTag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Value(Value),
    Variable(Var),
    Unary {
        op: UnaryOp,
        arg: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Access {
        arg: Box<Node>,
        attr: String,
    },
    Has {
        arg: Box<Node>,
        attr: String,
    },
    Like {
        arg: Box<Node>,
        pattern: Pattern,
    },
    Is {
        arg: Box<Node>,
        entity_type: EntityType,
    },
    IsIn {
        arg: Box<Node>,
        entity_type: EntityType,
        entity: Box<Node>,
    },
    IfThenElse {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Set(Vec<Node>),
    /// Duplicate keys are kept; the last one wins at evaluation.
    Record(Vec<(String, Node)>),
    ExtensionCall {
        name: String,
        args: Vec<Node>,
    },
}

impl Node {
    pub fn value(value: impl Into<Value>) -> Node {
        Node::Value(value.into())
    }

    pub fn var(var: Var) -> Node {
        Node::Variable(var)
    }

    pub fn unary(op: UnaryOp, arg: Node) -> Node {
        Node::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(self) -> Node {
        Node::unary(UnaryOp::Not, self)
    }

    pub fn and(self, other: Node) -> Node {
        Node::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Node) -> Node {
        Node::binary(BinaryOp::Or, self, other)
    }

    pub fn access(self, attr: impl Into<String>) -> Node {
        Node::Access {
            arg: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn has(self, attr: impl Into<String>) -> Node {
        Node::Has {
            arg: Box::new(self),
            attr: attr.into(),
        }
    }

    pub fn is(self, entity_type: EntityType) -> Node {
        Node::Is {
            arg: Box::new(self),
            entity_type,
        }
    }

    pub fn is_in(self, entity_type: EntityType, entity: Node) -> Node {
        Node::IsIn {
            arg: Box::new(self),
            entity_type,
            entity: Box::new(entity),
        }
    }

    pub fn precedence(&self) -> Precedence {
        match self {
            Node::Value(Value::Long(n)) if *n < 0 => Precedence::Unary,
            Node::Value(_) | Node::Variable(_) | Node::Set(_) | Node::Record(_) => {
                Precedence::Primary
            }
            Node::ExtensionCall { name, args } => {
                if crate::extensions::is_method(name) && !args.is_empty() {
                    Precedence::Member
                } else {
                    Precedence::Primary
                }
            }
            Node::Unary { op, .. } => op.precedence(),
            Node::Binary { op, .. } => op.precedence(),
            Node::Access { .. } => Precedence::Member,
            Node::Has { .. } | Node::Like { .. } | Node::Is { .. } | Node::IsIn { .. } => {
                Precedence::Relation
            }
            Node::IfThenElse { .. } => Precedence::IfThenElse,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Effect {
    Permit,
    Forbid,
}

/// Scope clause of one request slot.
///
/// `InSet` is only valid for the action slot; `Is` and `IsIn` only for the
/// principal and resource slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Eq(EntityUid),
    In(EntityUid),
    InSet(Vec<EntityUid>),
    Is(EntityType),
    IsIn(EntityType, EntityUid),
}

impl Scope {
    /// Expression equivalent of this clause applied to `var`.
    pub fn to_node(&self, var: Var) -> Node {
        let subject = Node::var(var);
        match self {
            Scope::All => Node::value(true),
            Scope::Eq(uid) => Node::binary(BinaryOp::Eq, subject, Node::value(uid.clone())),
            Scope::In(uid) => Node::binary(BinaryOp::In, subject, Node::value(uid.clone())),
            Scope::InSet(uids) => Node::binary(
                BinaryOp::In,
                subject,
                Node::Set(uids.iter().cloned().map(Node::value).collect()),
            ),
            Scope::Is(ty) => subject.is(ty.clone()),
            Scope::IsIn(ty, uid) => subject.is_in(ty.clone(), Node::value(uid.clone())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConditionKind {
    When,
    Unless,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub body: Node,
}

/// Ordered annotations with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations(Vec<(String, String)>);

impl Annotations {
    /// Append an annotation. Fails if `key` is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), String> {
        let key = key.into();
        if self.get(&key).is_some() {
            return Err(format!("duplicate annotation key `{key}`"));
        }
        self.0.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub effect: Effect,
    pub annotations: Annotations,
    pub principal: Scope,
    pub action: Scope,
    pub resource: Scope,
    pub conditions: Vec<Condition>,
    /// Where the policy starts in its source document.
    pub position: Position,
}

impl Policy {
    /// A policy with unconstrained scope and no conditions.
    pub fn new(effect: Effect) -> Self {
        Policy {
            effect,
            annotations: Annotations::default(),
            principal: Scope::All,
            action: Scope::All,
            resource: Scope::All,
            conditions: Vec::new(),
            position: Position::default(),
        }
    }

    pub fn permit() -> Self {
        Policy::new(Effect::Permit)
    }

    pub fn forbid() -> Self {
        Policy::new(Effect::Forbid)
    }

    pub fn principal(mut self, scope: Scope) -> Self {
        self.principal = scope;
        self
    }

    pub fn action(mut self, scope: Scope) -> Self {
        self.action = scope;
        self
    }

    pub fn resource(mut self, scope: Scope) -> Self {
        self.resource = scope;
        self
    }

    pub fn when(mut self, body: Node) -> Self {
        self.conditions.push(Condition {
            kind: ConditionKind::When,
            body,
        });
        self
    }

    pub fn unless(mut self, body: Node) -> Self {
        self.conditions.push(Condition {
            kind: ConditionKind::Unless,
            body,
        });
        self
    }

    pub fn annotate(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, String> {
        self.annotations.insert(key, value)?;
        Ok(self)
    }

    /// The scope clauses and conditions conjoined into one boolean
    /// expression; `unless` bodies are negated.
    pub fn to_node(&self) -> Node {
        let scopes = [
            self.principal.to_node(Var::Principal),
            self.action.to_node(Var::Action),
            self.resource.to_node(Var::Resource),
        ];
        let conditions = self.conditions.iter().map(|c| match c.kind {
            ConditionKind::When => c.body.clone(),
            ConditionKind::Unless => c.body.clone().not(),
        });
        scopes
            .into_iter()
            .chain(conditions)
            .reduce(Node::and)
            .unwrap_or_else(|| Node::value(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::IfThenElse < Precedence::Or);
        assert!(Precedence::Relation < Precedence::Add);
        assert!(Precedence::Member < Precedence::Primary);
    }

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in [BinaryOp::Eq, BinaryOp::And, BinaryOp::In, BinaryOp::ContainsAny] {
            assert_eq!(op.to_string().parse::<BinaryOp>().unwrap(), op);
        }
        assert_eq!("neg".parse::<UnaryOp>().unwrap(), UnaryOp::Negate);
        assert_eq!("context".parse::<Var>().unwrap(), Var::Context);
    }

    #[test]
    fn test_negative_literal_binds_like_unary() {
        assert_eq!(Node::value(-1i64).precedence(), Precedence::Unary);
        assert_eq!(Node::value(1i64).precedence(), Precedence::Primary);
    }

    #[test]
    fn test_duplicate_annotation_rejected() {
        let policy = Policy::permit().annotate("id", "a").unwrap();
        assert!(policy.annotate("id", "b").is_err());
    }

    #[test]
    fn test_policy_to_node_conjoins_in_order() {
        let alice = EntityUid::new("User", "alice");
        let policy = Policy::forbid()
            .principal(Scope::Eq(alice.clone()))
            .unless(Node::var(Var::Context).has("mfa"));
        let expected = Node::binary(BinaryOp::Eq, Node::var(Var::Principal), Node::value(alice))
            .and(Node::value(true))
            .and(Node::value(true))
            .and(Node::var(Var::Context).has("mfa").not());
        assert_eq!(policy.to_node(), expected);
    }
}
