//! Expression evaluation.
//!
//! [`compile`] lowers a policy into an [`Evaluable`] once: scope clauses and
//! conditions are conjoined, extension calls are resolved against the
//! registry, and extension constructors over literals are folded. The result
//! is evaluated against an [`Env`] per request.

mod hierarchy;

use std::cmp::Ordering;

pub use hierarchy::is_descendant_of;

use crate::ast::{BinaryOp, Node, Policy, UnaryOp, Var};
use crate::error::EvalError;
use crate::extensions::{self, Extension};
use crate::traits::EntityGetter;
use crate::types::{Entity, EntityType, EntityUid, Pattern, Record, Request, Set, Value};

/// Inputs of one evaluation. Borrowed read-only for its duration.
pub struct Env<'a> {
    pub principal: Value,
    pub action: Value,
    pub resource: Value,
    pub context: Value,
    pub entities: &'a dyn EntityGetter,
}

impl<'a> Env<'a> {
    pub fn new(request: &Request, entities: &'a dyn EntityGetter) -> Self {
        Env {
            principal: Value::Entity(request.principal.clone()),
            action: Value::Entity(request.action.clone()),
            resource: Value::Entity(request.resource.clone()),
            context: Value::Record(request.context.clone()),
            entities,
        }
    }

    fn var(&self, var: Var) -> &Value {
        match var {
            Var::Principal => &self.principal,
            Var::Action => &self.action,
            Var::Resource => &self.resource,
            Var::Context => &self.context,
        }
    }

    fn entity(&self, uid: &EntityUid) -> Result<&Entity, EvalError> {
        if uid.is_unspecified() {
            return Err(EvalError::UnspecifiedEntity);
        }
        self.entities
            .get(uid)
            .ok_or_else(|| EvalError::EntityNotFound(uid.clone()))
    }
}

#[derive(Debug, Clone)]
enum Op {
    Lit(Value),
    Var(Var),
    Not(Box<Op>),
    Neg(Box<Op>),
    IsEmpty(Box<Op>),
    And(Box<Op>, Box<Op>),
    Or(Box<Op>, Box<Op>),
    Binary(BinaryOp, Box<Op>, Box<Op>),
    Access(Box<Op>, String),
    Has(Box<Op>, String),
    Like(Box<Op>, Pattern),
    Is(Box<Op>, EntityType),
    IsIn(Box<Op>, EntityType, Box<Op>),
    If(Box<Op>, Box<Op>, Box<Op>),
    Set(Vec<Op>),
    Record(Vec<(String, Op)>),
    Call(&'static Extension, Vec<Op>),
    UnknownCall(String),
}

/// A compiled boolean expression.
#[derive(Debug, Clone)]
pub struct Evaluable {
    op: Op,
}

/// Compile a policy's scope clauses and conditions into one expression.
pub fn compile(policy: &Policy) -> Evaluable {
    compile_node(&policy.to_node())
}

pub fn compile_node(node: &Node) -> Evaluable {
    Evaluable { op: lower(node) }
}

fn boxed(node: &Node) -> Box<Op> {
    Box::new(lower(node))
}

fn lower(node: &Node) -> Op {
    match node {
        Node::Value(value) => Op::Lit(value.clone()),
        Node::Variable(var) => Op::Var(*var),
        Node::Unary { op, arg } => match op {
            UnaryOp::Not => Op::Not(boxed(arg)),
            UnaryOp::Negate => Op::Neg(boxed(arg)),
            UnaryOp::IsEmpty => Op::IsEmpty(boxed(arg)),
        },
        Node::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => Op::And(boxed(left), boxed(right)),
        Node::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => Op::Or(boxed(left), boxed(right)),
        Node::Binary { op, left, right } => Op::Binary(*op, boxed(left), boxed(right)),
        Node::Access { arg, attr } => Op::Access(boxed(arg), attr.clone()),
        Node::Has { arg, attr } => Op::Has(boxed(arg), attr.clone()),
        Node::Like { arg, pattern } => Op::Like(boxed(arg), pattern.clone()),
        Node::Is { arg, entity_type } => Op::Is(boxed(arg), entity_type.clone()),
        Node::IsIn {
            arg,
            entity_type,
            entity,
        } => Op::IsIn(boxed(arg), entity_type.clone(), boxed(entity)),
        Node::IfThenElse {
            cond,
            then,
            otherwise,
        } => Op::If(boxed(cond), boxed(then), boxed(otherwise)),
        Node::Set(items) => Op::Set(items.iter().map(lower).collect()),
        Node::Record(fields) => Op::Record(fields.iter().map(|(k, v)| (k.clone(), lower(v))).collect()),
        Node::ExtensionCall { name, args } => {
            let Some(ext) = extensions::lookup(name) else {
                return Op::UnknownCall(name.clone());
            };
            let args: Vec<Op> = args.iter().map(lower).collect();
            fold_call(ext, args)
        }
    }
}

/// Pre-evaluate a call whose arguments are all literals, e.g.
/// `ip("10.0.0.0/8")`. Failures stay deferred to evaluation time so they
/// are reported per request like any other error.
fn fold_call(ext: &'static Extension, args: Vec<Op>) -> Op {
    let literals: Option<Vec<Value>> = args
        .iter()
        .map(|op| match op {
            Op::Lit(v) => Some(v.clone()),
            _ => None,
        })
        .collect();
    match literals.map(|values| ext.invoke(&values)) {
        Some(Ok(value)) => Op::Lit(value),
        _ => Op::Call(ext, args),
    }
}

impl Evaluable {
    pub fn eval(&self, env: &Env<'_>) -> Result<Value, EvalError> {
        eval(&self.op, env)
    }

    /// Evaluate and require a boolean result.
    pub fn is_true(&self, env: &Env<'_>) -> Result<bool, EvalError> {
        self.eval(env)?.as_bool()
    }
}

fn eval(op: &Op, env: &Env<'_>) -> Result<Value, EvalError> {
    match op {
        Op::Lit(value) => Ok(value.clone()),
        Op::Var(var) => Ok(env.var(*var).clone()),
        Op::Not(arg) => Ok(Value::Bool(!eval(arg, env)?.as_bool()?)),
        Op::Neg(arg) => {
            let n = eval(arg, env)?.as_long()?;
            n.checked_neg()
                .map(Value::Long)
                .ok_or(EvalError::NegationOverflow(n))
        }
        Op::IsEmpty(arg) => Ok(Value::Bool(eval(arg, env)?.as_set()?.is_empty())),
        Op::And(left, right) => {
            if !eval(left, env)?.as_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(right, env)?.as_bool()?))
        }
        Op::Or(left, right) => {
            if eval(left, env)?.as_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(right, env)?.as_bool()?))
        }
        Op::Binary(op, left, right) => {
            let left = eval(left, env)?;
            let right = eval(right, env)?;
            binary(*op, &left, &right, env)
        }
        Op::Access(arg, attr) => access(&eval(arg, env)?, attr, env),
        Op::Has(arg, attr) => has(&eval(arg, env)?, attr, env).map(Value::Bool),
        Op::Like(arg, pattern) => Ok(Value::Bool(pattern.matches(eval(arg, env)?.as_str()?))),
        Op::Is(arg, ty) => Ok(Value::Bool(eval(arg, env)?.as_entity()?.entity_type() == ty)),
        Op::IsIn(arg, ty, target) => {
            let subject = eval(arg, env)?;
            if subject.as_entity()?.entity_type() != ty {
                return Ok(Value::Bool(false));
            }
            let target = eval(target, env)?;
            is_in(&subject, &target, env).map(Value::Bool)
        }
        Op::If(cond, then, otherwise) => {
            if eval(cond, env)?.as_bool()? {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
        Op::Set(items) => items
            .iter()
            .map(|item| eval(item, env))
            .collect::<Result<Set, _>>()
            .map(Value::Set),
        Op::Record(fields) => {
            let mut record = Record::new();
            for (key, value) in fields {
                record.insert(key.clone(), eval(value, env)?);
            }
            Ok(Value::Record(record))
        }
        Op::Call(ext, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            ext.invoke(&args)
        }
        Op::UnknownCall(name) => Err(EvalError::UnknownExtension(name.clone())),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value, env: &Env<'_>) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Eq => Value::Bool(left == right),
        BinaryOp::NotEq => Value::Bool(left != right),
        BinaryOp::Less => Value::Bool(ordering(left, right)?.is_lt()),
        BinaryOp::LessEq => Value::Bool(ordering(left, right)?.is_le()),
        BinaryOp::Greater => Value::Bool(ordering(left, right)?.is_gt()),
        BinaryOp::GreaterEq => Value::Bool(ordering(left, right)?.is_ge()),
        BinaryOp::Add => arithmetic("add", left, right, i64::checked_add)?,
        BinaryOp::Sub => arithmetic("subtract", left, right, i64::checked_sub)?,
        BinaryOp::Mul => arithmetic("multiply", left, right, i64::checked_mul)?,
        BinaryOp::In => Value::Bool(is_in(left, right, env)?),
        BinaryOp::Contains => Value::Bool(left.as_set()?.contains(right)),
        BinaryOp::ContainsAll => Value::Bool(left.as_set()?.contains_all(right.as_set()?)),
        BinaryOp::ContainsAny => Value::Bool(left.as_set()?.contains_any(right.as_set()?)),
        BinaryOp::HasTag => {
            let uid = left.as_entity()?;
            let key = right.as_str()?;
            let found = match env.entity(uid) {
                Ok(entity) => entity.tag(key).is_some(),
                Err(_) => false,
            };
            Value::Bool(found)
        }
        BinaryOp::GetTag => {
            let uid = left.as_entity()?;
            let key = right.as_str()?;
            env.entity(uid)?
                .tag(key)
                .cloned()
                .ok_or_else(|| EvalError::TagNotFound {
                    entity: uid.clone(),
                    tag: key.to_string(),
                })?
        }
        BinaryOp::And => Value::Bool(left.as_bool()? && right.as_bool()?),
        BinaryOp::Or => Value::Bool(left.as_bool()? || right.as_bool()?),
    };
    Ok(result)
}

fn ordering(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => Ok(a.cmp(b)),
        (Value::Long(_), other) => Err(EvalError::type_error("long", other.type_name())),
        (Value::Datetime(_) | Value::Duration(_), _) => {
            extensions::extension_ordering(left, right, "long")
        }
        (other, _) => Err(EvalError::type_error("long", other.type_name())),
    }
}

fn arithmetic(
    name: &str,
    left: &Value,
    right: &Value,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<Value, EvalError> {
    let (a, b) = (left.as_long()?, right.as_long()?);
    op(a, b)
        .map(Value::Long)
        .ok_or_else(|| EvalError::overflow(name, a, b))
}

fn is_in(left: &Value, right: &Value, env: &Env<'_>) -> Result<bool, EvalError> {
    let subject = left.as_entity()?;
    let targets: Vec<EntityUid> = match right {
        Value::Entity(uid) => vec![uid.clone()],
        Value::Set(set) => set
            .iter()
            .map(|v| v.as_entity().cloned())
            .collect::<Result<_, _>>()?,
        other => return Err(EvalError::type_error("entity or set", other.type_name())),
    };
    Ok(is_descendant_of(env.entities, subject, &targets))
}

fn access(receiver: &Value, attr: &str, env: &Env<'_>) -> Result<Value, EvalError> {
    let missing = |receiver: String| EvalError::AttributeNotFound {
        receiver,
        attr: attr.to_string(),
    };
    match receiver {
        Value::Entity(uid) => env
            .entity(uid)?
            .attr(attr)
            .cloned()
            .ok_or_else(|| missing(uid.to_string())),
        Value::Record(record) => record
            .get(attr)
            .cloned()
            .ok_or_else(|| missing("record".to_string())),
        other => Err(EvalError::type_error("entity or record", other.type_name())),
    }
}

fn has(receiver: &Value, attr: &str, env: &Env<'_>) -> Result<bool, EvalError> {
    match receiver {
        Value::Entity(uid) => Ok(env
            .entity(uid)
            .is_ok_and(|entity| entity.attr(attr).is_some())),
        Value::Record(record) => Ok(record.contains_key(attr)),
        other => Err(EvalError::type_error("entity or record", other.type_name())),
    }
}
