//! Text rendering with minimal parenthesization.
//!
//! A child is wrapped only when the grammar would otherwise bind it
//! differently: left-associative operators wrap a right child of equal
//! strength, relations never chain, and receivers of `.` must bind at
//! least as tightly as member access.

use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;

use super::{BinaryOp, Condition, Node, Policy, Precedence, Scope, UnaryOp, Var};
use crate::extensions;
use crate::parser::lexer::{is_reserved, quote};
use crate::types::Value;

/// True when `s` can be written bare after `.` or `has`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_reserved(s)
}

fn child(f: &mut Formatter<'_>, node: &Node, wrap: bool) -> FmtResult {
    if wrap {
        write!(f, "({node})")
    } else {
        write!(f, "{node}")
    }
}

/// Receiver of a dotted access or call.
fn receiver(f: &mut Formatter<'_>, node: &Node) -> FmtResult {
    child(f, node, node.precedence() < Precedence::Member)
}

fn relation_operand(f: &mut Formatter<'_>, node: &Node) -> FmtResult {
    child(f, node, node.precedence() <= Precedence::Relation)
}

/// True when `node` renders with an unsigned integer literal as its first
/// token. After a `-` the parser folds that literal into a negative one.
fn leads_with_unsigned_int(node: &Node) -> bool {
    let first = match node {
        Node::Value(Value::Long(n)) => return *n >= 0,
        Node::Access { arg, .. }
        | Node::Unary {
            op: UnaryOp::IsEmpty,
            arg,
        } => arg.as_ref(),
        Node::Binary { op, left, .. } if op.is_method() => left.as_ref(),
        Node::ExtensionCall { name, args } if extensions::is_method(name) => match args.first() {
            Some(first) => first,
            None => return false,
        },
        _ => return false,
    };
    first.precedence() >= Precedence::Member && leads_with_unsigned_int(first)
}

fn comma_list(f: &mut Formatter<'_>, nodes: &[Node]) -> FmtResult {
    write!(f, "{}", nodes.iter().format(", "))
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Node::Value(value) => write!(f, "{value}"),
            Node::Variable(var) => write!(f, "{var}"),
            Node::Unary {
                op: UnaryOp::IsEmpty,
                arg,
            } => {
                receiver(f, arg)?;
                f.write_str(".isEmpty()")
            }
            Node::Unary { op, arg } => {
                f.write_str(if *op == UnaryOp::Not { "!" } else { "-" })?;
                // `-5` and `-5.x` would read back with `-5` as one literal.
                let folds = *op == UnaryOp::Negate && leads_with_unsigned_int(arg);
                child(f, arg, folds || arg.precedence() < Precedence::Unary)
            }
            Node::Binary { op, left, right } if op.is_method() => {
                receiver(f, left)?;
                write!(f, ".{op}({right})")
            }
            Node::Binary { op, left, right } => {
                let prec = op.precedence();
                if prec == Precedence::Relation {
                    relation_operand(f, left)?;
                    write!(f, " {op} ")?;
                    relation_operand(f, right)
                } else {
                    child(f, left, left.precedence() < prec)?;
                    write!(f, " {op} ")?;
                    child(f, right, right.precedence() <= prec)
                }
            }
            Node::Access { arg, attr } => {
                receiver(f, arg)?;
                if is_identifier(attr) {
                    write!(f, ".{attr}")
                } else {
                    write!(f, "[{}]", quote(attr, false))
                }
            }
            Node::Has { arg, attr } => {
                relation_operand(f, arg)?;
                if is_identifier(attr) {
                    write!(f, " has {attr}")
                } else {
                    write!(f, " has {}", quote(attr, false))
                }
            }
            Node::Like { arg, pattern } => {
                relation_operand(f, arg)?;
                write!(f, " like {pattern}")
            }
            Node::Is { arg, entity_type } => {
                relation_operand(f, arg)?;
                write!(f, " is {entity_type}")
            }
            Node::IsIn {
                arg,
                entity_type,
                entity,
            } => {
                relation_operand(f, arg)?;
                write!(f, " is {entity_type} in ")?;
                relation_operand(f, entity)
            }
            Node::IfThenElse {
                cond,
                then,
                otherwise,
            } => write!(f, "if {cond} then {then} else {otherwise}"),
            Node::Set(items) => {
                f.write_str("[")?;
                comma_list(f, items)?;
                f.write_str("]")
            }
            Node::Record(fields) => {
                let body = fields
                    .iter()
                    .map(|(k, v)| format!("{}: {v}", quote(k, false)))
                    .join(", ");
                write!(f, "{{{body}}}")
            }
            Node::ExtensionCall { name, args } => match args.split_first() {
                Some((first, rest)) if extensions::is_method(name) => {
                    receiver(f, first)?;
                    write!(f, ".{name}(")?;
                    comma_list(f, rest)?;
                    f.write_str(")")
                }
                _ => {
                    write!(f, "{name}(")?;
                    comma_list(f, args)?;
                    f.write_str(")")
                }
            },
        }
    }
}

struct ScopeClause<'a>(Var, &'a Scope);

impl Display for ScopeClause<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let ScopeClause(var, scope) = self;
        match scope {
            Scope::All => write!(f, "{var}"),
            Scope::Eq(uid) => write!(f, "{var} == {uid}"),
            Scope::In(uid) => write!(f, "{var} in {uid}"),
            Scope::InSet(uids) => write!(f, "{var} in [{}]", uids.iter().format(", ")),
            Scope::Is(ty) => write!(f, "{var} is {ty}"),
            Scope::IsIn(ty, uid) => write!(f, "{var} is {ty} in {uid}"),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {{ {} }}", self.kind, self.body)
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (key, value) in self.annotations.iter() {
            writeln!(f, "@{key}({})", quote(value, false))?;
        }
        writeln!(f, "{} (", self.effect)?;
        writeln!(f, "    {},", ScopeClause(Var::Principal, &self.principal))?;
        writeln!(f, "    {},", ScopeClause(Var::Action, &self.action))?;
        writeln!(f, "    {}", ScopeClause(Var::Resource, &self.resource))?;
        f.write_str(")")?;
        for condition in &self.conditions {
            write!(f, "\n{condition}")?;
        }
        f.write_str(";")
    }
}
