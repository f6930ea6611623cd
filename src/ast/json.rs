//! Policy JSON format.
//!
//! Every expression node is an object with exactly one key naming the
//! operator (`"=="`, `"&&"`, `"if-then-else"`, ...). A key that is not an
//! operator is an extension call whose value is the argument array.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json, json};

use super::{
    Annotations, BinaryOp, Condition, ConditionKind, Effect, Node, Policy, Scope, UnaryOp, Var,
};
use crate::error::PolicyError;
use crate::extensions;
use crate::parser::Position;
use crate::types::{EntityType, EntityUid, Pattern, PatternComponent, Value, entity_from_json};

type JsonResult<T> = Result<T, String>;

fn uid_json(uid: &EntityUid) -> Json {
    json!({"type": uid.entity_type().as_str(), "id": uid.id()})
}

/// Entity references may be plain or wrapped in `__entity`.
fn uid_from(json: &Json) -> JsonResult<EntityUid> {
    match json.get("__entity") {
        Some(inner) => entity_from_json(inner),
        None => entity_from_json(json),
    }
}

fn field<'a>(obj: &'a Json, name: &str) -> JsonResult<&'a Json> {
    obj.get(name)
        .ok_or_else(|| format!("missing field `{name}`"))
}

fn str_field<'a>(obj: &'a Json, name: &str) -> JsonResult<&'a str> {
    field(obj, name)?
        .as_str()
        .ok_or_else(|| format!("field `{name}` must be a string"))
}

fn node_field(obj: &Json, name: &str) -> JsonResult<Box<Node>> {
    Node::from_json(field(obj, name)?).map(Box::new)
}

fn node_list(json: &Json) -> JsonResult<Vec<Node>> {
    json.as_array()
        .ok_or_else(|| "expected an array of expressions".to_string())?
        .iter()
        .map(Node::from_json)
        .collect()
}

impl Node {
    pub fn to_json(&self) -> Json {
        match self {
            Node::Value(value) => json!({"Value": value.to_json()}),
            Node::Variable(var) => json!({"Var": var.to_string()}),
            Node::Unary { op, arg } => json!({op.to_string(): {"arg": arg.to_json()}}),
            Node::Binary { op, left, right } => {
                json!({op.to_string(): {"left": left.to_json(), "right": right.to_json()}})
            }
            Node::Access { arg, attr } => json!({".": {"left": arg.to_json(), "attr": attr}}),
            Node::Has { arg, attr } => json!({"has": {"left": arg.to_json(), "attr": attr}}),
            Node::Like { arg, pattern } => {
                let components: Vec<Json> = pattern
                    .components()
                    .iter()
                    .map(|c| match c {
                        PatternComponent::Literal(s) => json!({"Literal": s}),
                        PatternComponent::Wildcard => json!("Wildcard"),
                    })
                    .collect();
                json!({"like": {"left": arg.to_json(), "pattern": components}})
            }
            Node::Is { arg, entity_type } => {
                json!({"is": {"left": arg.to_json(), "entity_type": entity_type.as_str()}})
            }
            Node::IsIn {
                arg,
                entity_type,
                entity,
            } => json!({"is": {
                "left": arg.to_json(),
                "entity_type": entity_type.as_str(),
                "in": entity.to_json(),
            }}),
            Node::IfThenElse {
                cond,
                then,
                otherwise,
            } => json!({"if-then-else": {
                "if": cond.to_json(),
                "then": then.to_json(),
                "else": otherwise.to_json(),
            }}),
            Node::Set(items) => json!({"Set": items.iter().map(Node::to_json).collect::<Vec<_>>()}),
            Node::Record(fields) => {
                let map: Map<String, Json> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!({"Record": map})
            }
            Node::ExtensionCall { name, args } => {
                json!({name.as_str(): args.iter().map(Node::to_json).collect::<Vec<_>>()})
            }
        }
    }

    pub fn from_json(json: &Json) -> JsonResult<Node> {
        let obj = json
            .as_object()
            .ok_or_else(|| format!("expected an expression object, got `{json}`"))?;
        let mut entries = obj.iter();
        let (Some((key, body)), None) = (entries.next(), entries.next()) else {
            return Err(format!(
                "expression object must have exactly one key, got {}",
                obj.len()
            ));
        };

        if let Ok(op) = key.parse::<UnaryOp>() {
            return Ok(Node::Unary {
                op,
                arg: node_field(body, "arg")?,
            });
        }
        if let Ok(op) = key.parse::<BinaryOp>() {
            return Ok(Node::Binary {
                op,
                left: node_field(body, "left")?,
                right: node_field(body, "right")?,
            });
        }

        match key.as_str() {
            "Value" => Value::from_json(body).map(Node::Value),
            "Var" => {
                let name = body.as_str().ok_or("`Var` must be a string")?;
                name.parse::<Var>()
                    .map(Node::Variable)
                    .map_err(|_| format!("unknown variable `{name}`"))
            }
            "." => Ok(Node::Access {
                arg: node_field(body, "left")?,
                attr: str_field(body, "attr")?.to_string(),
            }),
            "has" => Ok(Node::Has {
                arg: node_field(body, "left")?,
                attr: str_field(body, "attr")?.to_string(),
            }),
            "like" => {
                let components = field(body, "pattern")?
                    .as_array()
                    .ok_or("`pattern` must be an array")?
                    .iter()
                    .map(|c| match (c.as_str(), c.get("Literal").and_then(Json::as_str)) {
                        (Some("Wildcard"), _) => Ok(PatternComponent::Wildcard),
                        (_, Some(s)) => Ok(PatternComponent::Literal(s.to_string())),
                        _ => Err(format!("invalid pattern component `{c}`")),
                    })
                    .collect::<JsonResult<Vec<_>>>()?;
                Ok(Node::Like {
                    arg: node_field(body, "left")?,
                    pattern: Pattern::new(components),
                })
            }
            "is" => {
                let arg = node_field(body, "left")?;
                let entity_type = EntityType::new(str_field(body, "entity_type")?);
                match body.get("in") {
                    Some(entity) => Ok(Node::IsIn {
                        arg,
                        entity_type,
                        entity: Box::new(Node::from_json(entity)?),
                    }),
                    None => Ok(Node::Is { arg, entity_type }),
                }
            }
            "if-then-else" => Ok(Node::IfThenElse {
                cond: node_field(body, "if")?,
                then: node_field(body, "then")?,
                otherwise: node_field(body, "else")?,
            }),
            "Set" => node_list(body).map(Node::Set),
            "Record" => body
                .as_object()
                .ok_or("`Record` must be an object")?
                .iter()
                .map(|(k, v)| Ok((k.clone(), Node::from_json(v)?)))
                .collect::<JsonResult<Vec<_>>>()
                .map(Node::Record),
            name => {
                let ext = extensions::lookup(name)
                    .ok_or_else(|| format!("unknown operator or extension function `{name}`"))?;
                let args = node_list(body)?;
                if args.len() != ext.arity {
                    return Err(format!(
                        "`{name}` expects {} arguments, got {}",
                        ext.arity,
                        args.len()
                    ));
                }
                Ok(Node::ExtensionCall {
                    name: name.to_string(),
                    args,
                })
            }
        }
    }
}

fn scope_to_json(scope: &Scope) -> Json {
    match scope {
        Scope::All => json!({"op": "All"}),
        Scope::Eq(uid) => json!({"op": "==", "entity": uid_json(uid)}),
        Scope::In(uid) => json!({"op": "in", "entity": uid_json(uid)}),
        Scope::InSet(uids) => {
            json!({"op": "in", "entities": uids.iter().map(uid_json).collect::<Vec<_>>()})
        }
        Scope::Is(ty) => json!({"op": "is", "entity_type": ty.as_str()}),
        Scope::IsIn(ty, uid) => {
            json!({"op": "is", "entity_type": ty.as_str(), "in": {"entity": uid_json(uid)}})
        }
    }
}

fn scope_from_json(json: &Json, var: Var) -> JsonResult<Scope> {
    let scope = match str_field(json, "op")? {
        "All" => Scope::All,
        "==" => Scope::Eq(uid_from(field(json, "entity")?)?),
        "in" => match (json.get("entity"), json.get("entities")) {
            (Some(entity), None) => Scope::In(uid_from(entity)?),
            (None, Some(entities)) => Scope::InSet(
                entities
                    .as_array()
                    .ok_or("`entities` must be an array")?
                    .iter()
                    .map(uid_from)
                    .collect::<JsonResult<_>>()?,
            ),
            _ => return Err("`in` scope needs exactly one of `entity` or `entities`".to_string()),
        },
        "is" => {
            let ty = EntityType::new(str_field(json, "entity_type")?);
            match json.get("in") {
                Some(target) => Scope::IsIn(ty, uid_from(field(target, "entity")?)?),
                None => Scope::Is(ty),
            }
        }
        other => return Err(format!("unknown scope operator `{other}`")),
    };
    match (&scope, var) {
        (Scope::InSet(_), Var::Principal | Var::Resource) => {
            Err(format!("a set of entities is not allowed in the {var} scope"))
        }
        (Scope::Is(_) | Scope::IsIn(..), Var::Action) => {
            Err("`is` is not allowed in the action scope".to_string())
        }
        _ => Ok(scope),
    }
}

impl Policy {
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("effect".into(), json!(self.effect.to_string()));
        obj.insert("principal".into(), scope_to_json(&self.principal));
        obj.insert("action".into(), scope_to_json(&self.action));
        obj.insert("resource".into(), scope_to_json(&self.resource));
        let conditions: Vec<Json> = self
            .conditions
            .iter()
            .map(|c| json!({"kind": c.kind.to_string(), "body": c.body.to_json()}))
            .collect();
        obj.insert("conditions".into(), Json::Array(conditions));
        if !self.annotations.is_empty() {
            let annotations: Map<String, Json> = self
                .annotations
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            obj.insert("annotations".into(), Json::Object(annotations));
        }
        Json::Object(obj)
    }

    pub fn from_json(json: &Json) -> Result<Policy, PolicyError> {
        Policy::decode(json).map_err(PolicyError::Json)
    }

    fn decode(json: &Json) -> JsonResult<Policy> {
        let effect = match str_field(json, "effect")? {
            "permit" => Effect::Permit,
            "forbid" => Effect::Forbid,
            other => return Err(format!("unknown effect `{other}`")),
        };

        let mut annotations = Annotations::default();
        if let Some(map) = json.get("annotations") {
            let map = map.as_object().ok_or("`annotations` must be an object")?;
            for (key, value) in map {
                let value = value
                    .as_str()
                    .ok_or_else(|| format!("annotation `{key}` must be a string"))?;
                annotations.insert(key.as_str(), value)?;
            }
        }

        let mut conditions = Vec::new();
        if let Some(list) = json.get("conditions") {
            for cond in list.as_array().ok_or("`conditions` must be an array")? {
                let kind = match str_field(cond, "kind")? {
                    "when" => ConditionKind::When,
                    "unless" => ConditionKind::Unless,
                    other => return Err(format!("unknown condition kind `{other}`")),
                };
                conditions.push(Condition {
                    kind,
                    body: Node::from_json(field(cond, "body")?)?,
                });
            }
        }

        Ok(Policy {
            effect,
            annotations,
            principal: scope_from_json(field(json, "principal")?, Var::Principal)?,
            action: scope_from_json(field(json, "action")?, Var::Action)?,
            resource: scope_from_json(field(json, "resource")?, Var::Resource)?,
            conditions,
            position: Position::default(),
        })
    }
}

impl Serialize for Policy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Policy::decode(&json).map_err(D::Error::custom)
    }
}
