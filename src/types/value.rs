//! Runtime values produced and consumed by the evaluator.
//!
//! Values serialize to the Cedar JSON value format: entities are written as
//! `{"__entity": {"type": .., "id": ..}}` and extension values as
//! `{"__extn": {"fn": .., "arg": ..}}`.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json, json};

use super::{Datetime, Decimal, Duration, EntityUid, IpAddr};
use crate::error::EvalError;
use crate::parser::lexer::quote;

/// String-keyed attributes. Keys iterate in sorted order.
pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Long(i64),
    String(String),
    Set(Set),
    Record(Record),
    Entity(EntityUid),
    Decimal(Decimal),
    IpAddr(IpAddr),
    Datetime(Datetime),
    Duration(Duration),
}

impl Eq for Value {}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Long(_) => "long",
            Value::String(_) => "string",
            Value::Set(_) => "set",
            Value::Record(_) => "record",
            Value::Entity(_) => "entity",
            Value::Decimal(_) => "decimal",
            Value::IpAddr(_) => "ipaddr",
            Value::Datetime(_) => "datetime",
            Value::Duration(_) => "duration",
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::type_error("bool", other.type_name())),
        }
    }

    pub fn as_long(&self) -> Result<i64, EvalError> {
        match self {
            Value::Long(n) => Ok(*n),
            other => Err(EvalError::type_error("long", other.type_name())),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::type_error("string", other.type_name())),
        }
    }

    pub fn as_set(&self) -> Result<&Set, EvalError> {
        match self {
            Value::Set(s) => Ok(s),
            other => Err(EvalError::type_error("set", other.type_name())),
        }
    }

    pub fn as_entity(&self) -> Result<&EntityUid, EvalError> {
        match self {
            Value::Entity(uid) => Ok(uid),
            other => Err(EvalError::type_error("entity", other.type_name())),
        }
    }

    pub fn as_decimal(&self) -> Result<Decimal, EvalError> {
        match self {
            Value::Decimal(d) => Ok(*d),
            other => Err(EvalError::type_error("decimal", other.type_name())),
        }
    }

    pub fn as_ipaddr(&self) -> Result<&IpAddr, EvalError> {
        match self {
            Value::IpAddr(ip) => Ok(ip),
            other => Err(EvalError::type_error("ipaddr", other.type_name())),
        }
    }

    pub fn as_datetime(&self) -> Result<Datetime, EvalError> {
        match self {
            Value::Datetime(dt) => Ok(*dt),
            other => Err(EvalError::type_error("datetime", other.type_name())),
        }
    }

    pub fn as_duration(&self) -> Result<Duration, EvalError> {
        match self {
            Value::Duration(d) => Ok(*d),
            other => Err(EvalError::type_error("duration", other.type_name())),
        }
    }

    /// Encode as Cedar JSON.
    pub fn to_json(&self) -> Json {
        let extn = |name: &str, arg: String| json!({"__extn": {"fn": name, "arg": arg}});
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Long(n) => Json::from(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Set(set) => Json::Array(set.iter().map(Value::to_json).collect()),
            Value::Record(record) => Json::Object(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Entity(uid) => {
                json!({"__entity": {"type": uid.entity_type().as_str(), "id": uid.id()}})
            }
            Value::Decimal(d) => extn("decimal", d.to_string()),
            Value::IpAddr(ip) => extn("ip", ip.to_string()),
            Value::Datetime(dt) => extn("datetime", dt.to_string()),
            Value::Duration(d) => extn("duration", d.to_string()),
        }
    }

    /// Decode Cedar JSON. Numbers must fit an `i64`; `null` is rejected.
    pub fn from_json(json: &Json) -> Result<Value, String> {
        match json {
            Json::Null => Err("null is not a Cedar value".to_string()),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Long)
                .ok_or_else(|| format!("`{n}` is not a 64-bit integer")),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Result<Set, _>>()
                .map(Value::Set),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(entity) = map.get("__entity") {
                        return entity_from_json(entity).map(Value::Entity);
                    }
                    if let Some(extn) = map.get("__extn") {
                        return extension_from_json(extn);
                    }
                }
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                    .collect::<Result<Record, String>>()
                    .map(Value::Record)
            }
        }
    }
}

pub(crate) fn entity_from_json(json: &Json) -> Result<EntityUid, String> {
    serde_json::from_value(json.clone()).map_err(|e| format!("invalid entity reference: {e}"))
}

fn extension_from_json(json: &Json) -> Result<Value, String> {
    let name = json.get("fn").and_then(Json::as_str);
    let arg = json.get("arg").and_then(Json::as_str);
    let (Some(name), Some(arg)) = (name, arg) else {
        return Err("`__extn` requires string `fn` and `arg` fields".to_string());
    };
    match name {
        "decimal" => arg.parse().map(Value::Decimal),
        "ip" => arg.parse().map(Value::IpAddr),
        "datetime" => arg.parse().map(Value::Datetime),
        "duration" => arg.parse().map(Value::Duration),
        other => Err(format!("unknown extension type `{other}`")),
    }
}

/// Renders Cedar literal syntax.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(&quote(s, false)),
            Value::Set(set) => {
                f.write_str("[")?;
                for (i, v) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Record(record) => {
                f.write_str("{")?;
                for (i, (k, v)) in record.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {v}", quote(k, false))?;
                }
                f.write_str("}")
            }
            Value::Entity(uid) => write!(f, "{uid}"),
            Value::Decimal(d) => write!(f, "decimal({})", quote(&d.to_string(), false)),
            Value::IpAddr(ip) => write!(f, "ip({})", quote(&ip.to_string(), false)),
            Value::Datetime(dt) => write!(f, "datetime({})", quote(&dt.to_string(), false)),
            Value::Duration(d) => write!(f, "duration({})", quote(&d.to_string(), false)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Value::from_json(&json).map_err(D::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<EntityUid> for Value {
    fn from(uid: EntityUid) -> Self {
        Value::Entity(uid)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<Set> for Value {
    fn from(set: Set) -> Self {
        Value::Set(set)
    }
}

/// Unordered collection of distinct values.
///
/// Duplicates are dropped on construction; equality ignores element order.
#[derive(Debug, Clone, Default)]
pub struct Set(Vec<Value>);

impl Set {
    pub fn new() -> Self {
        Set(Vec::new())
    }

    pub fn insert(&mut self, value: Value) {
        if !self.0.contains(&value) {
            self.0.push(value);
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    pub fn contains_all(&self, other: &Set) -> bool {
        other.iter().all(|v| self.contains(v))
    }

    pub fn contains_any(&self, other: &Set) -> bool {
        other.iter().any(|v| self.contains(v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.contains_all(other)
    }
}

impl Eq for Set {}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Set::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<'a> IntoIterator for &'a Set {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Set {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(values: Vec<Value>) -> Set {
        values.into_iter().collect()
    }

    #[test]
    fn test_set_equality_ignores_order_and_duplicates() {
        let a = set(vec![Value::Long(1), Value::Long(2), Value::Long(2)]);
        let b = set(vec![Value::Long(2), Value::Long(1)]);
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert_ne!(a, set(vec![Value::Long(1)]));
    }

    #[test]
    fn test_nested_set_equality() {
        let inner_a = Value::Set(set(vec!["x".into(), "y".into()]));
        let inner_b = Value::Set(set(vec!["y".into(), "x".into()]));
        assert_eq!(set(vec![inner_a]), set(vec![inner_b]));
    }

    #[test]
    fn test_cross_type_values_are_unequal() {
        assert_ne!(Value::Long(1), Value::String("1".into()));
        assert_ne!(Value::Bool(true), Value::Long(1));
    }

    #[test]
    fn test_type_error_names_both_types() {
        let err = Value::String("x".into()).as_long().unwrap_err();
        assert_eq!(err.to_string(), "type error: expected long, got string");
    }

    #[test]
    fn test_json_decoding() {
        let value = Value::from_json(&json!({
            "age": 42,
            "manager": {"__entity": {"type": "User", "id": "bob"}},
            "limit": {"__extn": {"fn": "decimal", "arg": "1.5"}},
            "tags": ["a", "b"],
        }))
        .unwrap();
        let Value::Record(record) = value else {
            panic!("expected a record");
        };
        assert_eq!(record["age"], Value::Long(42));
        assert_eq!(record["manager"], Value::Entity(EntityUid::new("User", "bob")));
        assert_eq!(record["limit"], Value::Decimal("1.5".parse().unwrap()));
        assert_eq!(record["tags"], Value::Set(set(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn test_json_rejects_bad_input() {
        assert!(Value::from_json(&json!(null)).is_err());
        assert!(Value::from_json(&json!(1.5)).is_err());
        assert!(Value::from_json(&json!({"__extn": {"fn": "nope", "arg": "x"}})).is_err());
        assert!(Value::from_json(&json!({"__extn": {"fn": "ip", "arg": "x"}})).is_err());
    }

    #[test]
    fn test_json_encoding_round_trips() {
        let json = json!({
            "ip": {"__extn": {"fn": "ip", "arg": "10.0.0.0/8"}},
            "who": {"__entity": {"type": "App::User", "id": "a"}},
            "n": -3,
        });
        let value: Value = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), json);
    }

    #[test]
    fn test_datetime_json_round_trips_at_range_edges() {
        for text in ["0000-01-01T00:00:00.000Z", "9999-12-31T23:59:59.999Z"] {
            let value = Value::Datetime(text.parse().unwrap());
            assert_eq!(
                value.to_json(),
                json!({"__extn": {"fn": "datetime", "arg": text}})
            );
            assert_eq!(Value::from_json(&value.to_json()).unwrap(), value);
        }
    }

    #[test]
    fn test_display() {
        let mut record = Record::new();
        record.insert("b".into(), Value::Decimal("1.25".parse().unwrap()));
        record.insert("a".into(), Value::Set(set(vec![Value::Long(1), "x".into()])));
        insta::assert_snapshot!(Value::Record(record).to_string(), @r#"{"a": [1, "x"], "b": decimal("1.25")}"#);
    }
}
