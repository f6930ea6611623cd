//! Registry of extension functions and methods.
//!
//! The parser consults it to validate calls and the evaluator to resolve
//! them. Method arities count the receiver as the first argument.

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::EvalError;
use crate::types::Value;

pub type ExtensionFn = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Debug, Clone, Copy)]
pub struct Extension {
    pub name: &'static str,
    pub arity: usize,
    pub is_method: bool,
    pub func: ExtensionFn,
}

const fn function(name: &'static str, func: ExtensionFn) -> Extension {
    Extension {
        name,
        arity: 1,
        is_method: false,
        func,
    }
}

const fn method(name: &'static str, arity: usize, func: ExtensionFn) -> Extension {
    Extension {
        name,
        arity,
        is_method: true,
        func,
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Extension>> = Lazy::new(|| {
    [
        function("ip", ip),
        function("decimal", decimal),
        function("datetime", datetime),
        function("duration", duration),
        method("lessThan", 2, |a| compare(a, Ordering::is_lt)),
        method("lessThanOrEqual", 2, |a| compare(a, Ordering::is_le)),
        method("greaterThan", 2, |a| compare(a, Ordering::is_gt)),
        method("greaterThanOrEqual", 2, |a| compare(a, Ordering::is_ge)),
        method("isIpv4", 1, |a| Ok(Value::Bool(a[0].as_ipaddr()?.is_ipv4()))),
        method("isIpv6", 1, |a| Ok(Value::Bool(a[0].as_ipaddr()?.is_ipv6()))),
        method("isLoopback", 1, |a| Ok(Value::Bool(a[0].as_ipaddr()?.is_loopback()))),
        method("isMulticast", 1, |a| Ok(Value::Bool(a[0].as_ipaddr()?.is_multicast()))),
        method("isInRange", 2, |a| {
            Ok(Value::Bool(a[0].as_ipaddr()?.is_in_range(a[1].as_ipaddr()?)))
        }),
        method("offset", 2, offset),
        method("durationSince", 2, duration_since),
        method("toDate", 1, to_date),
        method("toTime", 1, |a| Ok(Value::Duration(a[0].as_datetime()?.to_time()))),
        method("toDays", 1, |a| Ok(Value::Long(a[0].as_duration()?.to_days()))),
        method("toHours", 1, |a| Ok(Value::Long(a[0].as_duration()?.to_hours()))),
        method("toMinutes", 1, |a| Ok(Value::Long(a[0].as_duration()?.to_minutes()))),
        method("toSeconds", 1, |a| Ok(Value::Long(a[0].as_duration()?.to_seconds()))),
        method("toMilliseconds", 1, |a| {
            Ok(Value::Long(a[0].as_duration()?.to_milliseconds()))
        }),
    ]
    .into_iter()
    .map(|ext| (ext.name, ext))
    .collect()
});

pub fn lookup(name: &str) -> Option<&'static Extension> {
    REGISTRY.get(name)
}

pub fn is_method(name: &str) -> bool {
    lookup(name).is_some_and(|ext| ext.is_method)
}

impl Extension {
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != self.arity {
            return Err(EvalError::ExtensionArity {
                name: self.name.to_string(),
                expected: self.arity,
                got: args.len(),
            });
        }
        (self.func)(args)
    }
}

fn ip(args: &[Value]) -> Result<Value, EvalError> {
    args[0]
        .as_str()?
        .parse()
        .map(Value::IpAddr)
        .map_err(|e| EvalError::extension("ip", e))
}

fn decimal(args: &[Value]) -> Result<Value, EvalError> {
    args[0]
        .as_str()?
        .parse()
        .map(Value::Decimal)
        .map_err(|e| EvalError::extension("decimal", e))
}

fn datetime(args: &[Value]) -> Result<Value, EvalError> {
    args[0]
        .as_str()?
        .parse()
        .map(Value::Datetime)
        .map_err(|e| EvalError::extension("datetime", e))
}

fn duration(args: &[Value]) -> Result<Value, EvalError> {
    args[0]
        .as_str()?
        .parse()
        .map(Value::Duration)
        .map_err(|e| EvalError::extension("duration", e))
}

/// Order two values of the same comparable extension type.
pub(crate) fn extension_ordering(
    left: &Value,
    right: &Value,
    expected: &str,
) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Decimal(a), Value::Decimal(b)) => Ok(a.cmp(b)),
        (Value::Datetime(a), Value::Datetime(b)) => Ok(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Ok(a.cmp(b)),
        (Value::Decimal(_) | Value::Datetime(_) | Value::Duration(_), other) => {
            Err(EvalError::type_error(left.type_name(), other.type_name()))
        }
        (other, _) => Err(EvalError::type_error(expected, other.type_name())),
    }
}

fn compare(args: &[Value], test: fn(Ordering) -> bool) -> Result<Value, EvalError> {
    extension_ordering(&args[0], &args[1], "decimal, datetime or duration")
        .map(|ord| Value::Bool(test(ord)))
}

fn offset(args: &[Value]) -> Result<Value, EvalError> {
    let dt = args[0].as_datetime()?;
    let by = args[1].as_duration()?;
    dt.offset(by)
        .map(Value::Datetime)
        .ok_or_else(|| EvalError::overflow("offset", dt, by))
}

fn duration_since(args: &[Value]) -> Result<Value, EvalError> {
    let dt = args[0].as_datetime()?;
    let other = args[1].as_datetime()?;
    dt.duration_since(other)
        .map(Value::Duration)
        .ok_or_else(|| EvalError::overflow("subtract", dt, other))
}

fn to_date(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Datetime(args[0].as_datetime()?.to_date()))
}
