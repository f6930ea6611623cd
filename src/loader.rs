use crate::ast::Policy;
use crate::error::PolicyError;
use crate::parser::{Parser, tokenize};
use crate::policy_set::PolicySet;

/// Compile Cedar policy text into a `PolicySet`.
///
/// Lexical errors map to `PolicyError::Lex`, grammar errors to
/// `PolicyError::Parse`. Policies are named `policy0`, `policy1`, ... in
/// document order.
///
/// Example:
/// ```rust
/// use canopy::compile_policy;
/// let policy_text = r#"
///     permit (principal, action, resource);
///     forbid  (principal == User::"evil", action, resource);
/// "#;
/// let set = compile_policy(policy_text).unwrap();
/// assert_eq!(set.len(), 2);
/// ```
pub fn compile_policy(text: &str) -> Result<PolicySet, PolicyError> {
    let tokens = tokenize(text.as_bytes())?;
    let policies = Parser::new(tokens).policies()?;
    Ok(PolicySet::from_policies(policies))
}

/// Compile policies in the JSON format: either one policy object or an
/// array of them.
pub fn compile_policy_json(json: &str) -> Result<PolicySet, PolicyError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let policies = match &value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(Policy::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![Policy::from_json(&value)?],
        _ => {
            return Err(PolicyError::InvalidFormat(
                "expected a policy object or an array of policies".to_string(),
            ));
        }
    };
    Ok(PolicySet::from_policies(policies))
}
