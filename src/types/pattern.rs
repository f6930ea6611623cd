//! Glob patterns for the `like` operator. `*` is the only metacharacter.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::parser::lexer::escape_into;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternComponent {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pattern {
    components: Vec<PatternComponent>,
}

impl Pattern {
    /// Build from components, merging adjacent literals and collapsing runs
    /// of wildcards.
    pub fn new(components: impl IntoIterator<Item = PatternComponent>) -> Self {
        let mut out: Vec<PatternComponent> = Vec::new();
        for component in components {
            match (out.last_mut(), component) {
                (Some(PatternComponent::Wildcard), PatternComponent::Wildcard) => {}
                (Some(PatternComponent::Literal(prev)), PatternComponent::Literal(next)) => {
                    prev.push_str(&next);
                }
                (_, PatternComponent::Literal(s)) if s.is_empty() => {}
                (_, component) => out.push(component),
            }
        }
        Pattern { components: out }
    }

    /// Build from decoded pattern characters, where the flag marks a `*`
    /// that came from the `\*` escape and so matches itself.
    pub fn from_decoded(chars: &[(char, bool)]) -> Self {
        let mut components = Vec::new();
        let mut literal = String::new();
        for &(c, escaped) in chars {
            if c == '*' && !escaped {
                if !literal.is_empty() {
                    components.push(PatternComponent::Literal(std::mem::take(&mut literal)));
                }
                components.push(PatternComponent::Wildcard);
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            components.push(PatternComponent::Literal(literal));
        }
        Pattern::new(components)
    }

    pub fn components(&self) -> &[PatternComponent] {
        &self.components
    }

    /// Glob match. A wildcard matches any run of characters, including none.
    pub fn matches(&self, input: &str) -> bool {
        enum Elem {
            Char(char),
            Any,
        }
        let pattern: Vec<Elem> = self
            .components
            .iter()
            .flat_map(|c| match c {
                PatternComponent::Literal(s) => s.chars().map(Elem::Char).collect::<Vec<_>>(),
                PatternComponent::Wildcard => vec![Elem::Any],
            })
            .collect();
        let text: Vec<char> = input.chars().collect();

        let (mut p, mut t) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;
        while t < text.len() {
            match pattern.get(p) {
                Some(Elem::Char(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                Some(Elem::Any) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                _ => match backtrack {
                    Some((star_p, star_t)) => {
                        p = star_p + 1;
                        t = star_t + 1;
                        backtrack = Some((star_p, star_t + 1));
                    }
                    None => return false,
                },
            }
        }
        pattern[p..].iter().all(|e| matches!(e, Elem::Any))
    }
}

/// Renders the quoted source form, e.g. `"a*b\*"`.
impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut out = String::from("\"");
        for component in &self.components {
            match component {
                PatternComponent::Literal(s) => escape_into(&mut out, s, true),
                PatternComponent::Wildcard => out.push('*'),
            }
        }
        out.push('"');
        f.write_str(&out)
    }
}
