//! A Cedar policy engine: lexer, parser, evaluator and authorizer.
//!
//! ```rust
//! use canopy::{Decision, Entities, Entity, EntityUid, PolicyEngine, Request};
//!
//! let engine = PolicyEngine::new_from_str(r#"
//!     permit (principal in Group::"admins", action, resource);
//! "#).unwrap();
//!
//! let alice = EntityUid::new("User", "alice");
//! let entities = Entities::from_entities([
//!     Entity::new(alice.clone()).with_parent(EntityUid::new("Group", "admins")),
//! ]).unwrap();
//! let request = Request::new(
//!     alice,
//!     EntityUid::new("Action", "view"),
//!     EntityUid::new("Photo", "beach.jpg"),
//! );
//!
//! let evaluation = engine.evaluate(&request, &entities).unwrap();
//! assert_eq!(evaluation.response.decision, Decision::Allow);
//! ```

pub use authorizer::{Authorizer, authorize};
pub use engine::PolicyEngine;
pub use error::{EvalError, LexError, ParseError, PolicyError};
pub use eval::{Env, Evaluable, compile};
pub use loader::{compile_policy, compile_policy_json};
pub use policy_set::{CompiledPolicy, PolicyId, PolicySet};
pub use traits::EntityGetter;
pub use types::{
    Decision, Diagnostic, Entities, Entity, EntityType, EntityUid, Evaluation, PolicyVersion,
    Request, Response, Value,
};

pub mod ast;
mod authorizer;
mod engine;
mod error;
pub mod eval;
pub mod extensions;
mod loader;
pub mod metrics;
pub mod parser;
mod policy_match;
mod policy_set;
pub mod timers;
mod traits;
pub mod types;
