//! Quarry rules
//!
//! The rule model, the visitor protocol a rule executor drives, and a
//! decorator making every visitor hook transactional against the store.

pub mod error;
pub mod model;
pub mod transactional;
pub mod visitor;

pub use error::{BoxError, RuleError, VisitorPanic};
pub use model::{Concept, Constraint, Group, GroupMember, ParseSeverityError, Rule, RuleRef, Severity};
pub use transactional::TransactionalRuleVisitor;
pub use visitor::RuleVisitor;
