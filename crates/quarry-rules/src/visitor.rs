//! The rule visitation protocol

use crate::error::RuleError;
use crate::model::{Concept, Constraint, Group, Severity};

/// Callbacks invoked by a rule executor while it walks the selected rules.
///
/// The executor calls `before_rules` once, then the group and rule hooks in
/// execution order, then `after_rules`. Severities passed in are the
/// effective severities computed by the executor.
pub trait RuleVisitor {
    fn before_rules(&mut self) -> Result<(), RuleError> {
        Ok(())
    }

    fn after_rules(&mut self) -> Result<(), RuleError> {
        Ok(())
    }

    fn before_group(&mut self, _group: &Group, _severity: Option<Severity>) -> Result<(), RuleError> {
        Ok(())
    }

    fn after_group(&mut self, _group: &Group) -> Result<(), RuleError> {
        Ok(())
    }

    /// Applies a concept and reports whether it was applied.
    fn visit_concept(&mut self, concept: &Concept, severity: Severity) -> Result<bool, RuleError>;

    fn skip_concept(&mut self, _concept: &Concept, _severity: Severity) -> Result<(), RuleError> {
        Ok(())
    }

    fn visit_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError>;

    fn skip_constraint(&mut self, _constraint: &Constraint, _severity: Severity) -> Result<(), RuleError> {
        Ok(())
    }
}

impl<V: RuleVisitor + ?Sized> RuleVisitor for &mut V {
    fn before_rules(&mut self) -> Result<(), RuleError> {
        (**self).before_rules()
    }

    fn after_rules(&mut self) -> Result<(), RuleError> {
        (**self).after_rules()
    }

    fn before_group(&mut self, group: &Group, severity: Option<Severity>) -> Result<(), RuleError> {
        (**self).before_group(group, severity)
    }

    fn after_group(&mut self, group: &Group) -> Result<(), RuleError> {
        (**self).after_group(group)
    }

    fn visit_concept(&mut self, concept: &Concept, severity: Severity) -> Result<bool, RuleError> {
        (**self).visit_concept(concept, severity)
    }

    fn skip_concept(&mut self, concept: &Concept, severity: Severity) -> Result<(), RuleError> {
        (**self).skip_concept(concept, severity)
    }

    fn visit_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        (**self).visit_constraint(constraint, severity)
    }

    fn skip_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        (**self).skip_constraint(constraint, severity)
    }
}

impl<V: RuleVisitor + ?Sized> RuleVisitor for Box<V> {
    fn before_rules(&mut self) -> Result<(), RuleError> {
        (**self).before_rules()
    }

    fn after_rules(&mut self) -> Result<(), RuleError> {
        (**self).after_rules()
    }

    fn before_group(&mut self, group: &Group, severity: Option<Severity>) -> Result<(), RuleError> {
        (**self).before_group(group, severity)
    }

    fn after_group(&mut self, group: &Group) -> Result<(), RuleError> {
        (**self).after_group(group)
    }

    fn visit_concept(&mut self, concept: &Concept, severity: Severity) -> Result<bool, RuleError> {
        (**self).visit_concept(concept, severity)
    }

    fn skip_concept(&mut self, concept: &Concept, severity: Severity) -> Result<(), RuleError> {
        (**self).skip_concept(concept, severity)
    }

    fn visit_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        (**self).visit_constraint(constraint, severity)
    }

    fn skip_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        (**self).skip_constraint(constraint, severity)
    }
}
