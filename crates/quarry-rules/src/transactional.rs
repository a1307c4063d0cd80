//! Decorator running every visitor hook in its own store transaction

use quarry_store::Store;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{RuleError, VisitorPanic};
use crate::model::{Concept, Constraint, Group, Severity};
use crate::visitor::RuleVisitor;

/// Wraps a [`RuleVisitor`] so that each hook is atomic against the store.
///
/// Per hook: begin a transaction, call the delegate, commit on success and
/// roll back on failure. Domain errors are returned unchanged; raw faults and
/// panics of the delegate are returned as [`RuleError::Unexpected`].
pub struct TransactionalRuleVisitor<V> {
    delegate: V,
    store: Arc<dyn Store>,
}

impl<V: RuleVisitor> TransactionalRuleVisitor<V> {
    pub fn new(delegate: V, store: Arc<dyn Store>) -> Self {
        Self { delegate, store }
    }

    pub fn delegate(&self) -> &V {
        &self.delegate
    }

    pub fn into_inner(self) -> V {
        self.delegate
    }

    fn in_transaction<T>(
        &mut self,
        hook: &'static str,
        call: impl FnOnce(&mut V) -> Result<T, RuleError>,
    ) -> Result<T, RuleError> {
        if let Err(e) = self.store.begin_transaction() {
            error!(hook, "Cannot begin transaction: {}", e);
            self.rollback_if_active(hook);
            return Err(RuleError::Transaction(e));
        }
        debug!(hook, "Transaction started");

        let delegate = &mut self.delegate;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(delegate)));

        match outcome {
            Ok(Ok(value)) => match self.store.commit_transaction() {
                Ok(()) => {
                    debug!(hook, "Transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    error!(hook, "Cannot commit transaction: {}", e);
                    self.rollback_if_active(hook);
                    Err(RuleError::Transaction(e))
                }
            },
            Ok(Err(e)) => {
                debug!(hook, "Delegate failed, rolling back: {}", e);
                self.rollback_if_active(hook);
                Err(e.into_boundary())
            }
            Err(payload) => {
                let panic = VisitorPanic::from_payload(payload);
                error!(hook, "Delegate panicked, rolling back: {}", panic);
                self.rollback_if_active(hook);
                Err(RuleError::Unexpected(Box::new(panic)))
            }
        }
    }

    fn rollback_if_active(&self, hook: &'static str) {
        if !self.store.has_active_transaction() {
            return;
        }
        match self.store.rollback_transaction() {
            Ok(()) => debug!(hook, "Transaction rolled back"),
            Err(e) => warn!(hook, "Rollback failed: {}", e),
        }
    }
}

impl<V: RuleVisitor> RuleVisitor for TransactionalRuleVisitor<V> {
    fn before_rules(&mut self) -> Result<(), RuleError> {
        self.in_transaction("before_rules", |delegate| delegate.before_rules())
    }

    fn after_rules(&mut self) -> Result<(), RuleError> {
        self.in_transaction("after_rules", |delegate| delegate.after_rules())
    }

    fn before_group(&mut self, group: &Group, severity: Option<Severity>) -> Result<(), RuleError> {
        self.in_transaction("before_group", |delegate| delegate.before_group(group, severity))
    }

    fn after_group(&mut self, group: &Group) -> Result<(), RuleError> {
        self.in_transaction("after_group", |delegate| delegate.after_group(group))
    }

    fn visit_concept(&mut self, concept: &Concept, severity: Severity) -> Result<bool, RuleError> {
        self.in_transaction("visit_concept", |delegate| delegate.visit_concept(concept, severity))
    }

    fn skip_concept(&mut self, concept: &Concept, severity: Severity) -> Result<(), RuleError> {
        self.in_transaction("skip_concept", |delegate| delegate.skip_concept(concept, severity))
    }

    fn visit_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        self.in_transaction("visit_constraint", |delegate| delegate.visit_constraint(constraint, severity))
    }

    fn skip_constraint(&mut self, constraint: &Constraint, severity: Severity) -> Result<(), RuleError> {
        self.in_transaction("skip_constraint", |delegate| delegate.skip_constraint(constraint, severity))
    }
}
