//! Diagnostic console
//!
//! Every user-reachable failure is a warning: it is logged through `tracing`
//! with structured fields and kept here so hosts and tests can inspect it.

use std::cell::RefCell;
use tendril_dom::NodeId;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A bound expression failed to evaluate
    Expression,
    /// A directive was used somewhere it cannot work
    Misuse,
    /// Two list items resolved to the same key
    DuplicateKey,
    /// Markup references a plugin directive or magic that is not registered
    MissingPlugin,
    /// `start` was called more than once
    AlreadyStarted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub element: Option<NodeId>,
    pub expression: Option<String>,
}

#[derive(Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, kind: DiagnosticKind, message: impl Into<String>, element: Option<NodeId>, expression: Option<&str>) {
        let message = message.into();
        warn!(?kind, ?element, expression, "{message}");
        self.entries.borrow_mut().push(Diagnostic {
            kind,
            message,
            element,
            expression: expression.map(String::from),
        });
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.borrow().iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics").field("len", &self.len()).finish()
    }
}
