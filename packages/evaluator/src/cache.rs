//! Parsed-AST cache keyed by expression text
//!
//! Every distinct expression string is parsed once. Parse failures are not
//! cached; they are reported on every evaluation attempt.

use crate::error::{EvalError, EvalResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tendril_parser::{parse_program, Program};
use tracing::trace;

#[derive(Debug)]
pub struct Parsed {
    pub source: Rc<str>,
    pub program: Program,
}

#[derive(Default)]
pub struct AstCache {
    entries: RefCell<HashMap<Rc<str>, Rc<Parsed>>>,
    hits: Cell<usize>,
}

impl AstCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse(&self, source: &str) -> EvalResult<Rc<Parsed>> {
        if let Some(parsed) = self.entries.borrow().get(source) {
            self.hits.set(self.hits.get() + 1);
            return Ok(parsed.clone());
        }

        let program = parse_program(source).map_err(|err| EvalError::syntax(source, &err))?;
        trace!(expression = source, "parsed expression");
        let source: Rc<str> = Rc::from(source);
        let parsed = Rc::new(Parsed {
            source: source.clone(),
            program,
        });
        self.entries.borrow_mut().insert(source, parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.hits.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_parses_once() {
        let cache = AstCache::new();
        let first = cache.get_or_parse("count + 1").unwrap();
        let second = cache.get_or_parse("count + 1").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = AstCache::new();
        assert!(matches!(cache.get_or_parse("a +"), Err(EvalError::Syntax { .. })));
        assert!(cache.is_empty());
    }
}
