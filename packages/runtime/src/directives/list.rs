//! `for`: keyed list rendering from a `<template>`
//!
//! Each render evaluates the items and one key per item, diffs the keys
//! against the previous render and patches the DOM: removals, swaps, inserts,
//! then an in-place refresh of the scopes of retained clones.

use crate::context::DirectiveContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::TendrilError;
use crate::keyed::{diff_keys, first_occurrences};
use crate::runtime::Tendril;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use tendril_dom::NodeId;
use tendril_evaluator::{destructure, Binding, EvalError};
use tendril_parser::{parse_iteration, IterationHeader, Pattern};
use tendril_reactivity::{checked_length, untracked, CallResult, ObjectRef, Value};
use tracing::{debug, trace};

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("for", list);
}

/// Iteration variable patterns of a `for` header
struct LoopVariables {
    item: Pattern,
    index: Option<Pattern>,
    collection: Option<Pattern>,
}

/// A rendered clone and the scope object it reads its iteration variables from
struct Row {
    el: NodeId,
    scope: ObjectRef,
}

#[derive(Default)]
struct ListState {
    keys: Vec<String>,
    rows: IndexMap<String, Row>,
}

fn list(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let template = cx.el();
    if !cx.dom().is_template(template) {
        tendril.warn(
            DiagnosticKind::Misuse,
            TendrilError::not_a_template(tendril.attribute_name("for")).to_string(),
            Some(template),
        );
        return;
    }

    let source = cx.directive().source().to_string();
    let header: IterationHeader = match parse_iteration(&source) {
        Ok(header) => header,
        Err(err) => {
            tendril.report_eval(template, &source, EvalError::syntax(&source, &err));
            return;
        }
    };
    let span = header.items.span;
    let items_source = source.get(span.start..span.end).unwrap_or("").trim().to_string();
    let iterator = Rc::new(LoopVariables {
        item: header.item,
        index: header.index,
        collection: header.collection,
    });

    let items = tendril.evaluate_later(template, items_source.as_str());
    let items_source: Rc<str> = Rc::from(items_source);
    let state = Rc::new(RefCell::new(ListState::default()));
    let weak = tendril.downgrade();
    let render_state = state.clone();
    cx.effect(move || {
        let weak = weak.clone();
        let iterator = iterator.clone();
        let state = render_state.clone();
        let items_source = items_source.clone();
        items.run(move |items| {
            if let Some(tendril) = weak.upgrade() {
                render(&tendril, template, &items_source, &iterator, items, &state);
            }
        });
    });

    let weak = tendril.downgrade();
    cx.cleanup(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        let rows = std::mem::take(&mut state.borrow_mut().rows);
        for (_, row) in rows {
            remove_row(&tendril, row.el);
        }
        state.borrow_mut().keys.clear();
    });
}

/// `(key, value)` pairs to iterate, with the collection exposed to the scope.
/// A numeric range larger than an array can hold is a range error.
fn entries(items: &Value) -> CallResult<Vec<(Value, Value)>> {
    Ok(match items {
        Value::Number(n) if n.is_finite() && *n >= 0.0 => (1..=checked_length(n.trunc())?)
            .enumerate()
            .map(|(index, n)| (Value::from(index), Value::Number(n as f64)))
            .collect(),
        Value::Array(array) => array
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item))
            .collect(),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(index, c)| (Value::from(index), Value::from(c.to_string())))
            .collect(),
        _ => Vec::new(),
    })
}

/// Names an item binds in its clone's scope
fn scope_variables(
    iterator: &LoopVariables,
    item: &Value,
    index: &Value,
    collection: &Value,
) -> Result<Vec<(String, Value)>, EvalError> {
    let mut variables = destructure(&iterator.item, item)?;
    if let Some(pattern) = &iterator.index {
        variables.extend(destructure(pattern, index)?);
    }
    if let Some(pattern) = &iterator.collection {
        variables.extend(destructure(pattern, collection)?);
    }
    Ok(variables)
}

fn render(
    tendril: &Tendril,
    template: NodeId,
    items_source: &str,
    iterator: &LoopVariables,
    items: Value,
    state: &RefCell<ListState>,
) {
    let entries = match entries(&items) {
        Ok(entries) => entries,
        Err(err) => {
            tendril.report_eval(template, items_source, err.into());
            return;
        }
    };
    let key_binding = tendril
        .nodes()
        .with(template, |state| state.key_expression.clone())
        .flatten()
        .unwrap_or_else(|| Binding::from("index"));
    let key_evaluation = tendril.evaluate_later(template, key_binding);

    let mut all_keys = Vec::new();
    let mut all_scopes = Vec::new();
    for (index, item) in entries {
        let variables = match scope_variables(iterator, &item, &index, &items) {
            Ok(variables) => variables,
            Err(err) => {
                tendril.report(Some(template), err.into());
                Vec::new()
            }
        };
        let mut extras: Vec<(&str, Value)> = vec![("index", index.clone())];
        extras.extend(variables.iter().map(|(name, value)| (name.as_str(), value.clone())));
        let key = key_evaluation.value_with(extras);
        if matches!(key, Value::Object(_) | Value::Array(_)) {
            tendril.warn(
                DiagnosticKind::Misuse,
                "List keys must be strings or numbers, not objects",
                Some(template),
            );
        }
        all_keys.push(key.to_display_string());
        all_scopes.push(variables);
    }

    let (kept, duplicates) = first_occurrences(&all_keys);
    for key in duplicates {
        tendril.report(Some(template), TendrilError::DuplicateKey { key });
    }
    let keys: Vec<String> = kept.iter().map(|index| all_keys[*index].clone()).collect();
    let mut scopes: Vec<Vec<(String, Value)>> = Vec::with_capacity(kept.len());
    let mut all_scopes: Vec<Option<Vec<(String, Value)>>> = all_scopes.into_iter().map(Some).collect();
    for index in kept {
        scopes.push(all_scopes[index].take().unwrap_or_default());
    }

    let previous = state.borrow().keys.clone();
    let diff = diff_keys(&previous, &keys);
    trace!(
        removes = diff.removes.len(),
        moves = diff.moves.len(),
        adds = diff.adds.len(),
        "Reconciling list"
    );

    for key in &diff.removes {
        let row = state.borrow_mut().rows.shift_remove(key);
        if let Some(row) = row {
            remove_row(tendril, row.el);
        }
    }

    for (in_spot, for_spot) in &diff.moves {
        let pair = {
            let state = state.borrow();
            state.rows.get(in_spot).map(|row| row.el).zip(state.rows.get(for_spot).map(|row| row.el))
        };
        if let Some((in_spot, for_spot)) = pair {
            swap_rows(tendril, in_spot, for_spot);
        }
    }

    for (anchor, index) in &diff.adds {
        let after = anchor
            .as_ref()
            .and_then(|key| state.borrow().rows.get(key).map(|row| row.el))
            .unwrap_or(template);
        let after = current_if(tendril, after).unwrap_or(after);
        let key = keys[*index].clone();
        if let Some(row) = add_row(tendril, template, after, &scopes[*index]) {
            state.borrow_mut().rows.insert(key, row);
        }
    }

    for key in &diff.sames {
        let scope = state.borrow().rows.get(key).map(|row| row.scope.clone());
        let index = keys.iter().position(|candidate| candidate == key);
        if let (Some(scope), Some(index)) = (scope, index) {
            for (name, value) in &scopes[index] {
                scope.set(name, value.clone());
            }
        }
    }

    state.borrow_mut().keys = keys;
}

fn current_if(tendril: &Tendril, el: NodeId) -> Option<NodeId> {
    tendril.nodes().with(el, |state| state.current_if).flatten()
}

fn add_row(tendril: &Tendril, template: NodeId, after: NodeId, variables: &[(String, Value)]) -> Option<Row> {
    let clone = match tendril.dom().import_template(template) {
        Ok(clone) => clone,
        Err(err) => {
            tendril.report(Some(template), err.into());
            return None;
        }
    };
    let scope = ObjectRef::from_entries(variables.iter().map(|(name, value)| (name.as_str(), value.clone())));
    tendril.nodes().add_scope(tendril.dom(), clone, scope.clone(), Some(template));
    tendril.mutate_dom(|| match tendril.dom().insert_after(after, clone) {
        Ok(()) => untracked(|| tendril.initialize_tree(clone)),
        Err(err) => tendril.report(Some(template), err.into()),
    });
    Some(Row { el: clone, scope })
}

fn remove_row(tendril: &Tendril, el: NodeId) {
    debug!(?el, "Removing list row");
    tendril.mutate_dom(|| {
        tendril.discard_tree(el);
        tendril.dom().dispose(el);
    });
}

/// Swap two rendered rows (and the content their `if` templates rendered)
/// using a placeholder so the pair moves in one step
fn swap_rows(tendril: &Tendril, in_spot: NodeId, for_spot: NodeId) {
    let dom = tendril.dom();
    let marker = dom.create_element("div");
    tendril.mutate_dom(|| -> Result<(), tendril_dom::DomError> {
        dom.insert_after(in_spot, marker)?;
        dom.insert_after(for_spot, in_spot)?;
        if let Some(rendered) = current_if(tendril, in_spot) {
            dom.insert_after(in_spot, rendered)?;
        }
        if let Some(parent) = dom.parent(marker) {
            dom.insert_before(parent, for_spot, Some(marker))?;
        }
        if let Some(rendered) = current_if(tendril, for_spot) {
            dom.insert_after(for_spot, rendered)?;
        }
        dom.dispose(marker);
        Ok(())
    })
    .unwrap_or_else(|err| {
        dom.dispose(marker);
        tendril.report(None, err.into());
    });
}
