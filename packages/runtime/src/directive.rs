//! Directive descriptors parsed from attribute names
//!
//! `x-on:click.prevent="save()"` becomes kind `on`, value `click`, modifiers
//! `[prevent]`. The shorthands `@event` and `:attr` expand to `on:event` and
//! `bind:attr` before parsing.

use std::rc::Rc;
use tendril_evaluator::Binding;

/// Placeholder in the priority list for kinds that are not listed
pub const DEFAULT_SLOT: &str = "DEFAULT";

/// Initial execution order of directive kinds on one element
pub const BUILTIN_ORDER: &[&str] = &[
    "ignore", "ref", "data", "id", "bind", "init", "for", "model", "modelable", "transition", "show", "if",
    DEFAULT_SLOT, "teleport",
];

#[derive(Debug, Clone)]
pub struct Directive {
    pub kind: String,
    pub value: Option<String>,
    pub modifiers: Vec<String>,
    pub expression: Binding,
    /// Attribute name as written, used to find cleanups when it is removed
    pub original: String,
}

impl Directive {
    /// Expression source text, empty for function bindings
    pub fn source(&self) -> &str {
        self.expression.source().unwrap_or("")
    }

    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|modifier| modifier == name)
    }

    /// The modifier following `name`, e.g. `500ms` in `.debounce.500ms`
    pub fn modifier_after(&self, name: &str) -> Option<&str> {
        let index = self.modifiers.iter().position(|modifier| modifier == name)?;
        self.modifiers.get(index + 1).map(String::as_str)
    }
}

/// Expand `@` and `:` shorthands into full directive names
pub fn expand_shorthand(name: &str, prefix: &str) -> String {
    if let Some(rest) = name.strip_prefix('@') {
        format!("{prefix}on:{rest}")
    } else if let Some(rest) = name.strip_prefix(':') {
        format!("{prefix}bind:{rest}")
    } else {
        name.to_string()
    }
}

/// Parse one attribute into a directive. Non-directive attributes yield `None`.
pub fn parse_directive(name: &str, expression: Binding, prefix: &str, original: Option<&str>) -> Option<Directive> {
    let expanded = expand_shorthand(name, prefix);
    let rest = expanded.strip_prefix(prefix)?;

    let kind_end = rest.find([':', '.', '^']).unwrap_or(rest.len());
    let kind = &rest[..kind_end];
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return None;
    }

    let after_kind = &rest[kind_end..];
    let value = after_kind.strip_prefix(':').map(|tail| {
        tail.chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
            .collect::<String>()
    });

    Some(Directive {
        kind: kind.to_string(),
        value: value.filter(|value| !value.is_empty()),
        modifiers: parse_modifiers(after_kind),
        expression,
        original: original.unwrap_or(name).to_string(),
    })
}

/// Dot-separated modifiers outside of `[...]` groups
fn parse_modifiers(text: &str) -> Vec<String> {
    let mut modifiers = Vec::new();
    let mut current: Option<String> = None;
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                if let Some(done) = current.take().filter(|m| !m.is_empty()) {
                    modifiers.push(done);
                }
                current = Some(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(modifier) = current.as_mut() {
            if depth == 0 {
                modifier.push(c);
            }
        }
    }
    if let Some(done) = current.filter(|m| !m.is_empty()) {
        modifiers.push(done);
    }
    modifiers
}

/// Stable sort by position in `order`; unknown kinds take the default slot
pub fn sort_by_priority(directives: &mut [Directive], order: &[String]) {
    let default = order.iter().position(|kind| kind == DEFAULT_SLOT).unwrap_or(order.len());
    directives.sort_by_key(|directive| order.iter().position(|kind| *kind == directive.kind).unwrap_or(default));
}

/// Attribute value as a directive expression
pub fn source_binding(value: &str) -> Binding {
    Binding::Source(Rc::from(value))
}
