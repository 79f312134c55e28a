//! A small CSS selector engine: type, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! descendant and child combinators, and comma-separated lists.

use crate::document::Dom;
use crate::error::{DomError, DomResult};
use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds right-to-left, each paired with the combinator to its left
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    parts: Vec<(Compound, Option<Combinator>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> DomResult<Self> {
        let alternatives = split_top_level(source)
            .into_iter()
            .map(|part| parse_complex(source, part.trim()))
            .collect::<DomResult<Vec<_>>>()?;
        if alternatives.is_empty() {
            return Err(DomError::invalid_selector(source, "empty selector"));
        }
        Ok(Self { alternatives })
    }

    pub fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        self.alternatives.iter().any(|complex| complex_matches(dom, complex, id))
    }
}

fn split_top_level(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, ch) in source.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&source[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

fn parse_complex(full: &str, source: &str) -> DomResult<Complex> {
    if source.is_empty() {
        return Err(DomError::invalid_selector(full, "empty selector in list"));
    }

    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut parts: Vec<(Compound, Option<Combinator>)> = Vec::new();
    let mut pending: Option<Combinator> = None;

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            if !parts.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            continue;
        }
        if ch == '>' {
            if parts.is_empty() {
                return Err(DomError::invalid_selector(full, "combinator without left side"));
            }
            pending = Some(Combinator::Child);
            pos += 1;
            continue;
        }

        let (compound, next) = parse_compound(full, &chars, pos)?;
        parts.push((compound, pending.take()));
        pos = next;
    }

    if pending == Some(Combinator::Child) {
        return Err(DomError::invalid_selector(full, "combinator without right side"));
    }

    // Store right-to-left; the combinator moves to the compound on its right
    parts.reverse();
    Ok(Complex { parts })
}

fn read_ident(chars: &[char], mut pos: usize) -> (String, usize) {
    let mut out = String::new();
    while pos < chars.len() {
        let ch = chars[pos];
        if ch == '\\' && pos + 1 < chars.len() {
            out.push(chars[pos + 1]);
            pos += 2;
        } else if ch.is_alphanumeric() || matches!(ch, '-' | '_') {
            out.push(ch);
            pos += 1;
        } else {
            break;
        }
    }
    (out, pos)
}

fn parse_compound(full: &str, chars: &[char], mut pos: usize) -> DomResult<(Compound, usize)> {
    let mut compound = Compound::default();
    let start = pos;

    if chars[pos] == '*' {
        pos += 1;
    } else if chars[pos].is_alphabetic() {
        let (tag, next) = read_ident(chars, pos);
        compound.tag = Some(tag.to_ascii_lowercase());
        pos = next;
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                let (id, next) = read_ident(chars, pos + 1);
                if id.is_empty() {
                    return Err(DomError::invalid_selector(full, "expected id after '#'"));
                }
                compound.id = Some(id);
                pos = next;
            }
            '.' => {
                let (class, next) = read_ident(chars, pos + 1);
                if class.is_empty() {
                    return Err(DomError::invalid_selector(full, "expected class after '.'"));
                }
                compound.classes.push(class);
                pos = next;
            }
            '[' => {
                let close = chars[pos..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| DomError::invalid_selector(full, "unterminated attribute selector"))?;
                let inner: String = chars[pos + 1..close].iter().collect();
                compound.attributes.push(parse_attribute(full, &inner)?);
                pos = close + 1;
            }
            _ => break,
        }
    }

    if pos == start {
        return Err(DomError::invalid_selector(
            full,
            format!("unexpected character '{}'", chars[pos]),
        ));
    }
    Ok((compound, pos))
}

fn parse_attribute(full: &str, inner: &str) -> DomResult<(String, Option<String>)> {
    let unescape = |s: &str| s.replace('\\', "");
    match inner.split_once('=') {
        Some((name, value)) => {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Ok((unescape(name.trim()).to_ascii_lowercase(), Some(value.to_string())))
        }
        None => {
            let name = unescape(inner.trim());
            if name.is_empty() {
                return Err(DomError::invalid_selector(full, "empty attribute selector"));
            }
            Ok((name.to_ascii_lowercase(), None))
        }
    }
}

fn compound_matches(dom: &Dom, compound: &Compound, id: NodeId) -> bool {
    let Some(tag) = dom.tag_name(id) else {
        return false;
    };
    if compound.tag.as_ref().is_some_and(|t| *t != tag) {
        return false;
    }
    if let Some(expected) = &compound.id {
        if dom.get_attribute(id, "id").as_ref() != Some(expected) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes = dom.class_list(id);
        if !compound.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
    }
    compound.attributes.iter().all(|(name, value)| match value {
        Some(expected) => dom.get_attribute(id, name).as_ref() == Some(expected),
        None => dom.has_attribute(id, name),
    })
}

fn complex_matches(dom: &Dom, complex: &Complex, id: NodeId) -> bool {
    matches_from(dom, &complex.parts, 0, id)
}

fn matches_from(dom: &Dom, parts: &[(Compound, Option<Combinator>)], index: usize, id: NodeId) -> bool {
    let Some((compound, combinator)) = parts.get(index) else {
        return true;
    };
    if !compound_matches(dom, compound, id) {
        return false;
    }
    match combinator {
        None => true,
        Some(Combinator::Child) => dom
            .parent_element(id)
            .is_some_and(|parent| matches_from(dom, parts, index + 1, parent)),
        Some(Combinator::Descendant) => dom
            .ancestors(id)
            .into_iter()
            .filter(|ancestor| dom.is_element(*ancestor))
            .any(|ancestor| matches_from(dom, parts, index + 1, ancestor)),
    }
}

impl Dom {
    pub fn matches(&self, id: NodeId, selector: &str) -> DomResult<bool> {
        Ok(Selector::parse(selector)?.matches(self, id))
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, id: NodeId, selector: &str) -> DomResult<Option<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|node| selector.matches(self, *node)))
    }

    pub fn query_selector(&self, root: NodeId, selector: &str) -> DomResult<Option<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .find(|node| selector.matches(self, *node)))
    }

    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> DomResult<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect())
    }
}
