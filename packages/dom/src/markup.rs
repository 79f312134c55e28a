//! Markup parsing and serialization
//!
//! The parser is deliberately lenient: it lowercases tag and attribute names,
//! accepts directive-style attribute names (`@click`, `:class`, `x-on:keyup.enter`),
//! knows void elements, keeps `<template>` children in the template's content
//! fragment, and closes unmatched tags at the end of input.

use crate::document::Dom;
use crate::error::{DomError, DomResult};
use crate::node::{is_void_element, NodeId, NodeKind};
use tracing::debug;

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Elements implicitly closed when a sibling of the same tag opens
const SELF_NESTING_FORBIDDEN: &[&str] = &["p", "li", "option", "dt", "dd", "tr", "td", "th"];

struct MarkupParser<'a> {
    dom: &'a Dom,
    source: &'a str,
    pos: usize,
    /// (tag, insertion container) of open elements
    open: Vec<(String, NodeId)>,
}

impl<'a> MarkupParser<'a> {
    fn new(dom: &'a Dom, source: &'a str, root: NodeId) -> Self {
        Self {
            dom,
            source,
            pos: 0,
            open: vec![(String::new(), root)],
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn container(&self) -> NodeId {
        self.open.last().map(|(_, id)| *id).unwrap_or_else(|| self.dom.document())
    }

    fn error(&self, message: impl Into<String>) -> DomError {
        DomError::markup(self.pos, message)
    }

    fn attach(&self, node: NodeId) -> DomResult<()> {
        self.dom.append_child(self.container(), node)
    }

    fn parse(&mut self) -> DomResult<()> {
        while self.pos < self.source.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.parse_comment()?;
            } else if rest.starts_with("</") {
                self.parse_end_tag()?;
            } else if rest.starts_with("<!") {
                // doctype and other declarations are skipped
                let end = rest.find('>').ok_or_else(|| self.error("unterminated declaration"))?;
                self.pos += end + 1;
            } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.parse_start_tag()?;
            } else {
                self.parse_text()?;
            }
        }
        Ok(())
    }

    fn parse_comment(&mut self) -> DomResult<()> {
        let body_start = self.pos + 4;
        let end = self.source[body_start..]
            .find("-->")
            .ok_or_else(|| self.error("unterminated comment"))?;
        let comment = self.dom.create_comment(&self.source[body_start..body_start + end]);
        self.attach(comment)?;
        self.pos = body_start + end + 3;
        Ok(())
    }

    fn parse_end_tag(&mut self) -> DomResult<()> {
        let rest = self.rest();
        let end = rest.find('>').ok_or_else(|| self.error("unterminated end tag"))?;
        let tag = rest[2..end].trim().to_ascii_lowercase();
        self.pos += end + 1;

        match self.open.iter().rposition(|(open_tag, _)| *open_tag == tag) {
            Some(index) if index > 0 => self.open.truncate(index),
            _ => debug!(tag, "unmatched end tag ignored"),
        }
        Ok(())
    }

    fn parse_text(&mut self) -> DomResult<()> {
        let rest = self.rest();
        // A '<' that does not open a tag is literal text
        let mut end = rest.len();
        for (index, _) in rest.match_indices('<').filter(|(index, _)| *index > 0) {
            let after = &rest[index + 1..];
            if after.starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!') {
                end = index;
                break;
            }
        }
        let text = decode_entities(&rest[..end]);
        self.pos += end;
        let node = self.dom.create_text(&text);
        self.attach(node)
    }

    fn parse_start_tag(&mut self) -> DomResult<()> {
        self.pos += 1;
        let tag = self.read_while(|c| !c.is_whitespace() && c != '>' && c != '/').to_ascii_lowercase();
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unterminated start tag <{}>", tag)));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let name = self
                .read_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            if name.is_empty() {
                return Err(self.error("expected attribute name"));
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attribute_value()?
            } else {
                String::new()
            };
            if !attributes.iter().any(|(existing, _)| *existing == name) {
                attributes.push((name, value));
            }
        }

        if SELF_NESTING_FORBIDDEN.contains(&tag.as_str())
            && self.open.last().is_some_and(|(open_tag, _)| *open_tag == tag)
        {
            self.open.pop();
        }

        let element = self.dom.create_element(&tag);
        self.dom.with_element_mut(element, |el| {
            el.attributes.extend(attributes);
        });
        self.attach(element)?;

        if self_closing || is_void_element(&tag) {
            return Ok(());
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let close = format!("</{}", tag);
            let rest = self.rest();
            let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
            let raw = &rest[..end];
            if !raw.is_empty() {
                let text = if tag == "textarea" {
                    decode_entities(raw)
                } else {
                    raw.to_string()
                };
                let node = self.dom.create_text(&text);
                self.dom.append_child(element, node)?;
            }
            self.pos += end;
            if let Some(close_end) = self.rest().find('>') {
                self.pos += close_end + 1;
            }
            return Ok(());
        }

        let container = self.dom.template_content(element).unwrap_or(element);
        self.open.push((tag, container));
        Ok(())
    }

    fn read_attribute_value(&mut self) -> DomResult<String> {
        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'');
        match quote {
            Some(quote) => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated attribute value"))?;
                let raw = &rest[1..1 + end];
                self.pos += end + 2;
                Ok(decode_entities(raw))
            }
            None => {
                let raw = self.read_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(raw))
            }
        }
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn skip_whitespace(&mut self) {
        self.read_while(char::is_whitespace);
    }
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

impl Dom {
    /// Parse `html` and append the resulting nodes to `parent` (a template's
    /// content when `parent` is a template). Returns the top-level nodes.
    pub fn append_html(&self, parent: NodeId, html: &str) -> DomResult<Vec<NodeId>> {
        let target = self.template_content(parent).unwrap_or(parent);
        let staging = self.create_fragment();
        let appended = MarkupParser::new(self, html, staging).parse().and_then(|()| {
            let nodes = self.children(staging);
            self.append_child(target, staging).map(|()| nodes)
        });
        self.dispose(staging);
        appended
    }

    pub fn set_inner_html(&self, id: NodeId, html: &str) -> DomResult<Vec<NodeId>> {
        let target = self.template_content(id).unwrap_or(id);
        for child in self.children(target) {
            self.remove(child);
        }
        self.append_html(target, html)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let container = self.template_content(id).unwrap_or(id);
        for child in self.children(container) {
            self.serialize_into(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        let Some(kind) = self.with_node(id, |node| node.kind.clone()) else {
            return;
        };
        match kind {
            NodeKind::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|parent| self.tag_name(parent))
                    .is_some_and(|tag| tag == "script" || tag == "style");
                out.push_str(&if raw { text } else { escape_text(&text) });
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
            NodeKind::Document | NodeKind::Fragment => {
                for child in self.children(id) {
                    self.serialize_into(child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&element.tag) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive_attributes() {
        let dom = Dom::new();
        let nodes = dom
            .append_html(dom.body(), r#"<button @click.prevent="open = !open" :class="{ active: open }">Go</button>"#)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        let button = nodes[0];
        assert_eq!(dom.get_attribute(button, "@click.prevent").as_deref(), Some("open = !open"));
        assert_eq!(dom.get_attribute(button, ":class").as_deref(), Some("{ active: open }"));
        assert_eq!(dom.text_content(button), "Go");
    }

    #[test]
    fn test_template_children_go_to_content() {
        let dom = Dom::new();
        let nodes = dom
            .append_html(dom.body(), "<template x-if=\"open\"><div>hi</div></template>")
            .unwrap();
        let template = nodes[0];
        assert!(dom.children(template).is_empty());
        let content = dom.template_content(template).unwrap();
        assert_eq!(dom.element_children(content).len(), 1);
        assert_eq!(
            dom.outer_html(template),
            "<template x-if=\"open\"><div>hi</div></template>"
        );
    }

    #[test]
    fn test_void_and_implicitly_closed_elements() {
        let dom = Dom::new();
        dom.set_inner_html(dom.body(), "<ul><li>a<li>b</ul><input value=x><br/>").unwrap();
        assert_eq!(
            dom.inner_html(dom.body()),
            "<ul><li>a</li><li>b</li></ul><input value=\"x\"><br>"
        );
    }

    #[test]
    fn test_entities_and_escaping() {
        let dom = Dom::new();
        let nodes = dom.append_html(dom.body(), "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3</p>").unwrap();
        assert_eq!(dom.text_content(nodes[0]), "1 < 2 & 3");
        assert_eq!(
            dom.outer_html(nodes[0]),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3</p>"
        );
        assert_eq!(decode_entities("&#65;&#x42;&unknown;"), "AB&unknown;");
    }

    #[test]
    fn test_unterminated_tag_is_an_error() {
        let dom = Dom::new();
        assert!(matches!(
            dom.append_html(dom.body(), "<div class=\"x"),
            Err(DomError::Markup { .. })
        ));
    }

    #[test]
    fn test_insertion_is_a_single_record() {
        let dom = Dom::new();
        dom.observe(|| {});
        dom.append_html(dom.body(), "<div><span></span></div><p></p>").unwrap();
        let records = dom.take_records();
        assert_eq!(records.len(), 1);
    }
}
