//! Classes, inline styles and computed style lookups
//!
//! Both live in attributes (`class`, `style`), so every write is an observable
//! attribute mutation. Computed style is the inline declaration if present,
//! otherwise the last registered class rule the element matches.

use crate::document::Dom;
use crate::node::NodeId;
use indexmap::IndexMap;

/// Parse `a: b; c: d` into ordered declarations
pub fn parse_declarations(text: &str) -> IndexMap<String, String> {
    text.split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty()).then(|| (name.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

pub fn serialize_declarations(declarations: &IndexMap<String, String>) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a CSS time list (`150ms`, `0.3s, 1s`) into milliseconds
pub fn parse_time_list(value: &str) -> Vec<f64> {
    value
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if let Some(ms) = part.strip_suffix("ms") {
                ms.trim().parse::<f64>().ok()
            } else if let Some(s) = part.strip_suffix('s') {
                s.trim().parse::<f64>().ok().map(|s| s * 1000.0)
            } else {
                part.parse::<f64>().ok()
            }
        })
        .collect()
}

impl Dom {
    // Classes

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.get_attribute(id, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).iter().any(|c| c == class)
    }

    pub fn add_classes(&self, id: NodeId, classes: &[&str]) {
        let mut list = self.class_list(id);
        let before = list.len();
        for class in classes {
            if !class.is_empty() && !list.iter().any(|c| c == class) {
                list.push(class.to_string());
            }
        }
        if list.len() != before {
            self.set_attribute(id, "class", &list.join(" "));
        }
    }

    pub fn add_class(&self, id: NodeId, class: &str) {
        self.add_classes(id, &[class]);
    }

    pub fn remove_classes(&self, id: NodeId, classes: &[&str]) {
        let list = self.class_list(id);
        let kept: Vec<String> = list
            .iter()
            .filter(|c| !classes.contains(&c.as_str()))
            .cloned()
            .collect();
        if kept.len() != list.len() {
            self.set_attribute(id, "class", &kept.join(" "));
        }
    }

    pub fn remove_class(&self, id: NodeId, class: &str) {
        self.remove_classes(id, &[class]);
    }

    // Inline style

    pub fn style_map(&self, id: NodeId) -> IndexMap<String, String> {
        self.get_attribute(id, "style")
            .map(|style| parse_declarations(&style))
            .unwrap_or_default()
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        self.style_map(id).get(name).cloned()
    }

    pub fn set_style_property(&self, id: NodeId, name: &str, value: &str) {
        let mut map = self.style_map(id);
        if map.get(name).is_some_and(|current| current == value) {
            return;
        }
        map.insert(name.to_ascii_lowercase(), value.to_string());
        self.set_attribute(id, "style", &serialize_declarations(&map));
    }

    pub fn remove_style_property(&self, id: NodeId, name: &str) {
        let mut map = self.style_map(id);
        if map.shift_remove(name).is_none() {
            return;
        }
        if map.is_empty() {
            self.remove_attribute(id, "style");
        } else {
            self.set_attribute(id, "style", &serialize_declarations(&map));
        }
    }

    // Computed style

    /// Register declarations applied to every element carrying `class`
    pub fn add_class_rule(&self, class: &str, declarations: &str) {
        self.inner
            .class_rules
            .borrow_mut()
            .insert(class.to_string(), parse_declarations(declarations));
    }

    pub fn computed_style(&self, id: NodeId, name: &str) -> Option<String> {
        if let Some(inline) = self.style_property(id, name) {
            return Some(inline.trim_end_matches("!important").trim_end().to_string());
        }
        let classes = self.class_list(id);
        let rules = self.inner.class_rules.borrow();
        rules
            .iter()
            .filter(|(class, _)| classes.iter().any(|c| c == *class))
            .filter_map(|(_, declarations)| declarations.get(name).cloned())
            .last()
    }

    /// False when the element or an ancestor computes to `display: none`
    pub fn is_displayed(&self, id: NodeId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|node| self.is_element(*node))
            .all(|node| self.computed_style(node, "display").as_deref() != Some("none"))
    }
}
