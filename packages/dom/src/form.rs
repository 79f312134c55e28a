//! Live form state: `value`, `checked` and `selected`
//!
//! These are properties, not attributes. Reading falls back to the markup
//! defaults until the property has been written, and writes never produce
//! mutation records.

use crate::document::Dom;
use crate::node::NodeId;

impl Dom {
    /// Lowercase `type` of an `<input>`, `"text"` when unset. `None` for other elements.
    pub fn input_type(&self, id: NodeId) -> Option<String> {
        if self.tag_name(id).as_deref() != Some("input") {
            return None;
        }
        Some(
            self.get_attribute(id, "type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string()),
        )
    }

    pub fn is_multiple_select(&self, id: NodeId) -> bool {
        self.tag_name(id).as_deref() == Some("select") && self.has_attribute(id, "multiple")
    }

    pub fn value(&self, id: NodeId) -> String {
        if let Some(live) = self.with_element(id, |el| el.value.clone()).flatten() {
            return live;
        }
        match self.tag_name(id).as_deref() {
            Some("textarea") => self.text_content(id),
            Some("select") => {
                let options = self.options(id);
                options
                    .iter()
                    .copied()
                    .find(|option| self.selected(*option))
                    .or_else(|| (!self.is_multiple_select(id)).then(|| options.first().copied()).flatten())
                    .map(|option| self.value(option))
                    .unwrap_or_default()
            }
            Some("option") => self
                .get_attribute(id, "value")
                .unwrap_or_else(|| self.text_content(id).trim().to_string()),
            Some("input") => self.get_attribute(id, "value").unwrap_or_else(|| {
                match self.input_type(id).as_deref() {
                    Some("checkbox") | Some("radio") => "on".to_string(),
                    _ => String::new(),
                }
            }),
            _ => self.get_attribute(id, "value").unwrap_or_default(),
        }
    }

    pub fn set_value(&self, id: NodeId, value: &str) {
        if self.tag_name(id).as_deref() == Some("select") {
            for option in self.options(id) {
                let matches = self.value(option) == value;
                self.set_selected(option, matches);
            }
            return;
        }
        self.with_element_mut(id, |el| el.value = Some(value.to_string()));
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.with_element(id, |el| el.checked)
            .flatten()
            .unwrap_or_else(|| self.has_attribute(id, "checked"))
    }

    /// Set checkedness. Checking a radio unchecks the others in its named group.
    pub fn set_checked(&self, id: NodeId, checked: bool) {
        self.with_element_mut(id, |el| el.checked = Some(checked));
        if !checked || self.input_type(id).as_deref() != Some("radio") {
            return;
        }
        let Some(name) = self.get_attribute(id, "name") else {
            return;
        };
        let root = self.ancestors(id).last().copied().unwrap_or(id);
        for other in self.descendants(root) {
            if other != id
                && self.input_type(other).as_deref() == Some("radio")
                && self.get_attribute(other, "name").as_deref() == Some(name.as_str())
            {
                self.with_element_mut(other, |el| el.checked = Some(false));
            }
        }
    }

    pub fn selected(&self, option: NodeId) -> bool {
        self.with_element(option, |el| el.selected)
            .flatten()
            .unwrap_or_else(|| self.has_attribute(option, "selected"))
    }

    pub fn set_selected(&self, option: NodeId, selected: bool) {
        self.with_element_mut(option, |el| el.selected = Some(selected));
    }

    /// `<option>` descendants of a select, in document order
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|node| self.tag_name(*node).as_deref() == Some("option"))
            .collect()
    }

    pub fn selected_values(&self, select: NodeId) -> Vec<String> {
        self.options(select)
            .into_iter()
            .filter(|option| self.selected(*option))
            .map(|option| self.value(option))
            .collect()
    }

    pub fn set_selected_values(&self, select: NodeId, values: &[String]) {
        for option in self.options(select) {
            let value = self.value(option);
            self.set_selected(option, values.contains(&value));
        }
    }
}
