//! The document arena
//!
//! `Dom` is a cheap cloneable handle. Removing a node only detaches it, so its
//! id stays valid and can be re-inserted. [`Dom::dispose`] frees a subtree
//! for good.

use crate::error::{DomError, DomResult};
use crate::events::Listeners;
use crate::node::{ElementData, NodeData, NodeId, NodeKind, NodeType};
use crate::observer::{MutationRecord, ObserverState};
use indexmap::IndexMap;
use slotmap::SlotMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

pub(crate) struct DomInner {
    pub nodes: RefCell<SlotMap<NodeId, NodeData>>,
    pub document: NodeId,
    pub document_element: NodeId,
    pub head: NodeId,
    pub body: NodeId,
    pub focused: Cell<Option<NodeId>>,
    pub observer: RefCell<ObserverState>,
    pub listeners: RefCell<Listeners>,
    /// class name -> declarations, in registration order
    pub class_rules: RefCell<IndexMap<String, IndexMap<String, String>>>,
}

#[derive(Clone)]
pub struct Dom {
    pub(crate) inner: Rc<DomInner>,
}

impl Dom {
    /// A document with `<html><head></head><body></body></html>`
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let document = nodes.insert(NodeData::new(NodeKind::Document));
        let document_element = nodes.insert(NodeData::new(element_kind("html")));
        let head = nodes.insert(NodeData::new(element_kind("head")));
        let body = nodes.insert(NodeData::new(element_kind("body")));

        for (parent, child) in [(document, document_element), (document_element, head), (document_element, body)] {
            nodes[child].parent = Some(parent);
            nodes[parent].children.push(child);
        }

        Self {
            inner: Rc::new(DomInner {
                nodes: RefCell::new(nodes),
                document,
                document_element,
                head,
                body,
                focused: Cell::new(None),
                observer: RefCell::new(ObserverState::default()),
                listeners: RefCell::new(Listeners::default()),
                class_rules: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub fn document(&self) -> NodeId {
        self.inner.document
    }

    pub fn document_element(&self) -> NodeId {
        self.inner.document_element
    }

    pub fn head(&self) -> NodeId {
        self.inner.head
    }

    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    pub fn ptr_eq(&self, other: &Dom) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // Creation

    fn alloc(&self, kind: NodeKind) -> NodeId {
        self.inner.nodes.borrow_mut().insert(NodeData::new(kind))
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let content = (tag == "template").then(|| self.create_fragment());
        let mut kind = element_kind(&tag);
        if let NodeKind::Element(data) = &mut kind {
            data.template_content = content;
        }
        self.alloc(kind)
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.borrow().len()
    }

    // Node queries

    pub(crate) fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.inner.nodes.borrow().get(id).map(f)
    }

    pub(crate) fn with_element<R>(&self, id: NodeId, f: impl FnOnce(&ElementData) -> R) -> Option<R> {
        self.inner.nodes.borrow().get(id).and_then(NodeData::element).map(f)
    }

    pub(crate) fn with_element_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut ElementData) -> R) -> Option<R> {
        self.inner
            .nodes
            .borrow_mut()
            .get_mut(id)
            .and_then(NodeData::element_mut)
            .map(f)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.inner.nodes.borrow().contains_key(id)
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.with_node(id, |node| node.kind.node_type())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.node_type(id) == Some(NodeType::Element)
    }

    /// Lowercase tag name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.with_element(id, |el| el.tag.clone())
    }

    pub fn is_template(&self, id: NodeId) -> bool {
        self.with_element(id, |el| el.tag == "template").unwrap_or(false)
    }

    pub fn template_content(&self, id: NodeId) -> Option<NodeId> {
        self.with_element(id, |el| el.template_content).flatten()
    }

    /// Character data of a text or comment node
    pub fn node_text(&self, id: NodeId) -> Option<String> {
        self.with_node(id, |node| match &node.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn set_node_text(&self, id: NodeId, text: &str) {
        if let Some(node) = self.inner.nodes.borrow_mut().get_mut(id) {
            if let NodeKind::Text(data) | NodeKind::Comment(data) = &mut node.kind {
                *data = text.to_string();
            }
        }
    }

    // Tree navigation

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.with_node(id, |node| node.parent).flatten()
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.with_node(id, |node| node.children.clone()).unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|child| nodes.get(*child).is_some_and(|c| c.element().is_some()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.element_children(id).into_iter().next()
    }

    fn sibling(&self, id: NodeId, offset: isize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let nodes = self.inner.nodes.borrow();
        let siblings = &nodes.get(parent)?.children;
        let index = siblings.iter().position(|child| *child == id)?;
        let target = index.checked_add_signed(offset)?;
        siblings.get(target).copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, -1)
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.next_sibling(id);
        while let Some(node) = current {
            if self.is_element(node) {
                return Some(node);
            }
            current = self.next_sibling(node);
        }
        None
    }

    /// Inclusive descendant check
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let nodes = self.inner.nodes.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.inner.document, id)
    }

    /// Parents from nearest to furthest
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        let mut out = Vec::new();
        let mut current = nodes.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = nodes.get(parent).and_then(|n| n.parent);
        }
        out
    }

    /// Pre-order descendants (excluding `id`), not entering template content
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = nodes
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            out.push(node);
            if let Some(data) = nodes.get(node) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    // Structural mutation

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` (or a fragment's children) before `reference`, or at the end
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        self.validate_insert(parent, child, reference)?;

        let reference = match reference {
            Some(r) if r == child => self.next_sibling(child),
            other => other,
        };

        let moving: Vec<NodeId> = if self.node_type(child) == Some(NodeType::Fragment) {
            self.children(child)
        } else {
            vec![child]
        };
        if moving.is_empty() {
            return Ok(());
        }

        for node in &moving {
            self.detach(*node);
        }

        {
            let mut nodes = self.inner.nodes.borrow_mut();
            let siblings = &nodes[parent].children;
            let index = match reference {
                Some(r) => siblings
                    .iter()
                    .position(|c| *c == r)
                    .ok_or(DomError::NotAChild { parent, reference: r })?,
                None => siblings.len(),
            };
            nodes[parent].children.splice(index..index, moving.iter().copied());
            for node in &moving {
                nodes[*node].parent = Some(parent);
            }
        }

        if self.is_connected(parent) {
            self.record(MutationRecord::ChildList {
                target: parent,
                added: moving,
                removed: Vec::new(),
            });
        }
        Ok(())
    }

    /// Insert `child` directly after `reference` in its parent
    pub fn insert_after(&self, reference: NodeId, child: NodeId) -> DomResult<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| DomError::hierarchy(reference, child, "reference node has no parent"))?;
        let next = self.next_sibling(reference);
        self.insert_before(parent, child, next)
    }

    fn validate_insert(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        let nodes = self.inner.nodes.borrow();
        let parent_node = nodes.get(parent).ok_or(DomError::NodeNotFound(parent))?;
        let child_node = nodes.get(child).ok_or(DomError::NodeNotFound(child))?;

        if !parent_node.kind.can_have_children() {
            return Err(DomError::hierarchy(parent, child, "parent cannot have children"));
        }
        if matches!(child_node.kind, NodeKind::Document) {
            return Err(DomError::hierarchy(parent, child, "cannot insert a document"));
        }
        drop(nodes);

        if self.contains(child, parent) {
            return Err(DomError::hierarchy(parent, child, "child is an ancestor of parent"));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, reference });
            }
        }
        Ok(())
    }

    /// Unlink `id` from its parent, recording the removal when observable
    fn detach(&self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let connected = self.is_connected(parent);
        {
            let mut nodes = self.inner.nodes.borrow_mut();
            nodes[parent].children.retain(|c| *c != id);
            nodes[id].parent = None;
        }
        if self.inner.focused.get().is_some_and(|focused| self.contains(id, focused)) {
            self.inner.focused.set(None);
        }
        if connected {
            self.record(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![id],
            });
        }
    }

    /// Remove `id` from its parent; a no-op for detached nodes
    pub fn remove(&self, id: NodeId) {
        self.detach(id);
    }

    /// Remove `id`, then free it together with its subtree and every template
    /// content fragment inside. Ids of disposed nodes no longer resolve.
    pub fn dispose(&self, id: NodeId) {
        if id == self.inner.document || !self.exists(id) {
            return;
        }
        self.detach(id);
        let mut freed = Vec::new();
        {
            let mut nodes = self.inner.nodes.borrow_mut();
            let mut stack = vec![id];
            while let Some(node) = stack.pop() {
                let Some(data) = nodes.remove(node) else {
                    continue;
                };
                stack.extend(data.children);
                if let NodeKind::Element(element) = data.kind {
                    stack.extend(element.template_content);
                }
                freed.push(node);
            }
        }
        self.forget_listeners(&freed);
        debug!(?id, freed = freed.len(), "Disposed subtree");
    }

    /// Copy a node (and, when `deep`, its subtree and template content)
    pub fn clone_node(&self, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = self
            .with_node(id, |node| (node.kind.clone(), node.children.clone()))
            .ok_or(DomError::NodeNotFound(id))?;
        let (mut kind, children) = data;

        if let NodeKind::Element(element) = &mut kind {
            if let Some(content) = element.template_content {
                element.template_content = Some(if deep {
                    self.clone_node(content, true)?
                } else {
                    self.create_fragment()
                });
            }
        }

        let copy = self.alloc(kind);
        if deep {
            for child in children {
                let child_copy = self.clone_node(child, true)?;
                let mut nodes = self.inner.nodes.borrow_mut();
                nodes[child_copy].parent = Some(copy);
                nodes[copy].children.push(child_copy);
            }
        }
        Ok(copy)
    }

    /// Deep copy of the first element inside a template's content
    pub fn import_template(&self, template: NodeId) -> DomResult<NodeId> {
        let content = self.template_content(template).ok_or(DomError::EmptyTemplate(template))?;
        let first = self
            .first_element_child(content)
            .ok_or(DomError::EmptyTemplate(template))?;
        self.clone_node(first, true)
    }

    // Attributes

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.with_element(id, |el| el.attributes.get(&name).cloned()).flatten()
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.with_element(id, |el| el.attributes.contains_key(&name))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let old_value = self.with_element_mut(id, |el| el.attributes.insert(name.clone(), value.to_string()));
        let Some(old_value) = old_value else {
            debug!(?id, name, "set_attribute on a non-element ignored");
            return;
        };
        if self.is_connected(id) {
            self.record(MutationRecord::Attributes {
                target: id,
                name,
                old_value,
            });
        }
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let removed = self
            .with_element_mut(id, |el| el.attributes.shift_remove(&name))
            .flatten();
        if let Some(old_value) = removed {
            if self.is_connected(id) {
                self.record(MutationRecord::Attributes {
                    target: id,
                    name,
                    old_value: Some(old_value),
                });
            }
        }
    }

    pub fn attribute_names(&self, id: NodeId) -> Vec<String> {
        self.with_element(id, |el| el.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.with_element(id, |el| {
            el.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
    }

    // Text

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.node_text(id) {
            return text;
        }
        self.descendants(id)
            .into_iter()
            .filter(|node| self.node_type(*node) == Some(NodeType::Text))
            .filter_map(|node| self.node_text(node))
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&self, id: NodeId, text: &str) {
        if self.node_text(id).is_some() {
            self.set_node_text(id, text);
            return;
        }
        for child in self.children(id) {
            // Replaced text is unreachable once detached
            if matches!(self.node_type(child), Some(NodeType::Text | NodeType::Comment)) {
                self.dispose(child);
            } else {
                self.detach(child);
            }
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            if let Err(err) = self.append_child(id, node) {
                debug!(error = %err, "set_text_content failed");
            }
        }
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element(ElementData {
        tag: tag.to_string(),
        ..ElementData::default()
    })
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom")
            .field("nodes", &self.node_count())
            .field("body", &self.inner_html(self.body()))
            .finish()
    }
}
