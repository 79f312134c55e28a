use indexmap::IndexMap;
use slotmap::new_key_type;

new_key_type! {
    /// Opaque identifier for a node stored in the document arena.
    pub struct NodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
    Fragment,
}

/// Element payload: tag, ordered attributes and live form state
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    /// Live `value` once set programmatically or by user input
    pub value: Option<String>,
    /// Live checkedness; falls back to the `checked` attribute
    pub checked: Option<bool>,
    /// Live selectedness for options; falls back to the `selected` attribute
    pub selected: Option<bool>,
    /// Content fragment of a `<template>`
    pub template_content: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::Fragment,
        }
    }

    pub fn can_have_children(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element(_) | NodeKind::Fragment)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }
}

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}
