use crate::node::NodeId;
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("Cannot insert {child:?} into {parent:?}: {reason}")]
    HierarchyRequest {
        parent: NodeId,
        child: NodeId,
        reason: String,
    },

    #[error("{reference:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Markup error at {pos}: {message}")]
    Markup { pos: usize, message: String },

    #[error("Template {0:?} has no element content")]
    EmptyTemplate(NodeId),
}

impl DomError {
    pub fn hierarchy(parent: NodeId, child: NodeId, reason: impl Into<String>) -> Self {
        Self::HierarchyRequest {
            parent,
            child,
            reason: reason.into(),
        }
    }

    pub fn invalid_selector(selector: &str, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    pub fn markup(pos: usize, message: impl Into<String>) -> Self {
        Self::Markup {
            pos,
            message: message.into(),
        }
    }
}
