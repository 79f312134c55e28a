use tendril_dom::{DomError, NodeId};
use tendril_evaluator::EvalError;
use thiserror::Error;

pub type TendrilResult<T> = Result<T, TendrilError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TendrilError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("`{directive}` can only be used on a <template> element")]
    NotATemplate { directive: String },

    #[error("Cannot find an element matching `{selector}` to teleport to")]
    TeleportTarget { selector: String },

    #[error("Duplicate key `{key}` in list")]
    DuplicateKey { key: String },

    #[error("Element {0:?} is not part of the document")]
    Detached(NodeId),
}

impl TendrilError {
    pub fn not_a_template(directive: impl Into<String>) -> Self {
        Self::NotATemplate {
            directive: directive.into(),
        }
    }
}
