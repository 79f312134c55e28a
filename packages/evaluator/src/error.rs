use tendril_parser::ParseError;
use tendril_reactivity::CallError;
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error in `{expression}`: {message}")]
    Syntax { expression: String, message: String },

    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("Invalid assignment target `{target}`")]
    InvalidAssignment { target: String },

    #[error("The {evaluator} evaluator cannot evaluate `{expression}`")]
    Unsupported { evaluator: String, expression: String },

    #[error("Uncaught (in promise) {reason}")]
    Rejected { reason: String },

    #[error(transparent)]
    Call(#[from] CallError),
}

impl EvalError {
    pub fn syntax(expression: &str, err: &ParseError) -> Self {
        Self::Syntax {
            expression: expression.to_string(),
            message: err.to_string(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub fn unsupported(evaluator: &str, expression: &str) -> Self {
        Self::Unsupported {
            evaluator: evaluator.to_string(),
            expression: expression.to_string(),
        }
    }
}

/// Errors crossing a function-call boundary travel as `CallError`
impl From<EvalError> for CallError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Call(inner) => inner,
            EvalError::Type { message } => CallError::TypeError { message },
            other => CallError::thrown(other.to_string()),
        }
    }
}
