use thiserror::Error;

pub type CallResult<T> = Result<T, CallError>;

/// Failure raised while calling a function value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("{callee} is not a function")]
    NotCallable { callee: String },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("{message}")]
    Thrown { message: String },

    #[error("Maximum call depth of {limit} exceeded")]
    DepthExceeded { limit: usize },
}

impl CallError {
    pub fn not_callable(callee: impl Into<String>) -> Self {
        Self::NotCallable {
            callee: callee.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::RangeError {
            message: message.into(),
        }
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown {
            message: message.into(),
        }
    }
}
