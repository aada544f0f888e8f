use metaform_parser::{ParseError, Span};
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Identifier '{name}' is not a declared context or parameter at {span:?}")]
    UnboundIdentifier { name: String, span: Span },

    #[error("Context '{name}' is not available to this expression at {span:?}")]
    MissingContextBinding { name: String, span: Span },

    #[error("Type error at {span:?}: {message}")]
    TypeError { message: String, span: Span },

    #[error("Invalid operands for operator {operator} at {span:?}: {details}")]
    InvalidOperands {
        operator: String,
        details: String,
        span: Span,
    },

    #[error("Division by zero at {span:?}")]
    DivisionByZero { span: Span },

    #[error("Unknown method '{method}' on {receiver} at {span:?}")]
    UnknownMethod {
        method: String,
        receiver: String,
        span: Span,
    },

    #[error("Value of type {type_name} is not callable at {span:?}")]
    NotCallable { type_name: String, span: Span },

    #[error("'{method}' expects {expected} argument(s), got {found} at {span:?}")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl EvalError {
    /// The expression read a name that the descriptor did not bind
    pub fn is_missing_binding(&self) -> bool {
        matches!(
            self,
            EvalError::UnboundIdentifier { .. } | EvalError::MissingContextBinding { .. }
        )
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        EvalError::TypeError {
            message: message.into(),
            span,
        }
    }
}
