//! Evaluation-time error types for the Rill evaluator.

use crate::scope::ScopeError;
use rill_types::{ErrorCode, RillError, Span};
use thiserror::Error;

/// Errors raised while instantiating a definition or evaluating its body.
///
/// Every instantiation error is fatal to the current call and carries
/// enough identity to attribute the failure to a source location.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// A required formal parameter was neither supplied nor defaulted.
    #[error("must pass {parameter} to {title} of type {type_name}")]
    MissingArgument {
        parameter: String,
        title: String,
        type_name: String,
    },

    /// A call site supplied an attribute the definition does not accept.
    #[error("{type_name} does not accept attribute {attribute}")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },

    /// The variable store rejected a binding; the native error is carried
    /// as the cause rather than propagated as-is.
    #[error("could not set {attribute}: {cause}")]
    AssignmentFailed { attribute: String, cause: String },

    /// The namespace resolver yielded nothing for a parent name.
    #[error("could not find parent {parent} of {type_name}")]
    ParentNotFound { type_name: String, parent: String },

    /// A parent link resolved back to the definition itself.
    #[error("parent of {type_name} must have a dissimilar name")]
    SelfInheritance { type_name: String },

    /// Unknown variable inside an expression.
    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    /// A value had the wrong type for the position it was used in.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A scope operation failed outside of argument binding.
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

impl EvalError {
    /// The structured error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingArgument { .. } => ErrorCode::MISSING_ARGUMENT,
            Self::UnknownAttribute { .. } => ErrorCode::UNKNOWN_ATTRIBUTE,
            Self::AssignmentFailed { .. } => ErrorCode::ASSIGNMENT_FAILED,
            Self::ParentNotFound { .. } => ErrorCode::PARENT_NOT_FOUND,
            Self::SelfInheritance { .. } => ErrorCode::SELF_INHERITANCE,
            Self::UndefinedVariable(_) => ErrorCode::UNDEFINED_VARIABLE,
            Self::TypeMismatch(_) => ErrorCode::TYPE_MISMATCH,
            Self::Scope(_) => ErrorCode::REBINDING,
        }
    }

    /// Convert into a structured diagnostic attributed to `span`.
    pub fn into_diagnostic(self, span: Span) -> RillError {
        let context = match &self {
            Self::MissingArgument { type_name, .. }
            | Self::UnknownAttribute { type_name, .. }
            | Self::ParentNotFound { type_name, .. }
            | Self::SelfInheritance { type_name } => Some(type_name.clone()),
            _ => None,
        };
        let error = RillError::new(self.code(), self.to_string(), span);
        match context {
            Some(context) => error.with_context(context),
            None => error,
        }
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
