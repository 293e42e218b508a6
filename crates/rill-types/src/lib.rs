//! Shared types for the Rill compiler.
//!
//! This crate defines the AST node types, source spans, runtime values,
//! and structured diagnostics used across all compiler stages.

mod error;
mod span;
mod value;
pub mod ast;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, RillError, Severity, MAX_ERRORS};
pub use span::Span;
pub use value::Value;
