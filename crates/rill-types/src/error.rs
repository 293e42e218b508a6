use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors reported before fail-fast.
pub const MAX_ERRORS: usize = 20;

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Construction-time defects in a definition itself.
    Definition,
    /// Per-call defects at an instantiation site.
    Instantiation,
    /// Failures inside expression evaluation.
    Expression,
}

/// Numeric error code (E100–E399).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Definition errors (E100–E199) ──
    pub const DUPLICATE_PARAMETER: Self = Self(100);
    pub const META_ATTRIBUTE_CONFLICT: Self = Self(101);
    pub const SELF_INHERITANCE: Self = Self(102);
    /// Warning: a defaulted formal parameter shadows a meta-attribute.
    pub const META_ATTRIBUTE_INHERITS: Self = Self(110);

    // ── Instantiation errors (E200–E299) ──
    pub const MISSING_ARGUMENT: Self = Self(200);
    pub const UNKNOWN_ATTRIBUTE: Self = Self(201);
    pub const ASSIGNMENT_FAILED: Self = Self(202);
    pub const PARENT_NOT_FOUND: Self = Self(203);

    // ── Expression errors (E300–E399) ──
    pub const UNDEFINED_VARIABLE: Self = Self(300);
    pub const TYPE_MISMATCH: Self = Self(301);
    pub const REBINDING: Self = Self(302);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Definition,
            200..=299 => ErrorCategory::Instantiation,
            _ => ErrorCategory::Expression,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured Rill compiler diagnostic.
///
/// Tooling renders these — it must not parse free-form strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RillError {
    /// Error code (e.g., E200).
    pub code: ErrorCode,
    /// Error severity.
    pub severity: Severity,
    /// Error category (derived from code).
    pub category: ErrorCategory,
    /// Human-readable message.
    pub message: String,
    /// Source location of the offending declaration or call site.
    #[serde(flatten)]
    pub span: Span,
    /// The definition or instance the diagnostic is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl RillError {
    /// Create a new error diagnostic.
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            context: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(code, message, span)
        }
    }

    /// Attach the definition or instance name the diagnostic belongs to.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for RillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.span, self.code, self.message)
    }
}

impl std::error::Error for RillError {}

/// Accumulated diagnostics for one compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<RillError>,
    pub warnings: Vec<RillError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            total_errors: 0,
            total_warnings: 0,
        }
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the MAX_ERRORS limit.
    pub fn push_error(&mut self, error: RillError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Add a warning.
    pub fn push_warning(&mut self, warning: RillError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }
}

impl Default for CompileErrors {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::DUPLICATE_PARAMETER.category(),
            ErrorCategory::Definition
        );
        assert_eq!(
            ErrorCode::MISSING_ARGUMENT.category(),
            ErrorCategory::Instantiation
        );
        assert_eq!(
            ErrorCode::UNDEFINED_VARIABLE.category(),
            ErrorCategory::Expression
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::MISSING_ARGUMENT), "E200");
        assert_eq!(format!("{}", ErrorCode::META_ATTRIBUTE_INHERITS), "E110");
    }

    #[test]
    fn test_error_creation() {
        let err = RillError::new(
            ErrorCode::UNKNOWN_ATTRIBUTE,
            "web_server does not accept attribute color",
            Span::new(12, 5, 12, 22),
        )
        .with_context("web_server");
        assert_eq!(err.code, ErrorCode::UNKNOWN_ATTRIBUTE);
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.category, ErrorCategory::Instantiation);
        assert_eq!(err.context.as_deref(), Some("web_server"));
    }

    #[test]
    fn test_warning_severity() {
        let warn = RillError::warning(
            ErrorCode::META_ATTRIBUTE_INHERITS,
            "require is a meta-attribute",
            Span::point(3, 9),
        );
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.category, ErrorCategory::Definition);
    }

    #[test]
    fn test_error_json_serialization() {
        let err = RillError::new(
            ErrorCode::MISSING_ARGUMENT,
            "must pass port to main of type web_server",
            Span::new(12, 5, 12, 22),
        )
        .with_context("web_server");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\""));
        assert!(json.contains("\"message\""));
        assert!(json.contains("\"start_line\""));
        assert!(json.contains("\"context\""));

        // Round-trip
        let deserialized: RillError = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.code, err.code);
        assert_eq!(deserialized.message, err.message);
    }

    #[test]
    fn test_compile_errors_max_limit() {
        let mut errs = CompileErrors::empty();
        for i in 0..25 {
            errs.push_error(RillError::new(
                ErrorCode::UNKNOWN_ATTRIBUTE,
                format!("error {i}"),
                Span::point(i as u32 + 1, 1),
            ));
        }
        // Only 20 stored, but total count is 25
        assert_eq!(errs.errors.len(), 20);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.has_errors());
    }

    #[test]
    fn test_compile_errors_warnings_do_not_count_as_errors() {
        let mut errs = CompileErrors::empty();
        errs.push_warning(RillError::warning(
            ErrorCode::META_ATTRIBUTE_INHERITS,
            "require is a meta-attribute",
            Span::point(1, 1),
        ));
        assert!(!errs.has_errors());
        assert_eq!(errs.total_warnings, 1);
    }
}
