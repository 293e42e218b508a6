//! Definition — the reusable template instantiated at call sites.
//!
//! A [`Definition`] is built once from its parsed declaration when the
//! configuration tree is assembled, and is immutable afterwards except
//! for the lazily-resolved parent link. One definition is shared (via
//! [`Arc`]) by every call site that instantiates it within a compile.

use crate::error::{EvalError, EvalResult};
use crate::registry::{AttributeRegistry, DefinitionResolver};
use rill_types::ast::{Block, DefinitionDecl, Expr};
use rill_types::{CompileErrors, ErrorCode, RillError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Construction-time defects in a definition declaration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Two formal parameters share a name.
    #[error("duplicate formal parameter {parameter} on {type_name}")]
    DuplicateFormalParameter {
        parameter: String,
        type_name: String,
    },

    /// A formal parameter collides with a meta-attribute and carries no
    /// default, leaving the override intent ambiguous.
    #[error("{parameter} is a meta-attribute; please choose another name")]
    MetaAttributeNameConflict { parameter: String },

    /// An `inherits` clause names the definition itself.
    #[error("parent of {type_name} must have a dissimilar name")]
    SelfInheritance { type_name: String },
}

/// A formal parameter: name plus optional default expression.
///
/// The default is kept unevaluated; it is evaluated per call, in the
/// instance scope, never memoized on the definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameter {
    pub name: String,
    pub default: Option<Expr>,
}

/// The lazily-resolved parent link.
///
/// Starts unset or pending a name; transitions to resolved at most once
/// for the definition's lifetime. Concurrent compiles over a shared
/// definition set may race the first resolution — [`OnceLock`] makes the
/// publication a compare-and-set, so all racers observe one winner.
#[derive(Debug)]
struct ParentLink {
    name: Option<String>,
    resolved: OnceLock<Arc<Definition>>,
}

/// Observable state of a definition's parent link.
#[derive(Debug)]
pub enum ParentState<'a> {
    /// No `inherits` clause.
    Unset,
    /// Named, not yet resolved.
    Pending(&'a str),
    /// Resolved and cached.
    Resolved(&'a Arc<Definition>),
}

/// A reusable, named template that expands into scoped state when
/// instantiated at a call site.
#[derive(Debug)]
pub struct Definition {
    type_name: String,
    keyword: String,
    namespace: String,
    fqname: String,
    exported_by_default: bool,
    params: Vec<FormalParameter>,
    body: Option<Block>,
    parent: ParentLink,
}

impl Definition {
    /// Build a definition from its parsed declaration, validating the
    /// formal-parameter list against the meta-attribute registry.
    ///
    /// A formal that shadows a meta-attribute without a default is
    /// rejected; with a default it is accepted and recorded once in
    /// `diagnostics` as inheriting the meta-attribute's semantics to all
    /// contents of the definition's instances.
    pub fn new(
        decl: &DefinitionDecl,
        namespace: &str,
        registry: &dyn AttributeRegistry,
        diagnostics: &mut CompileErrors,
    ) -> Result<Self, DefinitionError> {
        let type_name = decl.name.name.clone();

        let mut params: Vec<FormalParameter> = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            if params.iter().any(|p| p.name == param.name.name) {
                return Err(DefinitionError::DuplicateFormalParameter {
                    parameter: param.name.name.clone(),
                    type_name,
                });
            }
            if registry.is_meta_attribute(&param.name.name) {
                if param.default.is_none() {
                    return Err(DefinitionError::MetaAttributeNameConflict {
                        parameter: param.name.name.clone(),
                    });
                }
                diagnostics.push_warning(
                    RillError::warning(
                        ErrorCode::META_ATTRIBUTE_INHERITS,
                        format!(
                            "{} is a meta-attribute; this value will inherit to all contents of {} instances",
                            param.name.name, type_name
                        ),
                        param.span,
                    )
                    .with_context(type_name.clone()),
                );
            }
            params.push(FormalParameter {
                name: param.name.name.clone(),
                default: param.default.clone(),
            });
        }

        // No self-inheritance, checked at assignment time. Resolution
        // re-checks by identity in case of namespace aliasing.
        if let Some(parent) = &decl.parent {
            if parent.name == type_name {
                return Err(DefinitionError::SelfInheritance { type_name });
            }
        }

        let fqname = if namespace.is_empty() {
            type_name.clone()
        } else {
            format!("{namespace}::{type_name}")
        };

        Ok(Self {
            type_name,
            keyword: decl.keyword.clone(),
            namespace: namespace.to_string(),
            fqname,
            exported_by_default: decl.exported,
            params,
            body: decl.body.clone(),
            parent: ParentLink {
                name: decl.parent.as_ref().map(|p| p.name.clone()),
                resolved: OnceLock::new(),
            },
        })
    }

    // ── Identity ─────────────────────────────────────────────────────────

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fqname(&self) -> &str {
        &self.fqname
    }

    pub fn exported_by_default(&self) -> bool {
        self.exported_by_default
    }

    // ── Formal parameters & body ─────────────────────────────────────────

    /// Formal parameters in declaration order.
    pub fn formal_parameters(&self) -> &[FormalParameter] {
        &self.params
    }

    /// Whether `name` is a declared formal parameter.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Check whether an attribute name is accepted at call sites:
    /// declared formals, the literal `name`, and registered
    /// meta-attributes. The parent chain is not consulted.
    pub fn valid_attribute(&self, name: &str, registry: &dyn AttributeRegistry) -> bool {
        self.has_parameter(name) || name == "name" || registry.is_meta_attribute(name)
    }

    /// The body evaluated for each instance; `None` is a no-op definition.
    pub fn body(&self) -> Option<&Block> {
        self.body.as_ref()
    }

    // ── Parent link ──────────────────────────────────────────────────────

    /// The current state of the parent link.
    pub fn parent_state(&self) -> ParentState<'_> {
        match self.parent.resolved.get() {
            Some(resolved) => ParentState::Resolved(resolved),
            None => match &self.parent.name {
                Some(name) => ParentState::Pending(name),
                None => ParentState::Unset,
            },
        }
    }

    /// Resolve the parent link through `resolver`, caching the result.
    ///
    /// Yields `None` without error when there is no parent. Resolution
    /// happens at most once; later calls return the cached reference and
    /// the resolver is not consulted again.
    pub fn resolve_parent(
        self: &Arc<Self>,
        resolver: &dyn DefinitionResolver,
    ) -> EvalResult<Option<Arc<Definition>>> {
        let name = match &self.parent.name {
            None => return Ok(None),
            Some(name) => name,
        };
        if let Some(cached) = self.parent.resolved.get() {
            return Ok(Some(cached.clone()));
        }

        let found = resolver.find_definition(&self.namespace, name).ok_or_else(|| {
            EvalError::ParentNotFound {
                type_name: self.type_name.clone(),
                parent: name.clone(),
            }
        })?;

        // A namespace alias may spell this definition's own name
        // differently; re-check by identity.
        if Arc::ptr_eq(&found, self) {
            return Err(EvalError::SelfInheritance {
                type_name: self.type_name.clone(),
            });
        }

        Ok(Some(self.parent.resolved.get_or_init(|| found).clone()))
    }

    /// Whether `other` appears in this definition's resolved parent
    /// chain. Unresolved links are not resolved by this query.
    pub fn is_child_of(&self, other: &Arc<Definition>) -> bool {
        let mut current = self.parent.resolved.get();
        while let Some(parent) = current {
            if Arc::ptr_eq(parent, other) {
                return true;
            }
            current = parent.parent.resolved.get();
        }
        false
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CoreRegistry, Namespace};
    use rill_types::ast::{Expr, ExprKind, Ident, ParamDecl};
    use rill_types::Span;

    fn sp() -> Span {
        Span::point(1, 1)
    }

    fn param(name: &str, default: Option<Expr>) -> ParamDecl {
        ParamDecl {
            name: Ident::new(name, sp()),
            default,
            span: sp(),
        }
    }

    fn string_expr(value: &str) -> Expr {
        Expr::new(ExprKind::StringLit(value.into()), sp())
    }

    fn decl(name: &str, params: Vec<ParamDecl>, parent: Option<&str>) -> DefinitionDecl {
        DefinitionDecl {
            name: Ident::new(name, sp()),
            keyword: "define".into(),
            params,
            parent: parent.map(|p| Ident::new(p, sp())),
            exported: false,
            body: None,
            span: sp(),
        }
    }

    fn build(decl: &DefinitionDecl, namespace: &str) -> Result<Definition, DefinitionError> {
        let mut diagnostics = CompileErrors::empty();
        Definition::new(decl, namespace, &CoreRegistry, &mut diagnostics)
    }

    #[test]
    fn test_fqname_and_display() {
        let def = build(&decl("web_server", vec![], None), "site").unwrap();
        assert_eq!(def.fqname(), "site::web_server");
        assert_eq!(def.to_string(), "site::web_server");

        let root = build(&decl("web_server", vec![], None), "").unwrap();
        assert_eq!(root.fqname(), "web_server");
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let d = decl(
            "web_server",
            vec![param("port", None), param("port", None)],
            None,
        );
        assert_eq!(
            build(&d, "").unwrap_err(),
            DefinitionError::DuplicateFormalParameter {
                parameter: "port".into(),
                type_name: "web_server".into(),
            }
        );
    }

    #[test]
    fn test_meta_attribute_without_default_rejected() {
        let d = decl("web_server", vec![param("require", None)], None);
        assert_eq!(
            build(&d, "").unwrap_err(),
            DefinitionError::MetaAttributeNameConflict {
                parameter: "require".into(),
            }
        );
    }

    #[test]
    fn test_meta_attribute_with_default_warns_once() {
        let d = decl(
            "web_server",
            vec![param("require", Some(string_expr("none")))],
            None,
        );
        let mut diagnostics = CompileErrors::empty();
        let def = Definition::new(&d, "", &CoreRegistry, &mut diagnostics).unwrap();
        assert!(def.has_parameter("require"));
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.total_warnings, 1);
        assert_eq!(
            diagnostics.warnings[0].code,
            ErrorCode::META_ATTRIBUTE_INHERITS
        );
    }

    #[test]
    fn test_self_inheritance_rejected_at_assignment() {
        let d = decl("web_server", vec![], Some("web_server"));
        assert_eq!(
            build(&d, "site").unwrap_err(),
            DefinitionError::SelfInheritance {
                type_name: "web_server".into(),
            }
        );
    }

    #[test]
    fn test_valid_attribute() {
        let d = decl("web_server", vec![param("port", None)], None);
        let def = build(&d, "").unwrap();
        assert!(def.valid_attribute("port", &CoreRegistry));
        assert!(def.valid_attribute("name", &CoreRegistry));
        assert!(def.valid_attribute("require", &CoreRegistry));
        assert!(!def.valid_attribute("color", &CoreRegistry));
    }

    #[test]
    fn test_parent_state_transitions() {
        let mut ns = Namespace::new();
        let base = ns.insert(build(&decl("base", vec![], None), "").unwrap());
        let child = Arc::new(build(&decl("child", vec![], Some("base")), "").unwrap());

        assert!(matches!(child.parent_state(), ParentState::Pending("base")));
        let resolved = child.resolve_parent(&ns).unwrap().unwrap();
        assert!(Arc::ptr_eq(&resolved, &base));
        assert!(matches!(child.parent_state(), ParentState::Resolved(_)));

        let orphan = Arc::new(build(&decl("orphan", vec![], None), "").unwrap());
        assert!(matches!(orphan.parent_state(), ParentState::Unset));
        assert!(orphan.resolve_parent(&ns).unwrap().is_none());
    }

    #[test]
    fn test_child_of_walks_resolved_chain() {
        let mut ns = Namespace::new();
        let base = ns.insert(build(&decl("base", vec![], None), "").unwrap());
        let mid = ns.insert(build(&decl("mid", vec![], Some("base")), "").unwrap());
        let leaf = Arc::new(build(&decl("leaf", vec![], Some("mid")), "").unwrap());

        // Nothing resolved yet: no ancestry visible.
        assert!(!leaf.is_child_of(&base));

        mid.resolve_parent(&ns).unwrap();
        leaf.resolve_parent(&ns).unwrap();
        assert!(leaf.is_child_of(&mid));
        assert!(leaf.is_child_of(&base));
        assert!(!base.is_child_of(&leaf));
    }
}
