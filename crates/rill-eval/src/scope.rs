//! The scope tree: lexical binding environments for one compile.
//!
//! Scopes form a tree rooted at the top scope. Variable lookup walks
//! from a scope outward through its ancestors; bindings are immutable
//! once set within a scope. All nodes are owned by the [`ScopeTree`]
//! (the compile context) and addressed by [`ScopeId`] — a scope never
//! owns its parent and a definition never owns a scope.

use crate::definition::Definition;
use rill_types::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Errors from scope-level variable operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Variables cannot be rebound within the same scope.
    #[error("variable {0} is already bound in this scope")]
    AlreadyBound(String),
}

/// Handle to one scope inside a [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Context metadata copied onto a scope when it is created.
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
    /// The definition type this scope was created for ("" at the root).
    pub type_name: String,
    /// The keyword the definition was declared with.
    pub keyword: String,
    /// Namespace used for definition lookups from inside this scope.
    pub namespace: String,
    /// The instance title, when the scope belongs to an instantiation.
    pub name: Option<String>,
}

#[derive(Debug)]
struct ScopeNode {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    context: ScopeContext,
    vars: BTreeMap<String, Value>,
    tags: BTreeSet<String>,
    exported: bool,
    /// Back-reference to the definition that produced this scope.
    /// Weak: lookup only, never extends the definition's lifetime.
    source: Weak<Definition>,
}

impl ScopeNode {
    fn new(parent: Option<ScopeId>, context: ScopeContext) -> Self {
        Self {
            parent,
            children: Vec::new(),
            context,
            vars: BTreeMap::new(),
            tags: BTreeSet::new(),
            exported: false,
            source: Weak::new(),
        }
    }
}

/// Arena of scopes for one compile, rooted at the top scope.
#[derive(Debug)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl ScopeTree {
    /// Create a tree containing only the root scope.
    pub fn new() -> Self {
        Self {
            nodes: vec![ScopeNode::new(None, ScopeContext::default())],
        }
    }

    /// The root scope.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Create a child of `parent` carrying `context`.
    pub fn new_child(&mut self, parent: ScopeId, context: ScopeContext) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode::new(Some(parent), context));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The parent of `scope`, or `None` at the root.
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.nodes[scope.0].parent
    }

    /// Child scopes of `scope`, in creation order.
    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        &self.nodes[scope.0].children
    }

    /// The context metadata `scope` was created with.
    pub fn context(&self, scope: ScopeId) -> &ScopeContext {
        &self.nodes[scope.0].context
    }

    // ── Variables ────────────────────────────────────────────────────────

    /// Bind a variable in `scope`. Fails if the name is already bound
    /// there; bindings in ancestor scopes are shadowed, not rejected.
    pub fn set_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
    ) -> Result<(), ScopeError> {
        let vars = &mut self.nodes[scope.0].vars;
        if vars.contains_key(name) {
            return Err(ScopeError::AlreadyBound(name.to_string()));
        }
        vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Look up a variable, searching from `scope` outward.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            if let Some(value) = node.vars.get(name) {
                return Some(value);
            }
            current = node.parent;
        }
        None
    }

    // ── Tags ─────────────────────────────────────────────────────────────

    /// Add a tag to `scope`.
    pub fn tag(&mut self, scope: ScopeId, value: &str) {
        self.nodes[scope.0].tags.insert(value.to_string());
    }

    /// All tags visible from `scope`: its own plus every ancestor's.
    pub fn tags(&self, scope: ScopeId) -> BTreeSet<String> {
        let mut collected = BTreeSet::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            collected.extend(node.tags.iter().cloned());
            current = node.parent;
        }
        collected
    }

    // ── Export flag ──────────────────────────────────────────────────────

    /// Whether `scope` is exported.
    pub fn is_exported(&self, scope: ScopeId) -> bool {
        self.nodes[scope.0].exported
    }

    /// Set the exported flag on `scope`.
    pub fn set_exported(&mut self, scope: ScopeId, exported: bool) {
        self.nodes[scope.0].exported = exported;
    }

    // ── Definition back-reference ────────────────────────────────────────

    /// Record which definition produced `scope`.
    pub fn set_source(&mut self, scope: ScopeId, definition: Weak<Definition>) {
        self.nodes[scope.0].source = definition;
    }

    /// The definition that produced `scope`, if it is still alive.
    pub fn source(&self, scope: ScopeId) -> Option<Arc<Definition>> {
        self.nodes[scope.0].source.upgrade()
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_falls_through_to_ancestors() {
        let mut tree = ScopeTree::new();
        tree.set_variable(tree.root(), "port", Value::Number(80.0))
            .unwrap();
        let child = tree.new_child(tree.root(), ScopeContext::default());
        let grandchild = tree.new_child(child, ScopeContext::default());
        assert_eq!(tree.lookup(grandchild, "port"), Some(&Value::Number(80.0)));
        assert_eq!(tree.lookup(grandchild, "missing"), None);
    }

    #[test]
    fn test_shadowing_is_allowed_rebinding_is_not() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.set_variable(root, "name", Value::from("outer")).unwrap();
        let child = tree.new_child(root, ScopeContext::default());
        tree.set_variable(child, "name", Value::from("inner")).unwrap();
        assert_eq!(tree.lookup(child, "name"), Some(&Value::from("inner")));
        assert_eq!(tree.lookup(root, "name"), Some(&Value::from("outer")));

        let err = tree.set_variable(child, "name", Value::from("again"));
        assert_eq!(err, Err(ScopeError::AlreadyBound("name".into())));
    }

    #[test]
    fn test_tags_include_ancestors() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.tag(root, "base");
        let child = tree.new_child(root, ScopeContext::default());
        tree.tag(child, "web_server");
        let tags = tree.tags(child);
        assert!(tags.contains("base"));
        assert!(tags.contains("web_server"));
        assert!(!tree.tags(root).contains("web_server"));
    }

    #[test]
    fn test_exported_flag_is_per_scope() {
        let mut tree = ScopeTree::new();
        let child = tree.new_child(tree.root(), ScopeContext::default());
        assert!(!tree.is_exported(child));
        tree.set_exported(child, true);
        assert!(tree.is_exported(child));
        assert!(!tree.is_exported(tree.root()));
    }

    #[test]
    fn test_context_and_parenting() {
        let mut tree = ScopeTree::new();
        let context = ScopeContext {
            type_name: "web_server".into(),
            keyword: "define".into(),
            namespace: "site".into(),
            name: Some("main".into()),
        };
        let child = tree.new_child(tree.root(), context);
        assert_eq!(tree.parent(child), Some(tree.root()));
        assert_eq!(tree.children(tree.root()), &[child]);
        assert_eq!(tree.context(child).type_name, "web_server");
        assert_eq!(tree.context(child).name.as_deref(), Some("main"));
    }
}
