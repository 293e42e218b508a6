//! Collaborator registries injected into the evaluator.
//!
//! The evaluator never owns the meta-attribute catalog or the set of
//! known definitions; both are passed in behind traits so the core does
//! not depend on a concrete enumeration.

use crate::definition::Definition;
use std::collections::BTreeMap;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Attribute registry
// ══════════════════════════════════════════════════════════════════════════════

/// Descriptor for one meta-attribute.
///
/// Meta-attributes are reserved attribute names accepted by every
/// definition; their semantics propagate to nested content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaAttribute {
    pub name: &'static str,
    pub doc: &'static str,
}

/// Answers "is this name a recognized meta-attribute" — used for
/// validation, never for evaluation.
pub trait AttributeRegistry {
    /// The descriptor for `name`, if it is a meta-attribute.
    fn meta_attribute(&self, name: &str) -> Option<&MetaAttribute>;

    /// Whether `name` is a recognized meta-attribute.
    fn is_meta_attribute(&self, name: &str) -> bool {
        self.meta_attribute(name).is_some()
    }
}

const META_ATTRIBUTES: &[MetaAttribute] = &[
    MetaAttribute {
        name: "alias",
        doc: "an alternate name this resource can be referenced by",
    },
    MetaAttribute {
        name: "before",
        doc: "apply this resource before the referenced resource",
    },
    MetaAttribute {
        name: "loglevel",
        doc: "the log level for messages about this resource",
    },
    MetaAttribute {
        name: "noop",
        doc: "evaluate without effecting any real change",
    },
    MetaAttribute {
        name: "notify",
        doc: "notify the referenced resource after applying this one",
    },
    MetaAttribute {
        name: "require",
        doc: "apply the referenced resource before this one",
    },
    MetaAttribute {
        name: "schedule",
        doc: "restrict when this resource may be applied",
    },
    MetaAttribute {
        name: "subscribe",
        doc: "re-apply this resource when the referenced one changes",
    },
    MetaAttribute {
        name: "tag",
        doc: "add extra tags to this resource",
    },
];

/// The built-in meta-attribute catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreRegistry;

impl AttributeRegistry for CoreRegistry {
    fn meta_attribute(&self, name: &str) -> Option<&MetaAttribute> {
        META_ATTRIBUTES.iter().find(|meta| meta.name == name)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Definition resolver
// ══════════════════════════════════════════════════════════════════════════════

/// Given a namespace and a name, returns the definition for that name.
pub trait DefinitionResolver {
    fn find_definition(&self, namespace: &str, name: &str) -> Option<Arc<Definition>>;
}

/// The concrete definition store, keyed by fully-qualified name.
///
/// Lookup tries the requesting namespace first, then walks enclosing
/// namespaces up to the root: from namespace `a::b`, the name `serv`
/// is tried as `a::b::serv`, `a::serv`, `serv`.
#[derive(Debug, Default)]
pub struct Namespace {
    definitions: BTreeMap<String, Arc<Definition>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its fully-qualified name.
    /// Returns the shared handle call sites resolve to.
    pub fn insert(&mut self, definition: Definition) -> Arc<Definition> {
        let shared = Arc::new(definition);
        self.insert_shared(shared.clone());
        shared
    }

    /// Register an already-shared definition, e.g. under an alias fqname.
    pub fn insert_shared(&mut self, definition: Arc<Definition>) {
        self.definitions
            .insert(definition.fqname().to_string(), definition);
    }

    /// Register a shared definition under an explicit name.
    pub fn insert_alias(&mut self, name: impl Into<String>, definition: Arc<Definition>) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionResolver for Namespace {
    fn find_definition(&self, namespace: &str, name: &str) -> Option<Arc<Definition>> {
        let mut ns = namespace;
        loop {
            let fqname = if ns.is_empty() {
                name.to_string()
            } else {
                format!("{ns}::{name}")
            };
            if let Some(definition) = self.definitions.get(&fqname) {
                return Some(definition.clone());
            }
            if ns.is_empty() {
                return None;
            }
            ns = match ns.rfind("::") {
                Some(idx) => &ns[..idx],
                None => "",
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_types::ast::{DefinitionDecl, Ident};
    use rill_types::{CompileErrors, Span};

    fn decl(name: &str) -> DefinitionDecl {
        DefinitionDecl {
            name: Ident::new(name, Span::point(1, 1)),
            keyword: "define".into(),
            params: Vec::new(),
            parent: None,
            exported: false,
            body: None,
            span: Span::point(1, 1),
        }
    }

    fn definition(name: &str, namespace: &str) -> Definition {
        let mut diagnostics = CompileErrors::empty();
        Definition::new(&decl(name), namespace, &CoreRegistry, &mut diagnostics).unwrap()
    }

    #[test]
    fn test_core_registry_knows_require() {
        let registry = CoreRegistry;
        assert!(registry.is_meta_attribute("require"));
        assert!(registry.is_meta_attribute("notify"));
        assert!(!registry.is_meta_attribute("port"));
        assert_eq!(registry.meta_attribute("require").map(|m| m.name), Some("require"));
    }

    #[test]
    fn test_namespace_exact_lookup() {
        let mut ns = Namespace::new();
        ns.insert(definition("serv", "site"));
        assert!(ns.find_definition("site", "serv").is_some());
        assert!(ns.find_definition("", "site::serv").is_some());
        assert!(ns.find_definition("", "serv").is_none());
    }

    #[test]
    fn test_namespace_fallthrough_to_root() {
        let mut ns = Namespace::new();
        ns.insert(definition("serv", ""));
        // From a nested namespace, the root definition is still found.
        assert!(ns.find_definition("site::frontend", "serv").is_some());
    }

    #[test]
    fn test_namespace_prefers_most_specific() {
        let mut ns = Namespace::new();
        let root = ns.insert(definition("serv", ""));
        let nested = ns.insert(definition("serv", "site"));
        let found = ns.find_definition("site", "serv").unwrap();
        assert!(Arc::ptr_eq(&found, &nested));
        assert!(!Arc::ptr_eq(&found, &root));
    }
}
