//! Definition instantiation: one call site becomes one instance scope.
//!
//! An instantiation is a strictly sequential pass with no suspension:
//! resolve the parent link, compute the effective name, materialize the
//! instance scope (context, export flag, tags), bind arguments, then
//! evaluate the body against the new scope. Any failure before body
//! evaluation aborts the call; bindings already made stay in the unused
//! scope and produce no externally visible result.

use crate::definition::Definition;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::scope::{ScopeContext, ScopeId};
use rill_types::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One instantiation request — ephemeral, one per call site.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    /// The call site's scope; becomes the instance scope's parent.
    pub scope: ScopeId,
    /// Caller-supplied instance identifier.
    pub title: String,
    /// Actual arguments supplied at the call site.
    pub arguments: BTreeMap<String, Value>,
    /// Explicit export override for this instance.
    pub exported: bool,
}

/// True when `s` is non-empty and contains only word characters
/// (ASCII letters, digits, underscore).
pub(crate) fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Evaluator<'_> {
    /// Instantiate `definition` for one call site.
    ///
    /// Returns the body's result, or `None` for a no-op definition.
    /// The instance scope remains reachable afterwards only through
    /// whatever the body registered into the catalog.
    pub fn instantiate(
        &mut self,
        definition: &Arc<Definition>,
        request: EvalRequest,
    ) -> EvalResult<Option<Value>> {
        definition.resolve_parent(self.resolver())?;

        // The instance's effective name: the `name` argument if
        // supplied, else the title.
        let name = request
            .arguments
            .get("name")
            .cloned()
            .unwrap_or_else(|| Value::String(request.title.clone()));

        let scope = self.materialize_scope(definition, &request, &name);
        self.bind_arguments(definition, &request, scope, &name)?;

        match definition.body() {
            Some(body) => self.eval_block(scope, body).map(Some),
            None => Ok(None),
        }
    }

    /// Build the instance scope: a child of the call site's scope with
    /// the definition's context, the export rule applied, and tags for
    /// the type, name, and title.
    fn materialize_scope(
        &mut self,
        definition: &Arc<Definition>,
        request: &EvalRequest,
        name: &Value,
    ) -> ScopeId {
        let context = ScopeContext {
            type_name: definition.type_name().to_string(),
            keyword: definition.keyword().to_string(),
            namespace: definition.namespace().to_string(),
            name: Some(request.title.clone()),
        };
        let scope = self.scopes.new_child(request.scope, context);
        self.scopes.set_source(scope, Arc::downgrade(definition));

        // Export propagates downward: an instance is exported when the
        // call site says so, the definition defaults to it, or the
        // origin scope is itself exported.
        if request.exported
            || definition.exported_by_default()
            || self.scopes.is_exported(request.scope)
        {
            self.scopes.set_exported(scope, true);
        }

        if !definition.type_name().is_empty() {
            self.scopes.tag(scope, definition.type_name());
        }
        // Name and title tags are skipped, not rejected, when they are
        // empty or contain non-word characters.
        if let Value::String(name) = name {
            if is_word(name) {
                self.scopes.tag(scope, name);
            }
        }
        if is_word(&request.title) {
            self.scopes.tag(scope, &request.title);
        }
        scope
    }

    /// Reconcile actual arguments against the formal-parameter list and
    /// bind everything into the instance scope.
    ///
    /// `title` and `name` are seeded first (unless the caller supplied
    /// them, or the definition declares them as formals — then the
    /// defaults pass owns them), so default expressions can read both.
    /// Defaults are evaluated per call in declaration order, each bound
    /// immediately so a later default can read an earlier one. Actual
    /// arguments are validated last and bound as scope variables.
    fn bind_arguments(
        &mut self,
        definition: &Arc<Definition>,
        request: &EvalRequest,
        scope: ScopeId,
        name: &Value,
    ) -> EvalResult<()> {
        if !request.arguments.contains_key("title") && !definition.has_parameter("title") {
            self.bind(scope, "title", Value::String(request.title.clone()))?;
        }
        if !request.arguments.contains_key("name") && !definition.has_parameter("name") {
            self.bind(scope, "name", name.clone())?;
        }

        for param in definition.formal_parameters() {
            if request.arguments.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    let value = self.eval_expr(scope, default)?;
                    self.bind(scope, &param.name, value)?;
                }
                None => {
                    return Err(EvalError::MissingArgument {
                        parameter: param.name.clone(),
                        title: request.title.clone(),
                        type_name: definition.type_name().to_string(),
                    });
                }
            }
        }

        for (attribute, value) in &request.arguments {
            if !definition.valid_attribute(attribute, self.registry()) {
                return Err(EvalError::UnknownAttribute {
                    attribute: attribute.clone(),
                    type_name: definition.type_name().to_string(),
                });
            }
            self.bind(scope, attribute, value.clone())?;
        }
        Ok(())
    }

    /// Bind one variable, re-signaling the store's native error as
    /// `AssignmentFailed` with the cause attached.
    fn bind(&mut self, scope: ScopeId, attribute: &str, value: Value) -> EvalResult<()> {
        self.scopes
            .set_variable(scope, attribute, value)
            .map_err(|cause| EvalError::AssignmentFailed {
                attribute: attribute.to_string(),
                cause: cause.to_string(),
            })
    }
}
