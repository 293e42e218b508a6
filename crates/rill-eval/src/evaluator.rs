//! Core expression and statement evaluator.
//!
//! Walks the AST subset that appears inside definition bodies and
//! default expressions. Definition instantiation itself lives in
//! `instantiate.rs`; this module handles everything else and hands
//! resource declarations either to a definition (nested instantiation)
//! or to the catalog.

use crate::catalog::{Catalog, Resource};
use crate::error::{EvalError, EvalResult};
use crate::instantiate::{is_word, EvalRequest};
use crate::registry::{AttributeRegistry, DefinitionResolver};
use crate::scope::{ScopeId, ScopeTree};
use rill_types::ast::{AssignStmt, Block, Expr, ExprKind, ResourceDecl, Stmt, StringPart};
use rill_types::Value;
use std::collections::BTreeMap;

/// The evaluator for one compile.
///
/// Owns the scope tree and the catalog being built; consults the
/// injected attribute registry and definition resolver, never ambient
/// global state.
pub struct Evaluator<'a> {
    registry: &'a dyn AttributeRegistry,
    resolver: &'a dyn DefinitionResolver,
    /// Scope tree for this compile; the root scope is the top scope.
    pub scopes: ScopeTree,
    /// Catalog of concrete resources declared so far.
    pub catalog: Catalog,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        registry: &'a dyn AttributeRegistry,
        resolver: &'a dyn DefinitionResolver,
    ) -> Self {
        Self {
            registry,
            resolver,
            scopes: ScopeTree::new(),
            catalog: Catalog::new(),
        }
    }

    pub(crate) fn registry(&self) -> &dyn AttributeRegistry {
        self.registry
    }

    pub(crate) fn resolver(&self) -> &dyn DefinitionResolver {
        self.resolver
    }

    /// Evaluate one call site: the compiler-facing entry point.
    ///
    /// Resolves `type_name` to a definition under the scope's namespace
    /// and instantiates it. A name with no definition registers a
    /// concrete resource in the catalog instead, carrying the declaring
    /// scope's tags and exported flag, and yields no value.
    pub fn evaluate(
        &mut self,
        scope: ScopeId,
        type_name: &str,
        title: impl Into<String>,
        arguments: BTreeMap<String, Value>,
        exported: bool,
    ) -> EvalResult<Option<Value>> {
        let title = title.into();
        let namespace = self.scopes.context(scope).namespace.clone();
        if let Some(definition) = self.resolver.find_definition(&namespace, type_name) {
            return self.instantiate(
                &definition,
                EvalRequest {
                    scope,
                    title,
                    arguments,
                    exported,
                },
            );
        }

        let mut tags = self.scopes.tags(scope);
        tags.insert(type_name.to_string());
        if is_word(&title) {
            tags.insert(title.clone());
        }
        self.catalog.add(Resource {
            type_name: type_name.to_string(),
            title,
            attributes: arguments,
            tags,
            exported: exported || self.scopes.is_exported(scope),
        });
        Ok(None)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expression evaluation
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression against `scope`.
    pub fn eval_expr(&mut self, scope: ScopeId, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::StringLit(s) => Ok(Value::String(s.clone())),
            ExprKind::NumberLit(n) => Ok(Value::Number(*n)),
            ExprKind::BoolLit(b) => Ok(Value::Bool(*b)),
            ExprKind::UndefLit => Ok(Value::Undef),
            ExprKind::Interp(parts) => self.eval_interp(scope, parts),
            ExprKind::ArrayLit(elems) => self.eval_array(scope, elems),
            ExprKind::HashLit(entries) => {
                let mut fields = BTreeMap::new();
                for entry in entries {
                    let value = self.eval_expr(scope, &entry.value)?;
                    fields.insert(entry.key.name.clone(), value);
                }
                Ok(Value::Hash(fields))
            }
            ExprKind::Variable(name) => self.eval_variable(scope, name),
        }
    }

    fn eval_variable(&self, scope: ScopeId, name: &str) -> EvalResult<Value> {
        self.scopes
            .lookup(scope, name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn eval_interp(&mut self, scope: ScopeId, parts: &[StringPart]) -> EvalResult<Value> {
        let mut result = String::new();
        for part in parts {
            match part {
                StringPart::Literal(s) => result.push_str(s),
                StringPart::Expr(expr) => {
                    let value = self.eval_expr(scope, expr)?;
                    result.push_str(&value.to_string());
                }
            }
        }
        Ok(Value::String(result))
    }

    fn eval_array(&mut self, scope: ScopeId, elems: &[Expr]) -> EvalResult<Value> {
        let mut values = Vec::with_capacity(elems.len());
        for elem in elems {
            values.push(self.eval_expr(scope, elem)?);
        }
        Ok(Value::Array(values))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Block & statement evaluation
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate a block of statements. Returns the value of the last
    /// statement, or `Undef` for an empty block.
    pub fn eval_block(&mut self, scope: ScopeId, block: &Block) -> EvalResult<Value> {
        let mut last = Value::Undef;
        for stmt in &block.stmts {
            last = self.eval_stmt(scope, stmt)?;
        }
        Ok(last)
    }

    /// Evaluate a single statement.
    pub fn eval_stmt(&mut self, scope: ScopeId, stmt: &Stmt) -> EvalResult<Value> {
        match stmt {
            Stmt::Assign(assign) => self.eval_assign(scope, assign),
            Stmt::Resource(decl) => self.eval_resource(scope, decl),
        }
    }

    fn eval_assign(&mut self, scope: ScopeId, stmt: &AssignStmt) -> EvalResult<Value> {
        let value = self.eval_expr(scope, &stmt.value)?;
        self.scopes.set_variable(scope, &stmt.name.name, value)?;
        Ok(Value::Undef)
    }

    /// Evaluate a resource declaration: a nested call site with no
    /// export override of its own.
    fn eval_resource(&mut self, scope: ScopeId, decl: &ResourceDecl) -> EvalResult<Value> {
        let title = match self.eval_expr(scope, &decl.title)? {
            Value::String(title) => title,
            other => {
                return Err(EvalError::TypeMismatch(format!(
                    "resource title must be a string, got {}",
                    other.type_name()
                )));
            }
        };

        let mut attributes = BTreeMap::new();
        for attr in &decl.attributes {
            let value = self.eval_expr(scope, &attr.value)?;
            attributes.insert(attr.name.name.clone(), value);
        }

        self.evaluate(scope, &decl.type_name.name, title, attributes, false)?;
        Ok(Value::Undef)
    }
}
