//! Rill definition evaluator.
//!
//! Instantiates user-defined definitions at call sites while compiling a
//! configuration tree into a catalog: binds call-site arguments to
//! formal parameters, materializes instance scopes, resolves single
//! parent links, and evaluates definition bodies.

mod catalog;
mod definition;
mod error;
mod evaluator;
mod instantiate;
mod registry;
mod scope;

pub use catalog::{Catalog, Resource};
pub use definition::{Definition, DefinitionError, FormalParameter, ParentState};
pub use error::{EvalError, EvalResult};
pub use evaluator::Evaluator;
pub use instantiate::EvalRequest;
pub use registry::{
    AttributeRegistry, CoreRegistry, DefinitionResolver, MetaAttribute, Namespace,
};
pub use scope::{ScopeContext, ScopeError, ScopeId, ScopeTree};
