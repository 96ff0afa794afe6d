//! Function Compilation
//!
//! Turns serialized function source into a callable [`Function`].
//!
//! # Architecture
//!
//! 1. [`lexer`] splits the source into tokens
//! 2. [`parser`] builds a [`FunctionExpr`] syntax tree
//! 3. The evaluator walks the tree on every call, resolving names against
//!    the parameters first and the captured context second
//!
//! The accepted language is a JavaScript expression subset: arrow functions
//! and `function` expressions whose bodies use literals, identifiers, member
//! and index access, calls, arithmetic, comparisons, logical operators and
//! the ternary operator.
//!
//! Compiling source runs code supplied by the payload, so the pipeline only
//! does it when explicitly enabled.

pub mod ast;
mod compiled;
mod eval;
pub mod lexer;
pub mod parser;

pub use ast::FunctionExpr;
pub use compiled::Function;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::value::Value;

/// Compile `source` into a callable, with `context` names in scope.
pub fn compile(source: &str, context: Option<IndexMap<String, Value>>) -> Result<Function> {
    let definition = parser::parse_function(source)?;
    let context = context.unwrap_or_default();

    debug!(
        params = definition.params.len(),
        context = context.len(),
        "compiled function"
    );
    Ok(Function::new(source.to_string(), definition, context))
}
