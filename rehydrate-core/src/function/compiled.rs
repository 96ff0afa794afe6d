//! Compiled function values.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::ast::FunctionExpr;
use super::eval::{CallDepth, Scope};
use crate::error::Result;
use crate::value::Value;

struct FunctionInner {
    source: String,
    definition: FunctionExpr,
    context: IndexMap<String, Value>,
    properties: RwLock<IndexMap<String, Value>>,
}

/// A callable compiled from source text.
///
/// The context captured at compile time is immutable. Properties can be
/// attached afterwards and are shared by every clone.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

impl Function {
    pub(crate) fn new(
        source: String,
        definition: FunctionExpr,
        context: IndexMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(FunctionInner {
                source,
                definition,
                context,
                properties: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Invoke the function. Missing arguments are `undefined`, extra ones are
    /// ignored.
    pub fn call(&self, arguments: &[Value]) -> Result<Value> {
        let _depth = CallDepth::enter()?;
        let definition = &self.inner.definition;

        let mut scope = Scope::new(&self.inner.context);
        for (index, param) in definition.params.iter().enumerate() {
            scope.bind(param, arguments.get(index).cloned().unwrap_or_default());
        }
        scope.run(&definition.body)
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.definition.name.as_deref()
    }

    pub fn params(&self) -> &[String] {
        &self.inner.definition.params
    }

    /// Free variables bound at compile time.
    pub fn context(&self) -> &IndexMap<String, Value> {
        &self.inner.context
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.inner.properties.read().get(name).cloned()
    }

    /// Attach a property, returning the previous value.
    pub fn set_property(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.properties.write().insert(name.into(), value.into())
    }

    /// Attached properties, in insertion order.
    pub fn properties(&self) -> IndexMap<String, Value> {
        self.inner.properties.read().clone()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("source", &self.inner.source)
            .field("context", &self.inner.context.keys().collect::<Vec<_>>())
            .finish()
    }
}
