//! Tree-walking evaluator.
//!
//! Values follow JavaScript coercion rules closely enough for serialized
//! callbacks: `+` concatenates when either side is a string, arithmetic
//! coerces to numbers, `==` is loose and `===` is identity.

use std::cell::Cell;

use chrono::SecondsFormat;
use indexmap::IndexMap;

use super::ast::{BinaryOp, Body, Expr, Literal, LogicalOp, Statement, UnaryOp};
use crate::error::{Error, Result};
use crate::value::Value;

const MAX_CALL_DEPTH: usize = 256;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Guard counting nested calls on the current thread.
pub(crate) struct CallDepth;

impl CallDepth {
    pub(crate) fn enter() -> Result<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(Error::Evaluation("maximum call depth exceeded".to_string()));
            }
            depth.set(depth.get() + 1);
            Ok(CallDepth)
        })
    }
}

impl Drop for CallDepth {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Name resolution for one call: locals (parameters, then bindings), then
/// the compile-time context.
pub(crate) struct Scope<'a> {
    locals: Vec<(String, Value)>,
    context: &'a IndexMap<String, Value>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(context: &'a IndexMap<String, Value>) -> Self {
        Self {
            locals: Vec::new(),
            context,
        }
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        self.locals.push((name.to_string(), value));
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.context.get(name).cloned())
    }

    pub(crate) fn run(&mut self, body: &Body) -> Result<Value> {
        match body {
            Body::Expression(expr) => self.eval(expr),
            Body::Block(statements) => {
                for statement in statements {
                    match statement {
                        Statement::Binding { name, value } => {
                            let value = self.eval(value)?;
                            self.bind(name, value);
                        }
                        Statement::Expression(expr) => {
                            self.eval(expr)?;
                        }
                        Statement::Return(expr) => {
                            return match expr {
                                Some(expr) => self.eval(expr),
                                None => Ok(Value::Undefined),
                            };
                        }
                    }
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),

            Expr::Identifier(name) => self
                .lookup(name)
                .ok_or_else(|| Error::Evaluation(format!("{name} is not defined"))),

            Expr::Array(items) => Ok(Value::array(
                items.iter().map(|item| self.eval(item)).collect::<Result<Vec<_>>>()?,
            )),

            Expr::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::from(map))
            }

            Expr::Member { object, property } => get_property(&self.eval(object)?, property),

            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                match self.eval(index)? {
                    Value::Number(n) => match list_index(n) {
                        Some(i) if object.list_items().is_some() || matches!(object, Value::String(_)) => {
                            get_index(&object, i)
                        }
                        _ => get_property(&object, &to_js_string(&Value::Number(n))),
                    },
                    key => get_property(&object, &to_js_string(&key)),
                }
            }

            Expr::Call { callee, arguments } => {
                let function = self.eval(callee)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.eval(argument))
                    .collect::<Result<Vec<_>>>()?;
                match function {
                    Value::Function(function) => function.call(&arguments),
                    other => Err(Error::Evaluation(format!(
                        "{} is not a function",
                        describe_callee(callee, &other)
                    ))),
                }
            }

            Expr::Unary { op, operand } => {
                if let (UnaryOp::TypeOf, Expr::Identifier(name)) = (op, operand.as_ref()) {
                    let value = self.lookup(name).unwrap_or_default();
                    return Ok(Value::from(type_of(&value)));
                }
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                    UnaryOp::Neg => Value::Number(-to_number(&value)),
                    UnaryOp::Plus => Value::Number(to_number(&value)),
                    UnaryOp::TypeOf => Value::from(type_of(&value)),
                })
            }

            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }

            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !truthy(&left),
                    LogicalOp::Or => truthy(&left),
                    LogicalOp::Coalesce => !matches!(left, Value::Undefined | Value::Null),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }
}

fn describe_callee(callee: &Expr, value: &Value) -> String {
    match callee {
        Expr::Identifier(name) => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => to_js_string(value),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_numeric(left) && is_numeric(right) {
                Value::Number(to_number(left) + to_number(right))
            } else {
                Value::String(to_js_string(left) + &to_js_string(right))
            }
        }
        BinaryOp::Sub => Value::Number(to_number(left) - to_number(right)),
        BinaryOp::Mul => Value::Number(to_number(left) * to_number(right)),
        BinaryOp::Div => Value::Number(to_number(left) / to_number(right)),
        BinaryOp::Rem => Value::Number(to_number(left) % to_number(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
        BinaryOp::Le => Value::Bool(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
        BinaryOp::Ge => Value::Bool(compare(left, right, |o| o.is_ge())),
        BinaryOp::StrictEq => Value::Bool(left.is_identical(right)),
        BinaryOp::StrictNe => Value::Bool(!left.is_identical(right)),
        BinaryOp::LooseEq => Value::Bool(loose_eq(left, right)),
        BinaryOp::LooseNe => Value::Bool(!loose_eq(left, right)),
    }
}

fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    };
    ordering.is_some_and(accept)
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    use Value::{Bool, Null, Number, String, Undefined};
    match (left, right) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Number(_), String(_)) | (String(_), Number(_)) | (Bool(_), _) | (_, Bool(_)) => {
            to_number(left) == to_number(right)
        }
        _ => left.is_identical(right),
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn list_index(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64).then_some(n as usize)
}

fn get_index(object: &Value, index: usize) -> Result<Value> {
    if let Value::String(s) = object {
        return Ok(s
            .chars()
            .nth(index)
            .map_or(Value::Undefined, |c| Value::String(c.to_string())));
    }
    Ok(object
        .list_items()
        .and_then(|items| items.get(index).cloned())
        .unwrap_or_default())
}

/// `object.property`, JavaScript style.
fn get_property(object: &Value, property: &str) -> Result<Value> {
    match object {
        Value::Undefined | Value::Null => Err(Error::Evaluation(format!(
            "cannot read properties of {} (reading '{property}')",
            to_js_string(object)
        ))),
        Value::String(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::String(s) => Ok(property
            .parse::<usize>()
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map_or(Value::Undefined, |c| Value::String(c.to_string()))),
        Value::Array(_) | Value::Observable(_) if object.list_items().is_some() => {
            let items = object.list_items().unwrap_or_default();
            if property == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(property
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default())
        }
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or_default()),
        Value::Observable(observable) => Ok(observable.get(property).unwrap_or_default()),
        Value::Component(component) => Ok(component.get(property).unwrap_or_default()),
        Value::ComponentClass(class) if property == "name" => Ok(Value::from(class.name())),
        Value::Function(function) => Ok(match property {
            "length" => Value::Number(function.params().len() as f64),
            _ => function.property(property).unwrap_or_default(),
        }),
        _ => Ok(Value::Undefined),
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

pub(crate) fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Function(_) | Value::ComponentClass(_) => "function",
        _ => "object",
    }
}

pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Date(date) => date.timestamp_millis() as f64,
        Value::Array(_) | Value::Observable(_) if value.list_items().is_some() => {
            to_number(&Value::String(to_js_string(value)))
        }
        _ => f64::NAN,
    }
}

pub(crate) fn to_js_string(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        Value::Date(date) => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        Value::Array(_) | Value::Observable(_) if value.list_items().is_some() => value
            .list_items()
            .unwrap_or_default()
            .iter()
            .map(|item| match item {
                Value::Undefined | Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::ComponentClass(class) => format!("class {}", class.name()),
        Value::Function(function) => function.source().to_string(),
        _ => "[object Object]".to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}
