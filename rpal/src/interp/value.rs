//! Runtime values for the CSE machine

use super::env::EnvRef;
use super::primitive::Primitive;
use crate::tree::{escape_str, NodeId};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Function value: a lambda node paired with the environment it was
/// evaluated in
#[derive(Debug)]
pub struct Closure {
    /// Bound-variable pattern, first child of the lambda
    pub binder: NodeId,
    /// Body, second child of the lambda
    pub body: NodeId,
    pub env: EnvRef,
    /// Rendered binder, for display only
    pub param: Rc<str>,
}

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    /// Tuple, the empty tuple is `nil`
    Tuple(Items),
    Dummy,
    Closure(Rc<Closure>),
    /// Fixed point of a closure, produced by applying `Y*`
    Eta(Rc<Closure>),
    YStar,
    Primitive(Primitive),
    /// Binary primitive waiting for its second operand
    Partial(Primitive, Operand),
    /// Component of a fixed point bound through a tuple pattern. Lives only
    /// in environments: looking it up forces the fixed point.
    Projection(Rc<Closure>, usize),
}

impl Value {
    pub fn nil() -> Self {
        Value::tuple(Vec::new())
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Items(Rc::from(items)))
    }

    /// `primitive` applied to its first operand
    pub fn partial(primitive: Primitive, first: Value) -> Self {
        Value::Partial(primitive, Operand(Rc::new(first)))
    }

    /// Kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Bool(_) => "truth value",
            Value::Str(_) => "string",
            Value::Tuple(items) if items.is_empty() => "nil",
            Value::Tuple(_) => "tuple",
            Value::Dummy => "dummy",
            Value::Closure(_)
            | Value::Eta(_)
            | Value::YStar
            | Value::Primitive(_)
            | Value::Partial(..)
            | Value::Projection(..) => "function",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(&items[..]),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        self.type_name() == "function"
    }

    /// Form written by `Print`: like `Display`, but strings are raw
    pub fn printed(&self) -> Printed<'_> {
        Printed(self)
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, quote: bool) -> fmt::Result {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.write_inner(f, quote))
    }

    fn write_inner(&self, f: &mut fmt::Formatter<'_>, quote: bool) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) if quote => write!(f, "'{}'", escape_str(s)),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) if items.is_empty() => f.write_str("nil"),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write(f, quote)?;
                }
                f.write_str(")")
            }
            Value::Dummy => f.write_str("dummy"),
            Value::Closure(c) => write!(f, "[lambda closure: {}]", c.param),
            Value::Eta(c) => write!(f, "[eta closure: {}]", c.param),
            Value::YStar => f.write_str("Y*"),
            Value::Primitive(p) => f.write_str(p.name()),
            Value::Partial(p, first) => {
                write!(f, "[{} applied to ", p.name())?;
                first.write(f, quote)?;
                f.write_str("]")
            }
            Value::Projection(c, index) => write!(f, "[eta closure: {} @ {index}]", c.param),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

/// Components of a tuple
#[derive(Debug, Clone, PartialEq)]
pub struct Items(Rc<[Value]>);

impl Deref for Items {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        if let Some(slots) = Rc::get_mut(&mut self.0) {
            teardown(slots.iter_mut().filter_map(take_nested).collect());
        }
    }
}

/// First operand held by a partially applied primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Operand(Rc<Value>);

impl Deref for Operand {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl Drop for Operand {
    fn drop(&mut self) {
        if let Some(slot) = Rc::get_mut(&mut self.0) {
            teardown(take_nested(slot).into_iter().collect());
        }
    }
}

/// Move a value that owns further values out of its slot, leaving `dummy`
fn take_nested(slot: &mut Value) -> Option<Value> {
    matches!(slot, Value::Tuple(_) | Value::Partial(..)).then(|| std::mem::replace(slot, Value::Dummy))
}

// Unlink nested tuples and operands iteratively, so dropping each value
// only ever releases flat storage
fn teardown(mut pending: Vec<Value>) {
    while let Some(mut value) = pending.pop() {
        match &mut value {
            Value::Tuple(items) => {
                if let Some(slots) = Rc::get_mut(&mut items.0) {
                    pending.extend(slots.iter_mut().filter_map(take_nested));
                }
            }
            Value::Partial(_, operand) => {
                if let Some(slot) = Rc::get_mut(&mut operand.0) {
                    pending.extend(take_nested(slot));
                }
            }
            _ => {}
        }
    }
}

/// Display adapter returned by [`Value::printed`]
pub struct Printed<'a>(&'a Value);

impl fmt::Display for Printed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, false)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dummy, Value::Dummy) | (Value::YStar, Value::YStar) => true,
            (Value::Closure(a), Value::Closure(b)) | (Value::Eta(a), Value::Eta(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Partial(p, a), Value::Partial(q, b)) => p == q && a == b,
            (Value::Projection(a, i), Value::Projection(b, j)) => Rc::ptr_eq(a, b) && i == j,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::string("it's").to_string(), "'it\\'s'");
        assert_eq!(Value::nil().to_string(), "nil");
        assert_eq!(Value::Dummy.to_string(), "dummy");
        assert_eq!(Value::Primitive(Primitive::Conc).to_string(), "Conc");
    }

    #[test]
    fn test_tuple_display_is_recursive() {
        let inner = Value::tuple(vec![Value::string("a"), Value::nil()]);
        let outer = Value::tuple(vec![Value::Int(1), inner]);
        assert_eq!(outer.to_string(), "(1, ('a', nil))");
    }

    #[test]
    fn test_printed_strings_are_raw() {
        let v = Value::tuple(vec![Value::string("a\nb"), Value::Int(2)]);
        assert_eq!(v.printed().to_string(), "(a\nb, 2)");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "integer");
        assert_eq!(Value::nil().type_name(), "nil");
        assert_eq!(Value::tuple(vec![Value::Int(1), Value::Int(2)]).type_name(), "tuple");
        assert!(Value::YStar.is_function());
        assert!(!Value::Dummy.is_function());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            Value::tuple(vec![Value::Int(1), Value::string("x")]),
            Value::tuple(vec![Value::Int(1), Value::string("x")])
        );
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_eq!(Value::nil(), Value::tuple(Vec::new()));
    }

    fn nested_pairs(depth: i64) -> Value {
        let mut chain = Value::nil();
        for n in 0..depth {
            chain = Value::tuple(vec![Value::Int(n), chain]);
        }
        chain
    }

    #[test]
    fn test_dropping_a_deep_tuple_chain() {
        let chain = nested_pairs(1_000_000);
        assert_eq!(chain.as_tuple().map(<[Value]>::len), Some(2));
        drop(chain);
    }

    #[test]
    fn test_shared_components_survive_teardown() {
        let shared = nested_pairs(3);
        let outer = Value::tuple(vec![shared.clone(), Value::Int(9)]);
        drop(outer);
        assert_eq!(shared.to_string(), "(2, (1, (0, nil)))");
    }

    #[test]
    fn test_dropping_deep_partial_operands() {
        let mut value = Value::Int(0);
        for _ in 0..1_000_000 {
            value = Value::partial(Primitive::Conc, value);
        }
        drop(value);
    }

    #[test]
    fn test_display_of_a_deep_tuple_chain() {
        let text = nested_pairs(100_000).to_string();
        assert!(text.starts_with("(99999, (99998, "));
        assert!(text.contains("(1, (0, nil))"));
        assert_eq!(text.matches(')').count(), 100_000);
    }
}
