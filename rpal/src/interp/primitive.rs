//! Built-in operators and library functions

use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::tree::Operator;
use std::fmt::Write as _;

/// Built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    // Operators
    Plus,
    Minus,
    Mul,
    Div,
    Pow,
    Neg,
    Gr,
    Ge,
    Ls,
    Le,
    Eq,
    Ne,
    Or,
    Amp,
    Not,
    Aug,

    // Named functions bound in the root environment
    Print,
    Conc,
    Stem,
    Stern,
    Order,
    Null,
    IsInteger,
    IsString,
    IsTuple,
    IsFunction,
    IsTruthValue,
    IsDummy,
    ItoS,
}

impl Primitive {
    /// Functions reachable by name
    pub const NAMED: [Primitive; 13] = [
        Primitive::Print,
        Primitive::Conc,
        Primitive::Stem,
        Primitive::Stern,
        Primitive::Order,
        Primitive::Null,
        Primitive::IsInteger,
        Primitive::IsString,
        Primitive::IsTuple,
        Primitive::IsFunction,
        Primitive::IsTruthValue,
        Primitive::IsDummy,
        Primitive::ItoS,
    ];

    pub fn from_operator(op: Operator) -> Self {
        match op {
            Operator::Aug => Primitive::Aug,
            Operator::Or => Primitive::Or,
            Operator::Amp => Primitive::Amp,
            Operator::Not => Primitive::Not,
            Operator::Gr => Primitive::Gr,
            Operator::Ge => Primitive::Ge,
            Operator::Ls => Primitive::Ls,
            Operator::Le => Primitive::Le,
            Operator::Eq => Primitive::Eq,
            Operator::Ne => Primitive::Ne,
            Operator::Plus => Primitive::Plus,
            Operator::Minus => Primitive::Minus,
            Operator::Neg => Primitive::Neg,
            Operator::Mul => Primitive::Mul,
            Operator::Div => Primitive::Div,
            Operator::Pow => Primitive::Pow,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Plus => "+",
            Primitive::Minus => "-",
            Primitive::Mul => "*",
            Primitive::Div => "/",
            Primitive::Pow => "**",
            Primitive::Neg => "neg",
            Primitive::Gr => "gr",
            Primitive::Ge => "ge",
            Primitive::Ls => "ls",
            Primitive::Le => "le",
            Primitive::Eq => "eq",
            Primitive::Ne => "ne",
            Primitive::Or => "or",
            Primitive::Amp => "&",
            Primitive::Not => "not",
            Primitive::Aug => "aug",
            Primitive::Print => "Print",
            Primitive::Conc => "Conc",
            Primitive::Stem => "Stem",
            Primitive::Stern => "Stern",
            Primitive::Order => "Order",
            Primitive::Null => "Null",
            Primitive::IsInteger => "Isinteger",
            Primitive::IsString => "Isstring",
            Primitive::IsTuple => "Istuple",
            Primitive::IsFunction => "Isfunction",
            Primitive::IsTruthValue => "Istruthvalue",
            Primitive::IsDummy => "Isdummy",
            Primitive::ItoS => "ItoS",
        }
    }

    /// Number of curried operands
    pub fn arity(self) -> usize {
        match self {
            Primitive::Neg
            | Primitive::Not
            | Primitive::Print
            | Primitive::Stem
            | Primitive::Stern
            | Primitive::Order
            | Primitive::Null
            | Primitive::IsInteger
            | Primitive::IsString
            | Primitive::IsTuple
            | Primitive::IsFunction
            | Primitive::IsTruthValue
            | Primitive::IsDummy
            | Primitive::ItoS => 1,
            _ => 2,
        }
    }

    fn mismatch(self, expected: &str, got: &Value) -> RuntimeError {
        RuntimeError::type_error(self.name(), expected, got.type_name())
    }

    fn mismatch2(self, expected: &str, a: &Value, b: &Value) -> RuntimeError {
        let got = format!("{} and {}", a.type_name(), b.type_name());
        RuntimeError::type_error(self.name(), expected, &got)
    }

    /// Apply a unary primitive. `Print` appends to `output`.
    pub fn apply_unary(self, arg: Value, output: &mut String) -> InterpResult<Value> {
        match self {
            Primitive::Neg => {
                let n = arg.as_int().ok_or_else(|| self.mismatch("an integer", &arg))?;
                n.checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::overflow(self.name()))
            }
            Primitive::Not => arg
                .as_bool()
                .map(|b| Value::Bool(!b))
                .ok_or_else(|| self.mismatch("a truth value", &arg)),
            Primitive::Print => {
                let _ = write!(output, "{}", arg.printed());
                Ok(Value::Dummy)
            }
            Primitive::Stem => {
                let s = arg.as_str().ok_or_else(|| self.mismatch("a string", &arg))?;
                Ok(Value::string(s.chars().next().map(String::from).unwrap_or_default()))
            }
            Primitive::Stern => {
                let s = arg.as_str().ok_or_else(|| self.mismatch("a string", &arg))?;
                let mut chars = s.chars();
                chars.next();
                Ok(Value::string(chars.as_str()))
            }
            Primitive::Order => {
                let items = arg.as_tuple().ok_or_else(|| self.mismatch("a tuple", &arg))?;
                i64::try_from(items.len())
                    .map(Value::Int)
                    .map_err(|_| RuntimeError::overflow(self.name()))
            }
            Primitive::Null => {
                let items = arg.as_tuple().ok_or_else(|| self.mismatch("a tuple", &arg))?;
                Ok(Value::Bool(items.is_empty()))
            }
            Primitive::IsInteger => Ok(Value::Bool(matches!(arg, Value::Int(_)))),
            Primitive::IsString => Ok(Value::Bool(matches!(arg, Value::Str(_)))),
            Primitive::IsTuple => Ok(Value::Bool(matches!(arg, Value::Tuple(_)))),
            Primitive::IsFunction => Ok(Value::Bool(arg.is_function())),
            Primitive::IsTruthValue => Ok(Value::Bool(matches!(arg, Value::Bool(_)))),
            Primitive::IsDummy => Ok(Value::Bool(matches!(arg, Value::Dummy))),
            Primitive::ItoS => {
                let n = arg.as_int().ok_or_else(|| self.mismatch("an integer", &arg))?;
                Ok(Value::string(n.to_string()))
            }
            _ => Err(RuntimeError::fault(format!("'{}' applied as a unary primitive", self.name()))),
        }
    }

    /// Apply a binary primitive to both operands
    pub fn apply_binary(self, left: &Value, right: Value) -> InterpResult<Value> {
        match self {
            Primitive::Plus | Primitive::Minus | Primitive::Mul | Primitive::Div | Primitive::Pow => {
                let (Some(a), Some(b)) = (left.as_int(), right.as_int()) else {
                    return Err(self.mismatch2("integers", left, &right));
                };
                self.arithmetic(a, b).map(Value::Int)
            }
            Primitive::Gr | Primitive::Ge | Primitive::Ls | Primitive::Le => {
                let ordering = match (left, &right) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => return Err(self.mismatch2("two integers or two strings", left, &right)),
                };
                Ok(Value::Bool(match self {
                    Primitive::Gr => ordering.is_gt(),
                    Primitive::Ge => ordering.is_ge(),
                    Primitive::Ls => ordering.is_lt(),
                    _ => ordering.is_le(),
                }))
            }
            Primitive::Eq | Primitive::Ne => {
                let equal = match (left, &right) {
                    (Value::Int(a), Value::Int(b)) => a == b,
                    (Value::Str(a), Value::Str(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    (Value::Tuple(a), Value::Tuple(b)) if a.is_empty() && b.is_empty() => true,
                    (Value::Dummy, Value::Dummy) => true,
                    _ => return Err(self.mismatch2("operands of the same basic kind", left, &right)),
                };
                Ok(Value::Bool(if self == Primitive::Eq { equal } else { !equal }))
            }
            Primitive::Or | Primitive::Amp => {
                let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) else {
                    return Err(self.mismatch2("truth values", left, &right));
                };
                Ok(Value::Bool(if self == Primitive::Or { a || b } else { a && b }))
            }
            Primitive::Aug => {
                let items = left.as_tuple().ok_or_else(|| self.mismatch("a tuple on the left", left))?;
                let mut extended = Vec::with_capacity(items.len() + 1);
                extended.extend_from_slice(items);
                extended.push(right);
                Ok(Value::tuple(extended))
            }
            Primitive::Conc => match (left, &right) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
                _ => Err(self.mismatch2("strings", left, &right)),
            },
            _ => Err(RuntimeError::fault(format!("'{}' applied as a binary primitive", self.name()))),
        }
    }

    fn arithmetic(self, a: i64, b: i64) -> InterpResult<i64> {
        let result = match self {
            Primitive::Plus => a.checked_add(b),
            Primitive::Minus => a.checked_sub(b),
            Primitive::Mul => a.checked_mul(b),
            Primitive::Div => {
                if b == 0 {
                    return Err(RuntimeError::division_by_zero());
                }
                a.checked_div(b)
            }
            Primitive::Pow => {
                if b < 0 {
                    return Err(RuntimeError::negative_exponent(b));
                }
                u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
            }
            _ => None,
        };
        result.ok_or_else(|| RuntimeError::overflow(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;

    fn binary(p: Primitive, a: Value, b: Value) -> InterpResult<Value> {
        p.apply_binary(&a, b)
    }

    fn unary(p: Primitive, a: Value) -> InterpResult<Value> {
        p.apply_unary(a, &mut String::new())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(binary(Primitive::Plus, Value::Int(3), Value::Int(4)).unwrap(), Value::Int(7));
        assert_eq!(binary(Primitive::Minus, Value::Int(3), Value::Int(4)).unwrap(), Value::Int(-1));
        assert_eq!(binary(Primitive::Div, Value::Int(7), Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(binary(Primitive::Pow, Value::Int(2), Value::Int(10)).unwrap(), Value::Int(1024));
        assert_eq!(unary(Primitive::Neg, Value::Int(5)).unwrap(), Value::Int(-5));
    }

    #[test]
    fn test_arithmetic_errors() {
        let err = binary(Primitive::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArithmeticError);
        let err = binary(Primitive::Mul, Value::Int(i64::MAX), Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArithmeticError);
        let err = binary(Primitive::Pow, Value::Int(2), Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArithmeticError);
        let err = binary(Primitive::Div, Value::Int(i64::MIN), Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArithmeticError);
    }

    #[test]
    fn test_type_error_names_operator() {
        let err = binary(Primitive::Plus, Value::Int(1), Value::string("a")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.contains("'+'"));
        assert!(err.message.contains("integer and string"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(Primitive::Gr, Value::Int(1), Value::Int(2)).unwrap(), Value::Bool(false));
        assert_eq!(binary(Primitive::Le, Value::Int(2), Value::Int(2)).unwrap(), Value::Bool(true));
        assert_eq!(
            binary(Primitive::Ls, Value::string("abc"), Value::string("abd")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(binary(Primitive::Eq, Value::Int(2), Value::Int(2)).unwrap(), Value::Bool(true));
        assert_eq!(binary(Primitive::Ne, Value::string("a"), Value::string("b")).unwrap(), Value::Bool(true));
        assert_eq!(binary(Primitive::Eq, Value::nil(), Value::nil()).unwrap(), Value::Bool(true));
        let err = binary(Primitive::Eq, Value::Int(1), Value::string("1")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_logic() {
        assert_eq!(binary(Primitive::Or, Value::Bool(false), Value::Bool(true)).unwrap(), Value::Bool(true));
        assert_eq!(binary(Primitive::Amp, Value::Bool(true), Value::Bool(false)).unwrap(), Value::Bool(false));
        assert_eq!(unary(Primitive::Not, Value::Bool(false)).unwrap(), Value::Bool(true));
        assert!(unary(Primitive::Not, Value::Int(0)).is_err());
    }

    #[test]
    fn test_aug() {
        let t = binary(Primitive::Aug, Value::nil(), Value::Int(1)).unwrap();
        let t = binary(Primitive::Aug, t, Value::Int(2)).unwrap();
        assert_eq!(t, Value::tuple(vec![Value::Int(1), Value::Int(2)]));
        assert!(binary(Primitive::Aug, Value::Int(1), Value::Int(2)).is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            binary(Primitive::Conc, Value::string("ab"), Value::string("cd")).unwrap(),
            Value::string("abcd")
        );
        assert_eq!(unary(Primitive::Stem, Value::string("abc")).unwrap(), Value::string("a"));
        assert_eq!(unary(Primitive::Stern, Value::string("abc")).unwrap(), Value::string("bc"));
        assert_eq!(unary(Primitive::Stem, Value::string("")).unwrap(), Value::string(""));
        assert_eq!(unary(Primitive::ItoS, Value::Int(42)).unwrap(), Value::string("42"));
    }

    #[test]
    fn test_tuple_functions() {
        let t = Value::tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(unary(Primitive::Order, t.clone()).unwrap(), Value::Int(3));
        assert_eq!(unary(Primitive::Null, t).unwrap(), Value::Bool(false));
        assert_eq!(unary(Primitive::Null, Value::nil()).unwrap(), Value::Bool(true));
        assert_eq!(unary(Primitive::Order, Value::nil()).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_kind_tests() {
        assert_eq!(unary(Primitive::IsInteger, Value::Int(1)).unwrap(), Value::Bool(true));
        assert_eq!(unary(Primitive::IsString, Value::Int(1)).unwrap(), Value::Bool(false));
        assert_eq!(unary(Primitive::IsTuple, Value::nil()).unwrap(), Value::Bool(true));
        assert_eq!(unary(Primitive::IsDummy, Value::Dummy).unwrap(), Value::Bool(true));
        assert_eq!(
            unary(Primitive::IsFunction, Value::Primitive(Primitive::Print)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(unary(Primitive::IsTruthValue, Value::Bool(false)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_print_appends_raw_output() {
        let mut out = String::new();
        let result = Primitive::Print.apply_unary(Value::string("hi\n"), &mut out).unwrap();
        Primitive::Print.apply_unary(Value::Int(3), &mut out).unwrap();
        assert_eq!(result, Value::Dummy);
        assert_eq!(out, "hi\n3");
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(Primitive::Plus.arity(), 2);
        assert_eq!(Primitive::Conc.arity(), 2);
        assert_eq!(Primitive::Print.arity(), 1);
        assert!(Primitive::NAMED.iter().all(|p| p.name().chars().next().is_some_and(char::is_uppercase)));
    }
}
