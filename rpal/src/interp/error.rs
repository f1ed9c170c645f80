//! Runtime errors for the CSE machine

use std::fmt;

/// Runtime error during evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Name not bound anywhere in the environment chain
    UnboundName,
    /// Operand of the wrong kind
    TypeError,
    /// Tuple selection out of range
    IndexError,
    /// Overflow or division by zero
    ArithmeticError,
    /// Broken machine invariant
    MachineFault,
    /// Step or depth guard tripped
    ResourceExceeded,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::UnboundName => "UnboundNameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::ArithmeticError => "ArithmeticError",
            ErrorKind::MachineFault => "MachineFault",
            ErrorKind::ResourceExceeded => "ResourceExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
        }
    }

    pub fn unbound_name(name: &str, suggestion: Option<&str>) -> Self {
        let message = match suggestion {
            Some(similar) => format!("unbound name '{name}' (did you mean '{similar}'?)"),
            None => format!("unbound name '{name}'"),
        };
        Self::new(ErrorKind::UnboundName, message)
    }

    pub fn type_error(operator: &str, expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::TypeError,
            format!("'{operator}' expects {expected}, got {got}"),
        )
    }

    pub fn not_applicable(got: &str) -> Self {
        Self::new(ErrorKind::TypeError, format!("cannot apply {got} to an argument"))
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexError,
            format!("index {index} out of range for tuple of length {len}"),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::ArithmeticError, "division by zero")
    }

    pub fn overflow(operator: &str) -> Self {
        Self::new(ErrorKind::ArithmeticError, format!("integer overflow in '{operator}'"))
    }

    pub fn negative_exponent(exponent: i64) -> Self {
        Self::new(ErrorKind::ArithmeticError, format!("negative exponent {exponent}"))
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MachineFault, message)
    }

    pub fn step_limit(limit: u64) -> Self {
        Self::new(ErrorKind::ResourceExceeded, format!("step limit of {limit} exceeded"))
    }

    pub fn depth_limit(limit: usize) -> Self {
        Self::new(ErrorKind::ResourceExceeded, format!("call depth limit of {limit} exceeded"))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for machine operations
pub type InterpResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_name() {
        let err = RuntimeError::unbound_name("y", None);
        assert_eq!(err.kind, ErrorKind::UnboundName);
        assert_eq!(err.to_string(), "UnboundNameError: unbound name 'y'");
    }

    #[test]
    fn test_unbound_name_with_suggestion() {
        let err = RuntimeError::unbound_name("Prnt", Some("Print"));
        assert!(err.message.contains("did you mean 'Print'"));
    }

    #[test]
    fn test_type_error_names_operator_and_operand() {
        let err = RuntimeError::type_error("+", "integers", "string");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.contains("'+'"));
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_index_error() {
        let err = RuntimeError::index_out_of_range(4, 3);
        assert_eq!(err.kind, ErrorKind::IndexError);
        assert!(err.message.contains("index 4"));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(RuntimeError::division_by_zero().kind, ErrorKind::ArithmeticError);
        assert_eq!(RuntimeError::overflow("*").kind, ErrorKind::ArithmeticError);
        assert_eq!(RuntimeError::negative_exponent(-1).kind, ErrorKind::ArithmeticError);
    }

    #[test]
    fn test_resource_errors() {
        let err = RuntimeError::step_limit(100);
        assert_eq!(err.kind, ErrorKind::ResourceExceeded);
        assert!(err.to_string().starts_with("ResourceExceeded"));
        assert_eq!(RuntimeError::depth_limit(10).kind, ErrorKind::ResourceExceeded);
    }
}
