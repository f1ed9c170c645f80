//! RPAL interpreter
//!
//! Source text goes through four stages: [`lexer::tokenize`],
//! [`parser::parse`] into a raw AST, [`standardize::standardize`] into the
//! core calculus, and finally the CSE [`interp::Machine`].

pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod standardize;
pub mod tree;
pub mod util;

pub use error::{CompileError, Error, Result};
pub use interp::{MachineConfig, RuntimeError, Value};
pub use tree::{NodeId, NodeKind, Span, Tree};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`, if it is set
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Lex and parse source text into a raw AST
pub fn parse_source(source: &str) -> Result<Tree> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(tokens)
}

/// Lex, parse and standardize source text
pub fn compile(source: &str) -> Result<Tree> {
    let ast = parse_source(source)?;
    standardize::standardize(&ast)
}

/// Result of running a program
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Value,
    /// Everything written by `Print`
    pub output: String,
}

impl Outcome {
    /// Printed output followed by the final value on its own line. The value
    /// is left out when it is `dummy` and the program printed something.
    pub fn render(&self) -> String {
        let mut text = self.output.clone();
        if self.value == Value::Dummy && !self.output.is_empty() {
            return text;
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.value.to_string());
        text
    }
}

/// Compile and evaluate a program
pub fn run_source(source: &str, config: MachineConfig) -> std::result::Result<Outcome, Error> {
    let tree = compile(source)?;
    let (value, output) = interp::evaluate(&tree, config)?;
    Ok(Outcome { value, output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source() {
        let outcome = run_source("let x = 3 in x + 4", MachineConfig::default()).unwrap();
        assert_eq!(outcome.value, Value::Int(7));
        assert_eq!(outcome.render(), "7");
    }

    #[test]
    fn test_render_puts_value_after_output() {
        let outcome = Outcome {
            value: Value::Int(1),
            output: "hello".to_string(),
        };
        assert_eq!(outcome.render(), "hello\n1");
    }

    #[test]
    fn test_render_hides_dummy_after_output() {
        let outcome = Outcome {
            value: Value::Dummy,
            output: "hello\n".to_string(),
        };
        assert_eq!(outcome.render(), "hello\n");

        let silent = Outcome {
            value: Value::Dummy,
            output: String::new(),
        };
        assert_eq!(silent.render(), "dummy");
    }

    #[test]
    fn test_errors_are_unified() {
        assert!(matches!(run_source("let x = in", MachineConfig::default()), Err(Error::Compile(_))));
        assert!(matches!(run_source("1 / 0", MachineConfig::default()), Err(Error::Runtime(_))));
    }
}
