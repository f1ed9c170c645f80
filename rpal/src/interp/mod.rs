//! CSE machine interpreter for standardized trees

mod env;
mod error;
mod machine;
mod primitive;
mod value;

pub use env::{EnvRef, Environment};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use machine::{Machine, MachineConfig, MachineStats};
pub use primitive::Primitive;
pub use value::{Closure, Items, Operand, Printed, Value};

use crate::tree::Tree;

/// Evaluate a standardized tree, returning the final value and everything
/// written by `Print`
pub fn evaluate(tree: &Tree, config: MachineConfig) -> InterpResult<(Value, String)> {
    let mut machine = Machine::new(tree, config)?;
    let value = machine.run()?;
    Ok((value, machine.take_output()))
}
