//! Environments for name bindings
//!
//! Environments are immutable once created and shared through `Rc`. A child
//! is created for every closure application and points at the environment
//! the closure captured, so the chain is lexical and can never be cyclic.

use super::Value;
use std::fmt;
use std::rc::Rc;

/// Shared reference to an environment
pub type EnvRef = Rc<Environment>;

/// One binding frame
#[derive(Debug)]
pub struct Environment {
    id: usize,
    bindings: Vec<(String, Value)>,
    parent: Option<EnvRef>,
}

impl Environment {
    /// Create the outermost environment
    pub fn root(bindings: Vec<(String, Value)>) -> EnvRef {
        Rc::new(Environment {
            id: 0,
            bindings,
            parent: None,
        })
    }

    /// Create a child of `parent`
    pub fn extend(parent: &EnvRef, id: usize, bindings: Vec<(String, Value)>) -> EnvRef {
        Rc::new(Environment {
            id,
            bindings,
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Look up a name, innermost binding first
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut env = self;
        loop {
            if let Some((_, value)) = env.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(value);
            }
            env = env.parent.as_deref()?;
        }
    }

    /// Every name visible from this environment, innermost first
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut env = Some(self);
        while let Some(current) = env {
            names.extend(current.bindings.iter().map(|(n, _)| n.as_str()));
            env = current.parent.as_deref();
        }
        names
    }
}

impl Drop for Environment {
    // Unlink long parent chains iteratively
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(env) = parent {
            match Rc::try_unwrap(env) {
                Ok(mut env) => parent = env.parent.take(),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.id)
    }
}
