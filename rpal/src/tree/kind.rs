//! Node kinds, payloads and the operator table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying a syntactic or core construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // Expressions
    Let,
    Lambda,
    Where,
    Tau,
    Cond,
    /// Binary operator, payload is `Payload::Op`
    Binary,
    /// Unary operator, payload is `Payload::Op`
    Unary,
    At,
    Gamma,

    // Definitions
    Within,
    And,
    Rec,
    Equal,
    FunctionForm,

    // Binders
    Comma,
    Empty,

    // Leaves
    Identifier,
    Integer,
    Str,
    True,
    False,
    Nil,
    Dummy,

    // Core-only leaves produced by the standardizer
    YStar,
    /// Operator reference, payload is `Payload::Op`
    Operator,
}

/// Fixed child count of a node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl NodeKind {
    /// Child count accepted in a raw AST
    pub fn arity(self) -> Arity {
        use NodeKind::*;
        match self {
            Let | Where | Gamma | Within | Equal | Binary => Arity::Exactly(2),
            Lambda => Arity::AtLeast(2),
            Tau | And | Comma => Arity::AtLeast(2),
            Cond | At => Arity::Exactly(3),
            Unary | Rec => Arity::Exactly(1),
            FunctionForm => Arity::AtLeast(3),
            Empty | Identifier | Integer | Str | True | False | Nil | Dummy | YStar | Operator => {
                Arity::Exactly(0)
            }
        }
    }

    /// Child count required in a standardized tree, `None` for kinds that
    /// must not survive standardization
    pub fn core_arity(self) -> Option<Arity> {
        use NodeKind::*;
        match self {
            Lambda | Gamma => Some(Arity::Exactly(2)),
            Tau | Comma => Some(Arity::AtLeast(2)),
            Cond => Some(Arity::Exactly(3)),
            Empty | Identifier | Integer | Str | True | False | Nil | Dummy | YStar | Operator => {
                Some(Arity::Exactly(0))
            }
            Let | Where | Binary | Unary | At | Within | And | Rec | Equal | FunctionForm => {
                None
            }
        }
    }

    /// Kinds allowed as the bound-variable pattern of a lambda
    pub fn is_binder(self) -> bool {
        matches!(self, NodeKind::Identifier | NodeKind::Comma | NodeKind::Empty)
    }

    /// Label used by the tree dump
    pub fn label(self) -> &'static str {
        use NodeKind::*;
        match self {
            Let => "let",
            Lambda => "lambda",
            Where => "where",
            Tau => "tau",
            Cond => "->",
            Binary => "binop",
            Unary => "unop",
            At => "@",
            Gamma => "gamma",
            Within => "within",
            And => "and",
            Rec => "rec",
            Equal => "=",
            FunctionForm => "function_form",
            Comma => ",",
            Empty => "()",
            Identifier => "<ID>",
            Integer => "<INT>",
            Str => "<STR>",
            True => "<true>",
            False => "<false>",
            Nil => "<nil>",
            Dummy => "<dummy>",
            YStar => "<Y*>",
            Operator => "<op>",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Built-in operators with their RPAL spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Aug,
    Or,
    Amp,
    Not,
    Gr,
    Ge,
    Ls,
    Le,
    Eq,
    Ne,
    Plus,
    Minus,
    Neg,
    Mul,
    Div,
    Pow,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Aug => "aug",
            Operator::Or => "or",
            Operator::Amp => "&",
            Operator::Not => "not",
            Operator::Gr => "gr",
            Operator::Ge => "ge",
            Operator::Ls => "ls",
            Operator::Le => "le",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Neg => "neg",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Pow => "**",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Literal or identifier value carried by leaf nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Ident(String),
    Int(i64),
    Str(String),
    Op(Operator),
}

impl Payload {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Payload::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_op(&self) -> Option<Operator> {
        match self {
            Payload::Op(op) => Some(*op),
            _ => None,
        }
    }
}
