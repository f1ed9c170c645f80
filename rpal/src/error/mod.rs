//! Error types and reporting

use crate::interp::RuntimeError;
use crate::tree::{Span, TreeError};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Error raised before evaluation starts
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("LexError at {span}: {message}")]
    Lexer { message: String, span: Span },

    #[error("ParseError at {span}: {message}")]
    Parser { message: String, span: Span },

    /// Malformed shape of a known construct
    #[error("StandardizationError at {span}: {message}")]
    Standardize { message: String, span: Span },

    /// Node kind with no standardization rule in the position it occurs
    #[error("UnsupportedConstruct at {span}: {construct}")]
    Unsupported { construct: String, span: Span },

    #[error("InvalidTreeOp: {0}")]
    Tree(#[from] TreeError),
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn standardize(message: impl Into<String>, span: Span) -> Self {
        Self::Standardize {
            message: message.into(),
            span,
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            span,
        }
    }

    /// Name of the error kind, as printed in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lexer { .. } => "LexError",
            Self::Parser { .. } => "ParseError",
            Self::Standardize { .. } => "StandardizationError",
            Self::Unsupported { .. } => "UnsupportedConstruct",
            Self::Tree(_) => "InvalidTreeOp",
        }
    }

    /// Source location, absent for synthesized nodes and tree faults
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } => Some(*span),
            Self::Standardize { span, .. } | Self::Unsupported { span, .. } => {
                (!span.is_synthetic()).then_some(*span)
            }
            Self::Tree(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Standardize { message, .. } => message.clone(),
            Self::Unsupported { construct, .. } => format!("no rule for {construct}"),
            Self::Tree(err) => err.to_string(),
        }
    }
}

/// Any failure of the source-to-value pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Report a compile error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = error.kind();
    let printed = if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(kind)
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((filename, Source::from(source)))
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind}: {}", error.message()))
            .finish()
            .eprint((filename, Source::from(source)))
    };

    if printed.is_err() {
        eprintln!("Error: {error}");
    }
}
