//! Token definitions

use crate::tree::escape_str;
use logos::Logos;

/// Decode the body of a single-quoted RPAL string
fn unescape(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                '\\' => result.push('\\'),
                '\'' => result.push('\''),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// RPAL token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("fn")]
    Fn,
    #[token("where")]
    Where,
    #[token("aug")]
    Aug,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("gr")]
    Gr,
    #[token("ge")]
    Ge,
    #[token("ls")]
    Ls,
    #[token("le")]
    Le,
    #[token("eq")]
    Eq,
    #[token("ne")]
    Ne,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,
    #[token("dummy")]
    Dummy,
    #[token("within")]
    Within,
    #[token("and")]
    And,
    #[token("rec")]
    Rec,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"'([^'\\]|\\.)*'", unescape)]
    Str(String),

    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    /// Maximal run of operator symbols, e.g. `->`, `**`, `>=`
    #[regex(r#"[+\-*<>&.@/:=~|$!#%^_\[\]{}"`?]+"#, |lex| lex.slice().to_string())]
    Op(String),

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    /// Line comment, dropped by `tokenize`
    #[regex(r"//[^\n]*", priority = 20)]
    Comment,
}

impl Token {
    pub fn is_op(&self, symbol: &str) -> bool {
        matches!(self, Token::Op(s) if s == symbol)
    }

    /// Name of the token class for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Token::Int(_) => "integer".to_string(),
            Token::Str(_) => "string".to_string(),
            Token::Ident(_) => "identifier".to_string(),
            other => format!("'{other}'"),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Let => write!(f, "let"),
            Token::In => write!(f, "in"),
            Token::Fn => write!(f, "fn"),
            Token::Where => write!(f, "where"),
            Token::Aug => write!(f, "aug"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Gr => write!(f, "gr"),
            Token::Ge => write!(f, "ge"),
            Token::Ls => write!(f, "ls"),
            Token::Le => write!(f, "le"),
            Token::Eq => write!(f, "eq"),
            Token::Ne => write!(f, "ne"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Nil => write!(f, "nil"),
            Token::Dummy => write!(f, "dummy"),
            Token::Within => write!(f, "within"),
            Token::And => write!(f, "and"),
            Token::Rec => write!(f, "rec"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{}'", escape_str(s)),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Op(s) => write!(f, "{s}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Semi => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::Comment => write!(f, "//"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keywords() {
        assert_eq!(format!("{}", Token::Let), "let");
        assert_eq!(format!("{}", Token::Within), "within");
        assert_eq!(format!("{}", Token::Rec), "rec");
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(format!("{}", Token::Int(42)), "42");
        assert_eq!(format!("{}", Token::Str("a\nb".into())), "'a\\nb'");
        assert_eq!(format!("{}", Token::Ident("Print".into())), "Print");
        assert_eq!(format!("{}", Token::Op("->".into())), "->");
    }

    #[test]
    fn test_describe() {
        assert_eq!(Token::Int(1).describe(), "integer");
        assert_eq!(Token::In.describe(), "'in'");
        assert_eq!(Token::Op("|".into()).describe(), "'|'");
    }

    #[test]
    fn test_is_op() {
        assert!(Token::Op("=".into()).is_op("="));
        assert!(!Token::Op("==".into()).is_op("="));
        assert!(!Token::Eq.is_op("eq"));
    }
}
