//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::error::{CompileError, Result};
use crate::tree::Span;
use logos::Logos;

/// Tokenize source code, dropping comments
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(Token::Comment) => {}
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                let slice = lexer.slice();
                let message = if slice.bytes().all(|b| b.is_ascii_digit()) {
                    format!("integer literal out of range: {slice}")
                } else if slice.starts_with('\'') {
                    format!("invalid string literal: {slice}")
                } else {
                    format!("unexpected character: {slice:?}")
                };
                return Err(CompileError::lexer(message, span));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("let in fn where rec within and"),
            vec![Token::Let, Token::In, Token::Fn, Token::Where, Token::Rec, Token::Within, Token::And]
        );
    }

    #[test]
    fn test_tokenize_keyword_prefix_is_identifier() {
        assert_eq!(kinds("letter"), vec![Token::Ident("letter".into())]);
        assert_eq!(kinds("in_x"), vec![Token::Ident("in_x".into())]);
    }

    #[test]
    fn test_tokenize_operator_runs() {
        assert_eq!(
            kinds("-> ** >= | ="),
            vec![
                Token::Op("->".into()),
                Token::Op("**".into()),
                Token::Op(">=".into()),
                Token::Op("|".into()),
                Token::Op("=".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_expression() {
        assert_eq!(
            kinds("f(n-1)"),
            vec![
                Token::Ident("f".into()),
                Token::LParen,
                Token::Ident("n".into()),
                Token::Op("-".into()),
                Token::Int(1),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_string_escapes() {
        assert_eq!(kinds(r"'a\tb\n\\\''"), vec![Token::Str("a\tb\n\\'".into())]);
    }

    #[test]
    fn test_tokenize_invalid_escape() {
        let err = tokenize(r"'\q'").unwrap_err();
        assert!(err.message().contains("invalid string literal"));
    }

    #[test]
    fn test_tokenize_skips_comments() {
        assert_eq!(
            kinds("x // comment here\ny"),
            vec![Token::Ident("x".into()), Token::Ident("y".into())]
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("let x").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 3));
        assert_eq!(tokens[1].1, Span::new(4, 5));
    }

    #[test]
    fn test_tokenize_integer_overflow() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert!(err.message().contains("out of range"));
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        let err = tokenize("x \u{00e9}").unwrap_err();
        assert!(err.message().contains("unexpected character"));
        assert_eq!(err.span().map(|s| s.start), Some(2));
    }

    #[test]
    fn test_tokenize_punctuation() {
        assert_eq!(kinds("( ) ; ,"), vec![Token::LParen, Token::RParen, Token::Semi, Token::Comma]);
    }
}
