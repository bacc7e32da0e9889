//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                let slice = lexer.slice();
                let message = if slice.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("integer literal out of range: {slice}")
                } else if slice.starts_with('"') {
                    "unterminated string literal".to_string()
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
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   \t\t\n\n\r\n   ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_control_flow_keywords() {
        assert_eq!(
            kinds("if else while for return break continue"),
            vec![
                Token::If,
                Token::Else,
                Token::While,
                Token::For,
                Token::Return,
                Token::Break,
                Token::Continue,
            ]
        );
    }

    #[test]
    fn test_tokenize_function_definition() {
        assert_eq!(
            kinds("add(a, b) { return a + b; }"),
            vec![
                Token::Ident("add".into()),
                Token::LParen,
                Token::Ident("a".into()),
                Token::Comma,
                Token::Ident("b".into()),
                Token::RParen,
                Token::LBrace,
                Token::Return,
                Token::Ident("a".into()),
                Token::Plus,
                Token::Ident("b".into()),
                Token::Semi,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_tokenize_for_header() {
        assert_eq!(
            kinds("for (v : xs) {}"),
            vec![
                Token::For,
                Token::LParen,
                Token::Ident("v".into()),
                Token::Colon,
                Token::Ident("xs".into()),
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("x = 10").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 1));
        assert_eq!(tokens[1].1, Span::new(2, 3));
        assert_eq!(tokens[2].1, Span::new(4, 6));
    }

    #[test]
    fn test_tokenize_negative_integer_as_minus_then_int() {
        assert_eq!(kinds("-42"), vec![Token::Minus, Token::IntLit(42)]);
    }

    #[test]
    fn test_tokenize_unexpected_character_error() {
        let err = tokenize("x = `").unwrap_err();
        assert!(err.message().contains("unexpected character"));
        assert_eq!(err.span(), Some(Span::new(4, 5)));
    }

    #[test]
    fn test_tokenize_integer_out_of_range() {
        let err = tokenize("x = 123456789012345678901234").unwrap_err();
        assert!(err.message().contains("out of range"));
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let err = tokenize("print(\"abc").unwrap_err();
        assert_eq!(err.message(), "unterminated string literal");
    }
}
