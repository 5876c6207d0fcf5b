//! Lexer for reloadable scripts, built on `logos`.

use logos::Logos;
use std::path::Path;

use super::error::SyntaxError;
use super::token::{Span, Token};

/// Tokenize `source`, failing on the first unrecognized input.
pub fn tokenize(path: &Path, source: &str) -> Result<Vec<(Token, Span)>, SyntaxError> {
    let mut tokens = Vec::new();
    for (result, range) in Token::lexer(source).spanned() {
        let span = Span::from(range);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let text = span.slice(source);
                let message = if text.starts_with('"') {
                    "unterminated or malformed string literal".to_string()
                } else {
                    format!("unexpected input `{text}`")
                };
                return Err(SyntaxError::at(path, source, span, message));
            }
        }
    }
    Ok(tokens)
}
