use thiserror::Error;

use crate::frontend::token::{Token, TokenKind};

/// A parsing error with the offending token.
///
/// `line` and `col` are 1-based positions coming from the lexer spans. Parsing
/// stops at the first error; there is no recovery.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{col}: {message} (got {kind} '{lexeme}')")]
pub struct ParserError {
    pub message: String,
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl ParserError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        ParserError {
            message: message.into(),
            kind: token.kind,
            lexeme: token.lexeme.clone(),
            line: token.line(),
            col: token.col(),
        }
    }
}
