//! Source text to AST: tokens, lexer, recursive-descent parser.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

pub use ast::Program;
pub use lexer::tokenize;
pub use parser::parse_tokens;
pub use parser_error::ParserError;

/// Lexes and parses a whole source string.
pub fn parse_source(source: &str) -> Result<Program, ParserError> {
    parse_tokens(tokenize(source))
}
