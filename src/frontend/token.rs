/// Reserved words of the language.
pub const KEYWORDS: [&str; 8] = [
    "function", "end", "if", "then", "else", "while", "do", "return",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Newline,
    Keyword,
    Ident,
    Number,
    String,
    Op,
    LParen,
    RParen,
    Comma,
    Colon,
    Eof,
    Unknown,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Newline => "NEWLINE",
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Ident => "IDENT",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Op => "OP",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Comma => "COMMA",
            TokenKind::Colon => "COLON",
            TokenKind::Eof => "EOF",
            TokenKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 1-based source position of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

/// A lexed token.
///
/// `lexeme` holds the source text of the token, except for strings, where it
/// holds the unescaped contents without the surrounding quotes, and newlines,
/// where it holds the two characters `\n` so diagnostics stay on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            span: Span { line, col },
        }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn col(&self) -> usize {
        self.span.col
    }

    /// True for a keyword token spelled `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == word
    }

    /// True for an operator token spelled `op`.
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.lexeme == op
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "{}(\"{}\")", self.kind, self.lexeme),
            TokenKind::Eof => write!(f, "EOF"),
            _ => write!(f, "{}({})", self.kind, self.lexeme),
        }
    }
}
