use crate::frontend::token::{KEYWORDS, Token, TokenKind};

/// Hand-written scanner.
///
/// Lexing never fails: characters that do not start any known form come out
/// as `UNKNOWN` tokens and are reported by the parser when it reaches them.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Position just past the closing quote of the string starting at `pos`,
    /// or `None` when the input ends first.
    fn string_end(&self) -> Option<usize> {
        let mut i = self.pos + 1;
        while let Some(&ch) = self.source.get(i) {
            match ch {
                '"' => return Some(i + 1),
                '\\' => i += 2,
                _ => i += 1,
            }
        }
        None
    }

    fn read_string(&mut self, end: usize) -> String {
        self.advance(); // opening quote

        let mut string = String::new();
        while self.pos < end - 1 {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some('"') => string.push('"'),
                    Some('\\') => string.push('\\'),
                    Some('n') => string.push('\n'),
                    Some(other) => {
                        string.push('\\');
                        string.push(other);
                    }
                    None => string.push('\\'),
                },
                Some(ch) => string.push(ch),
                None => break,
            }
        }
        self.advance(); // closing quote
        string
    }

    fn read_number(&mut self) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current().filter(char::is_ascii_digit) {
            digits.push(ch);
            self.advance();
        }

        // Only treat '.' as a decimal point if followed by a digit
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push('.');
            self.advance();
            while let Some(ch) = self.current().filter(char::is_ascii_digit) {
                digits.push(ch);
                self.advance();
            }
        }

        digits
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_operator(&mut self) -> Option<String> {
        let ch = self.current()?;
        let next = self.peek();

        let op = match (ch, next) {
            ('=', Some('=')) => "==",
            ('~', Some('=')) => "~=",
            ('<', Some('=')) => "<=",
            ('>', Some('=')) => ">=",
            ('+', _) => "+",
            ('-', _) => "-",
            ('*', _) => "*",
            ('/', _) => "/",
            ('%', _) => "%",
            ('<', _) => "<",
            ('>', _) => ">",
            ('=', _) => "=",
            _ => return None,
        };

        for _ in 0..op.len() {
            self.advance();
        }
        Some(op.to_string())
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let (line, col) = (self.line, self.col);

            let Some(ch) = self.current() else {
                tokens.push(Token::new(TokenKind::Eof, "", line, col));
                break;
            };

            match ch {
                '-' if self.peek() == Some('-') => self.skip_comment(),
                '\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, "\\n", line, col));
                }
                ' ' | '\t' | '\r' => self.skip_whitespace(),
                '"' => match self.string_end() {
                    Some(end) => {
                        let text = self.read_string(end);
                        tokens.push(Token::new(TokenKind::String, text, line, col));
                    }
                    None => {
                        // unterminated: the quote alone is garbage, keep lexing after it
                        self.advance();
                        tokens.push(Token::new(TokenKind::Unknown, "\"", line, col));
                    }
                },
                c if c.is_ascii_digit() => {
                    let digits = self.read_number();
                    tokens.push(Token::new(TokenKind::Number, digits, line, col));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let ident = self.read_identifier();
                    let kind = if KEYWORDS.contains(&ident.as_str()) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Ident
                    };
                    tokens.push(Token::new(kind, ident, line, col));
                }
                _ => {
                    if let Some(op) = self.read_operator() {
                        tokens.push(Token::new(TokenKind::Op, op, line, col));
                        continue;
                    }

                    let kind = match ch {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        _ => TokenKind::Unknown,
                    };
                    self.advance();
                    tokens.push(Token::new(kind, ch.to_string(), line, col));
                }
            }
        }

        tokens
    }
}

/// Convenience wrapper: lex a whole source string.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
