use crate::frontend::ast::{BinaryOp, Call, Expr, Program, Stmt};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::{Token, TokenKind};

/// Deepest expression tree or block nesting the parser accepts. Later stages
/// recurse over the tree, so this also bounds their stack use.
pub const MAX_DEPTH: usize = 64;

/// Recursive-descent parser for Spark.
///
/// Consumes the lexer's token stream (newlines included, they separate
/// statements) and produces a `Program`. One token of lookahead, no error
/// recovery: the first unexpected token aborts the whole parse.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open parentheses, unary operators, call argument lists and blocks.
    depth: usize,
    /// Height of the expression the last expression parser returned.
    height: usize,
}

type ParseResult<T> = Result<T, ParserError>;

impl Parser {
    /// Creates a parser from lexer output.
    ///
    /// A trailing `EOF` is appended when missing so `peek` always has a token
    /// to return.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let line = tokens.last().map_or(1, Token::line);
            tokens.push(Token::new(TokenKind::Eof, "", line, 1));
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            height: 0,
        }
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    fn error(&self, message: impl Into<String>) -> ParserError {
        ParserError::at(self.peek(), message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ParseResult<Token> {
        if self.check_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{}'", word)))
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Records the height of the expression about to be returned.
    fn set_height(&mut self, height: usize, at: &Token) -> ParseResult<()> {
        if height > MAX_DEPTH {
            return Err(ParserError::at(at, "expression nested too deeply"));
        }
        self.height = height;
        Ok(())
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Parses a complete program, stopping at `EOF`.
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();

        self.skip_newlines();
        while !self.check(TokenKind::Eof) {
            body.push(self.parse_statement()?);
            self.skip_newlines();
        }

        Ok(Program { body })
    }

    /// Parses statements until one of the `terminators` keywords, which is
    /// left unconsumed.
    fn parse_block(&mut self, terminators: &[&str]) -> ParseResult<Vec<Stmt>> {
        self.nested(|p| p.parse_block_body(terminators))
    }

    fn parse_block_body(&mut self, terminators: &[&str]) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();

        self.skip_newlines();
        while !terminators.iter().any(|word| self.check_keyword(word)) {
            if self.check(TokenKind::Eof) {
                let expected = terminators
                    .iter()
                    .map(|w| format!("'{}'", w))
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.error(format!("unexpected end of input, expected {}", expected)));
            }
            body.push(self.parse_statement()?);
            self.skip_newlines();
        }

        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let kind = self.peek().kind;
        let lexeme = self.peek().lexeme.clone();

        match kind {
            TokenKind::Keyword => match lexeme.as_str() {
                "function" => self.parse_function(),
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "return" => self.parse_return(),
                _ => Err(self.error("unexpected keyword at start of statement")),
            },
            TokenKind::Ident => {
                let name = self.advance().lexeme;

                if self.check(TokenKind::LParen) {
                    Ok(Stmt::Call(self.parse_call_suffix(name)?))
                } else if self.peek().is_op("=") {
                    self.advance();
                    let value = self.parse_expression()?;
                    Ok(Stmt::Assign { name, value })
                } else {
                    Err(self.error(format!("expected '(' or '=' after '{}'", name)))
                }
            }
            _ => Err(self.error("unexpected token at start of statement")),
        }
    }

    /// ```text
    /// function <name>(<params>) <body> end
    /// ```
    fn parse_function(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("function")?;
        let name = self.expect(TokenKind::Ident, "function name")?.lexeme;
        self.expect(TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        if self.check(TokenKind::Ident) {
            params.push(self.advance().lexeme);
            while self.check(TokenKind::Comma) {
                self.advance();
                params.push(self.expect(TokenKind::Ident, "parameter name")?.lexeme);
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;

        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;

        Ok(Stmt::FuncDecl { name, params, body })
    }

    /// ```text
    /// if <cond> [then | :] <body> [else <body>] end
    /// ```
    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("if")?;
        let cond = self.parse_expression()?;

        if self.check(TokenKind::Colon) || self.check_keyword("then") {
            self.advance();
        }

        let body = self.parse_block(&["end", "else"])?;

        let mut else_body = Vec::new();
        if self.check_keyword("else") {
            self.advance();
            else_body = self.parse_block(&["end"])?;
        }
        self.expect_keyword("end")?;

        let else_body = if else_body.is_empty() {
            None
        } else {
            Some(else_body)
        };
        Ok(Stmt::If {
            cond,
            body,
            else_body,
        })
    }

    /// ```text
    /// while <cond> [do] <body> end
    /// ```
    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("while")?;
        let cond = self.parse_expression()?;

        if self.check_keyword("do") {
            self.advance();
        }

        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;

        Ok(Stmt::While { cond, body })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("return")?;

        let bare = matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof)
            || self.check_keyword("end")
            || self.check_keyword("else");

        if bare {
            Ok(Stmt::Return(None))
        } else {
            Ok(Stmt::Return(Some(self.parse_expression()?)))
        }
    }

    // Expressions, lowest precedence first.

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_equality()
    }

    /// Parses one left-associative binary level: `next (op next)*`.
    fn parse_binary_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut node = next(self)?;
        let mut height = self.height;

        loop {
            let token = self.peek();
            if token.kind != TokenKind::Op || !ops.contains(&token.lexeme.as_str()) {
                break;
            }
            let op_token = self.advance();
            let op = BinaryOp::from_lexeme(&op_token.lexeme)
                .ok_or_else(|| ParserError::at(&op_token, "unknown operator"))?;
            let right = next(self)?;
            height = height.max(self.height) + 1;
            self.set_height(height, &op_token)?;
            node = Expr::binary(op, node, right);
        }

        self.height = height;
        Ok(node)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&["==", "~="], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&["<", ">", "<=", ">="], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&["+", "-"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&["*", "/", "%"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.peek().is_op("-") {
            let op_token = self.advance();
            let value = self.nested(Self::parse_unary)?;
            self.set_height(self.height + 1, &op_token)?;
            return Ok(Expr::neg(value));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek();

        match token.kind {
            TokenKind::Number => {
                let value = token
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| self.error("invalid number literal"))?;
                self.advance();
                self.height = 0;
                Ok(Expr::Number(value))
            }
            TokenKind::String => {
                self.height = 0;
                Ok(Expr::String(self.advance().lexeme))
            }
            TokenKind::Ident => {
                let name = self.advance().lexeme;
                if self.check(TokenKind::LParen) {
                    Ok(Expr::Call(self.parse_call_suffix(name)?))
                } else {
                    self.height = 0;
                    Ok(Expr::Var(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let node = self.nested(Self::parse_expression)?;
                self.expect(TokenKind::RParen, "')' to close '('")?;
                Ok(node)
            }
            _ => Err(self.error("unexpected token in expression")),
        }
    }

    /// ```text
    /// (<expr>, <expr>, ...)
    /// ```
    fn parse_call_suffix(&mut self, name: String) -> ParseResult<Call> {
        let open = self.expect(TokenKind::LParen, "'('")?;

        let mut args = Vec::new();
        let mut height = 0;
        if !self.check(TokenKind::RParen) {
            args.push(self.nested(Self::parse_expression)?);
            height = self.height;
            while self.check(TokenKind::Comma) {
                self.advance();
                args.push(self.nested(Self::parse_expression)?);
                height = height.max(self.height);
            }
        }
        self.expect(TokenKind::RParen, "')' after arguments")?;
        self.set_height(height + 1, &open)?;

        Ok(Call { name, args })
    }
}

/// Convenience wrapper: parse lexer output into a program.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParserError> {
    Parser::new(tokens).parse()
}
