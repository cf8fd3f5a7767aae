use std::fmt::Write;

use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints a nicer value for some tokens
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const RED: &'static str = "\x1b[31m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const BLU: &'static str = "\x1b[34m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for t in tokens {
            self.render_one(&mut out, t);
        }
        out
    }

    fn render_one(&self, out: &mut String, t: &Token) {
        let colr = if self.color { self.color(t.kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let shown = if self.show_debug_repr {
            format!("{:?}", t.lexeme)
        } else {
            match t.kind {
                TokenKind::Newline | TokenKind::Eof => String::new(),
                TokenKind::String => format!("\"{}\"", t.lexeme.escape_default()),
                _ => t.lexeme.clone(),
            }
        };

        let _ = writeln!(
            out,
            "[{:02}:{:02}] {}{:<8} {}{}",
            t.line(),
            t.col(),
            colr,
            t.kind.name(),
            shown,
            reset
        );
    }

    fn color(&self, kind: TokenKind) -> &'static str {
        match kind {
            TokenKind::Newline | TokenKind::Eof => Self::DIM,
            TokenKind::String => Self::GRN,
            TokenKind::Number => Self::CYN,
            TokenKind::Ident => Self::YEL,
            TokenKind::Keyword => Self::BLU,
            TokenKind::Op => Self::MAG,
            TokenKind::Unknown => Self::RED,
            _ => Self::RESET,
        }
    }
}
