//! # Spark Abstract Syntax Tree
//!
//! Produced by the parser and consumed by the bytecode compiler. The tree is
//! plain owned data: no spans, no cycles, no back references.

/// Parsed Spark program: top-level statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `function name(a, b) ... end`
    FuncDecl {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },

    /// `name(args)` used as a statement; its result is discarded.
    Call(Call),

    /// `name = value`
    Assign { name: String, value: Expr },

    /// `return [value]`
    Return(Option<Expr>),

    /// `if cond then ... [else ...] end`
    ///
    /// `else_body` is `None` both for a missing `else` and for an empty one.
    If {
        cond: Expr,
        body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },

    /// `while cond do ... end`
    While { cond: Expr, body: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Var(String),
    Call(Call),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, value: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        Some(match lexeme {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Eq,
            "~=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn neg(value: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            value: Box::new(value),
        }
    }
}
