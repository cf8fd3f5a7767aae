use std::collections::HashMap;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{Chunk, to_word};
use crate::bytecode::op::Op;
use crate::bytecode::syscall::Syscall;
use crate::frontend::ast::{BinaryOp, Call, Expr, Program, Stmt, UnaryOp};
use crate::lang::value::Value;

/// Dedup key for the constant pool. Numbers are keyed by their bit pattern,
/// so `0` and `-0` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Number(u64),
    Str(String),
    Bool(bool),
    Nil,
}

impl ConstKey {
    fn of(value: &Value) -> ConstKey {
        match value {
            Value::Number(n) => ConstKey::Number(n.to_bits()),
            Value::Str(s) => ConstKey::Str(s.clone()),
            Value::Bool(b) => ConstKey::Bool(*b),
            Value::Nil => ConstKey::Nil,
        }
    }
}

/// Single-pass AST to bytecode compiler.
///
/// Functions are compiled inline where they are declared, behind a jump that
/// skips their body; the declaration itself stores the body's address into
/// the function's global slot.
pub struct Compiler {
    chunk: Chunk,
    constants: HashMap<ConstKey, u32>,
    max_constants: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            chunk: Chunk::new(),
            constants: HashMap::new(),
            max_constants: u32::MAX as usize,
        }
    }

    /// Caps the constant pool at `limit` entries.
    pub fn with_constant_limit(mut self, limit: usize) -> Self {
        self.max_constants = limit.min(u32::MAX as usize);
        self
    }

    pub fn compile_program(mut self, program: &Program) -> Result<Chunk, CompileError> {
        self.compile_block(&program.body)?;
        self.chunk.emit(Op::Halt);
        log::debug!(
            "compiled {} code words, {} constants",
            self.chunk.len(),
            self.chunk.constants.len()
        );
        Ok(self.chunk)
    }

    fn add_const(&mut self, value: Value) -> Result<u32, CompileError> {
        let key = ConstKey::of(&value);
        if let Some(&index) = self.constants.get(&key) {
            return Ok(index);
        }

        let index = self.chunk.constants.len();
        if index >= self.max_constants {
            return Err(CompileError::ConstantPoolOverflow {
                limit: self.max_constants,
            });
        }
        let index = to_word(index)?;
        self.chunk.constants.push(value);
        self.constants.insert(key, index);
        Ok(index)
    }

    fn name_const(&mut self, name: &str) -> Result<u32, CompileError> {
        self.add_const(Value::Str(name.to_string()))
    }

    fn emit_const(&mut self, value: Value) -> Result<(), CompileError> {
        let k = self.add_const(value)?;
        self.chunk.emit_with(Op::LoadConst, k);
        Ok(())
    }

    fn compile_block(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::FuncDecl { name, params, body } => self.compile_function(name, params, body),

            Stmt::Call(call) => {
                self.compile_call(call)?;
                self.chunk.emit(Op::Pop);
                Ok(())
            }

            Stmt::Assign { name, value } => {
                self.compile_expr(value)?;
                let k = self.name_const(name)?;
                self.chunk.emit_with(Op::StoreGlobal, k);
                Ok(())
            }

            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => self.emit_const(Value::Nil)?,
                }
                self.chunk.emit(Op::Ret);
                Ok(())
            }

            Stmt::If {
                cond,
                body,
                else_body,
            } => self.compile_if(cond, body, else_body.as_deref()),

            Stmt::While { cond, body } => self.compile_while(cond, body),
        }
    }

    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        let skip = self.chunk.emit_jump(Op::Jmp);
        let start = self.chunk.here();

        // arguments were pushed left to right, so the last one is on top
        for param in params.iter().rev() {
            let k = self.name_const(param)?;
            self.chunk.emit_with(Op::StoreGlobal, k);
        }

        self.compile_block(body)?;

        if !matches!(body.last(), Some(Stmt::Return(_))) {
            self.emit_const(Value::Nil)?;
            self.chunk.emit(Op::Ret);
        }

        self.chunk.patch(skip)?;

        self.chunk.declare_function(name, start)?;
        self.emit_const(Value::Number(start as f64))?;
        let k = self.name_const(name)?;
        self.chunk.emit_with(Op::StoreGlobal, k);
        Ok(())
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        body: &[Stmt],
        else_body: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        self.compile_expr(cond)?;
        let to_else = self.chunk.emit_jump(Op::JmpIfFalse);
        self.compile_block(body)?;

        match else_body {
            Some(else_body) => {
                let to_end = self.chunk.emit_jump(Op::Jmp);
                self.chunk.patch(to_else)?;
                self.compile_block(else_body)?;
                self.chunk.patch(to_end)?;
            }
            None => self.chunk.patch(to_else)?,
        }
        Ok(())
    }

    fn compile_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let start = self.chunk.here();
        self.compile_expr(cond)?;
        let exit = self.chunk.emit_jump(Op::JmpIfFalse);
        self.compile_block(body)?;
        self.chunk.emit_jump_to(Op::Jmp, start)?;
        self.chunk.patch(exit)?;
        Ok(())
    }

    /// Leaves exactly one value on the stack: the call's result.
    fn compile_call(&mut self, call: &Call) -> Result<(), CompileError> {
        for arg in &call.args {
            self.compile_expr(arg)?;
        }

        let argc = u32::try_from(call.args.len()).map_err(|_| CompileError::TooManyArguments {
            name: call.name.clone(),
            count: call.args.len(),
        })?;

        if let Some(spec) = Syscall::by_name(&call.name) {
            self.chunk.emit_sys(spec.id, argc);
        } else {
            let k = self.name_const(&call.name)?;
            self.chunk.emit_with(Op::LoadConst, k);
            self.chunk.emit_with(Op::Call, argc);
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => self.emit_const(Value::Number(*n)),
            Expr::String(s) => self.emit_const(Value::Str(s.clone())),

            Expr::Var(name) => {
                let k = self.name_const(name)?;
                self.chunk.emit_with(Op::LoadGlobal, k);
                Ok(())
            }

            Expr::Call(call) => self.compile_call(call),

            Expr::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.chunk.emit(binary_op(*op));
                Ok(())
            }

            Expr::Unary { op, value } => {
                self.compile_expr(value)?;
                match op {
                    UnaryOp::Neg => self.chunk.emit(Op::Neg),
                }
                Ok(())
            }
        }
    }
}

fn binary_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::NotEq => Op::Neq,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::LtEq => Op::Lte,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::GtEq => Op::Gte,
    }
}

/// Compiles a parsed program with default limits.
pub fn compile(program: &Program) -> Result<Chunk, CompileError> {
    Compiler::new().compile_program(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_source;

    fn compile_src(source: &str) -> Chunk {
        let program = parse_source(source).expect("parse should succeed");
        compile(&program).expect("compile should succeed")
    }

    fn ops(chunk: &Chunk) -> Vec<Op> {
        chunk
            .instructions()
            .expect("chunk should decode")
            .into_iter()
            .map(|i| i.op)
            .collect()
    }

    fn assert_jumps_in_bounds(chunk: &Chunk) {
        for inst in chunk.instructions().unwrap() {
            if inst.op.is_jump() {
                assert!(
                    (inst.a as usize) < chunk.len(),
                    "jump at {:04} targets {} (len {})",
                    inst.addr,
                    inst.a,
                    chunk.len()
                );
            }
        }
    }

    #[test]
    fn test_empty_program_is_halt() {
        let chunk = compile_src("");
        assert_eq!(chunk.code, vec![Op::Halt.code()]);
        assert!(chunk.constants.is_empty());
    }

    #[test]
    fn test_assignment() {
        let chunk = compile_src("x = 1 + 2");
        assert_eq!(
            ops(&chunk),
            vec![Op::LoadConst, Op::LoadConst, Op::Add, Op::StoreGlobal, Op::Halt]
        );
        assert_eq!(
            chunk.constants,
            vec![Value::Number(1.0), Value::Number(2.0), Value::Str("x".into())]
        );
    }

    #[test]
    fn test_constants_are_deduplicated() {
        let chunk = compile_src("x = 1\ny = 1\nx = \"x\"");
        assert_eq!(
            chunk.constants,
            vec![Value::Number(1.0), Value::Str("x".into()), Value::Str("y".into())]
        );
    }

    #[test]
    fn test_call_statement_pops_result() {
        let chunk = compile_src("cls()\nfoo(1)");
        assert_eq!(
            ops(&chunk),
            vec![
                Op::Sys,
                Op::Pop,
                Op::LoadConst,
                Op::LoadConst,
                Op::Call,
                Op::Pop,
                Op::Halt
            ]
        );
        let sys = chunk.decode_at(0).unwrap();
        assert_eq!((sys.a, sys.b), (5, 0));
        let call = chunk.decode_at(8).unwrap();
        assert_eq!((call.op, call.a), (Op::Call, 1));
    }

    #[test]
    fn test_syscall_names_cannot_be_overridden() {
        let chunk = compile_src("function cls()\nend\ncls()");
        let sys: Vec<_> = chunk
            .instructions()
            .unwrap()
            .into_iter()
            .filter(|i| i.op == Op::Sys)
            .collect();
        assert_eq!(sys.len(), 1);
        assert!(!ops(&chunk).contains(&Op::Call));
    }

    #[test]
    fn test_if_else_layout() {
        let chunk = compile_src("if 10 > 50 then res = 1 else res = 2 end");
        let insts = chunk.instructions().unwrap();
        let jif = insts.iter().find(|i| i.op == Op::JmpIfFalse).unwrap();
        let jmp = insts.iter().find(|i| i.op == Op::Jmp).unwrap();

        // false branch starts right after the unconditional jump
        assert_eq!(jif.a as usize, jmp.next_addr());
        // the unconditional jump lands on HALT
        assert_eq!(chunk.decode_at(jmp.a as usize).unwrap().op, Op::Halt);
        assert_jumps_in_bounds(&chunk);
    }

    #[test]
    fn test_while_jumps_back_to_condition() {
        let chunk = compile_src("while n > 0 do n = n - 1 end");
        let insts = chunk.instructions().unwrap();
        let back = insts.iter().find(|i| i.op == Op::Jmp).unwrap();
        let exit = insts.iter().find(|i| i.op == Op::JmpIfFalse).unwrap();

        assert_eq!(back.a, 0);
        assert_eq!(exit.a as usize, back.next_addr());
        assert_jumps_in_bounds(&chunk);
    }

    #[test]
    fn test_function_layout() {
        let chunk = compile_src("function add(a, b)\nreturn a + b\nend");
        let insts = chunk.instructions().unwrap();

        assert_eq!(insts[0].op, Op::Jmp);
        // params stored last-first
        assert_eq!(insts[1].op, Op::StoreGlobal);
        assert_eq!(chunk.constants[insts[1].a as usize], Value::Str("b".into()));
        assert_eq!(chunk.constants[insts[2].a as usize], Value::Str("a".into()));

        // explicit return: no implicit nil epilogue
        let rets = insts.iter().filter(|i| i.op == Op::Ret).count();
        assert_eq!(rets, 1);
        assert!(!chunk.constants.contains(&Value::Nil));

        // skip jump lands on the address store
        let after = chunk.decode_at(insts[0].a as usize).unwrap();
        assert_eq!(after.op, Op::LoadConst);
        assert_eq!(chunk.constants[after.a as usize], Value::Number(2.0));
        assert_jumps_in_bounds(&chunk);

        assert_eq!(chunk.functions.len(), 1);
        assert_eq!(chunk.functions[0].name, "add");
        assert_eq!(chunk.functions[0].addr, 2);
        chunk.validate().unwrap();
    }

    #[test]
    fn test_function_without_return_gets_nil_epilogue() {
        let chunk = compile_src("function f()\nx = 1\nend");
        let insts = chunk.instructions().unwrap();
        let ret = insts.iter().position(|i| i.op == Op::Ret).unwrap();
        let nil = insts[ret - 1];
        assert_eq!(nil.op, Op::LoadConst);
        assert_eq!(chunk.constants[nil.a as usize], Value::Nil);
    }

    #[test]
    fn test_bare_return_pushes_nil() {
        let chunk = compile_src("function f()\nreturn\nend");
        assert!(chunk.constants.contains(&Value::Nil));
    }

    #[test]
    fn test_nested_control_flow_jumps_in_bounds() {
        let chunk = compile_src(
            "function tick()\n\
               i = 0\n\
               while i < 10 do\n\
                 if i % 2 == 0 then\n\
                   if i > 4 then log(i) end\n\
                 else\n\
                   i = i + 0\n\
                 end\n\
                 i = i + 1\n\
               end\n\
             end\n\
             if 1 then end\n\
             while 0 do end",
        );
        assert_jumps_in_bounds(&chunk);
        chunk.validate().unwrap();
    }

    #[test]
    fn test_constant_pool_limit() {
        let program = parse_source("a = 1\nb = 2").unwrap();
        let err = Compiler::new()
            .with_constant_limit(3)
            .compile_program(&program)
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::ConstantPoolOverflow { limit: 3 }
        ));
    }
}
