use thiserror::Error;

use crate::bytecode::ir::ChunkError;

/// A runtime fault: what went wrong and the address of the instruction
/// that caused it.
///
/// Faults are data. The VM records one, halts, and waits for the host to
/// poll it; nothing is thrown across the host boundary.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (at {ip:04})")]
pub struct Fault {
    pub kind: FaultKind,
    pub ip: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FaultKind {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("call depth limit exceeded ({limit})")]
    CallDepthExceeded { limit: usize },

    #[error("instruction pointer out of range")]
    IpOutOfRange,

    #[error("instruction is missing its operand")]
    TruncatedInstruction,

    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("unknown syscall id {0}")]
    UnknownSyscall(u32),

    #[error("bad constant index {0}")]
    BadConstant(u32),

    #[error("type error: {op} expects {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("{name} takes {signature}, called with {got} arguments")]
    SyscallArity {
        name: &'static str,
        signature: String,
        got: usize,
    },

    #[error("{name} argument {index} must be a {expected}, got {got}")]
    SyscallArgument {
        name: &'static str,
        index: usize,
        expected: &'static str,
        got: String,
    },

    #[error("instruction budget of {budget} exhausted")]
    BudgetExhausted { budget: usize },
}

impl From<ChunkError> for FaultKind {
    fn from(e: ChunkError) -> Self {
        match e {
            ChunkError::UnknownOpcode { code, .. } => FaultKind::UnknownOpcode(code),
            ChunkError::ConstantOutOfRange { index, .. } => FaultKind::BadConstant(index),
            ChunkError::UnknownSyscall { id, .. } => FaultKind::UnknownSyscall(id),
            ChunkError::JumpOutOfRange { .. } | ChunkError::BadFunctionEntry { .. } => {
                FaultKind::IpOutOfRange
            }
            ChunkError::TruncatedInstruction { .. }
            | ChunkError::AddressOverflow(_)
            | ChunkError::Decode(_) => FaultKind::TruncatedInstruction,
        }
    }
}
