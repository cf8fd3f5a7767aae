use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::Op;
use crate::bytecode::syscall::Syscall;
use crate::lang::value::Value;

/// A compiled cartridge: flat code words plus the constant pool they index.
///
/// Code layout is `opcode [operand [operand]]` repeated; operands are
/// constant-pool indices, absolute code addresses, argument counts or
/// syscall ids depending on the opcode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: Vec<u32>,
    pub constants: Vec<Value>,
    /// Declared functions in declaration order. `CALL` only ever transfers
    /// control to one of these entries.
    pub functions: Vec<FunctionEntry>,
}

/// First instruction of a declared function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub addr: u32,
}

/// A placeholder operand awaiting its jump target.
///
/// Returned by [`Chunk::emit_jump`]; the only way to fill it in is
/// [`Chunk::patch`] / [`Chunk::patch_to`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unpatched label leaves a jump to address 0"]
pub struct Label {
    operand: usize,
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub addr: usize,
    pub op: Op,
    /// First operand, 0 when the opcode has none.
    pub a: u32,
    /// Second operand (only `SYS` has one), 0 otherwise.
    pub b: u32,
}

impl Instruction {
    pub fn next_addr(&self) -> usize {
        self.addr + self.op.width()
    }
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("address {0} does not fit in a code word")]
    AddressOverflow(usize),
    #[error("unknown opcode {code} at {addr:04}")]
    UnknownOpcode { addr: usize, code: u32 },
    #[error("instruction at {addr:04} is missing its operand")]
    TruncatedInstruction { addr: usize },
    #[error("constant index {index} at {addr:04} is out of range")]
    ConstantOutOfRange { addr: usize, index: u32 },
    #[error("jump target {target} at {addr:04} is out of range")]
    JumpOutOfRange { addr: usize, target: u32 },
    #[error("unknown syscall id {id} at {addr:04}")]
    UnknownSyscall { addr: usize, id: u32 },
    #[error("function '{name}' starts at {addr:04}, which is not an instruction")]
    BadFunctionEntry { name: String, addr: u32 },
    #[error("malformed cartridge image: {0}")]
    Decode(#[from] postcard::Error),
}

pub fn to_word(value: usize) -> Result<u32, ChunkError> {
    u32::try_from(value).map_err(|_| ChunkError::AddressOverflow(value))
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the next instruction to be emitted.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn emit(&mut self, op: Op) {
        self.code.push(op.code());
    }

    pub fn emit_with(&mut self, op: Op, operand: u32) {
        self.code.push(op.code());
        self.code.push(operand);
    }

    pub fn emit_sys(&mut self, id: u32, argc: u32) {
        self.code.push(Op::Sys.code());
        self.code.push(id);
        self.code.push(argc);
    }

    /// Records `name` as a function whose body starts at `addr`.
    pub fn declare_function(&mut self, name: &str, addr: usize) -> Result<(), ChunkError> {
        self.functions.push(FunctionEntry {
            name: name.to_string(),
            addr: to_word(addr)?,
        });
        Ok(())
    }

    pub fn is_function_entry(&self, addr: usize) -> bool {
        self.functions.iter().any(|f| f.addr as usize == addr)
    }

    /// Emits `op` (a jump) with a placeholder target.
    pub fn emit_jump(&mut self, op: Op) -> Label {
        debug_assert!(op.is_jump());
        self.emit_with(op, 0);
        Label {
            operand: self.code.len() - 1,
        }
    }

    /// Emits a jump to an already known address.
    pub fn emit_jump_to(&mut self, op: Op, target: usize) -> Result<(), ChunkError> {
        debug_assert!(op.is_jump());
        let target = to_word(target)?;
        self.emit_with(op, target);
        Ok(())
    }

    /// Points `label` at the current end of code.
    pub fn patch(&mut self, label: Label) -> Result<(), ChunkError> {
        let here = self.here();
        self.patch_to(label, here)
    }

    pub fn patch_to(&mut self, label: Label, target: usize) -> Result<(), ChunkError> {
        self.code[label.operand] = to_word(target)?;
        Ok(())
    }

    /// Decodes the instruction starting at `addr`.
    pub fn decode_at(&self, addr: usize) -> Result<Instruction, ChunkError> {
        let code = *self
            .code
            .get(addr)
            .ok_or(ChunkError::TruncatedInstruction { addr })?;
        let op = Op::from_u32(code).ok_or(ChunkError::UnknownOpcode { addr, code })?;

        let operand = |offset: usize| {
            self.code
                .get(addr + offset)
                .copied()
                .ok_or(ChunkError::TruncatedInstruction { addr })
        };

        let (a, b) = match op.operand_count() {
            0 => (0, 0),
            1 => (operand(1)?, 0),
            _ => (operand(1)?, operand(2)?),
        };

        Ok(Instruction { addr, op, a, b })
    }

    /// Decodes every instruction in order, stopping at the first bad one.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ChunkError> {
        let mut out = Vec::new();
        let mut addr = 0;
        while addr < self.code.len() {
            let inst = self.decode_at(addr)?;
            addr = inst.next_addr();
            out.push(inst);
        }
        Ok(out)
    }

    /// Checks that every instruction decodes and every constant index, jump
    /// target and syscall id it carries is in range.
    pub fn validate(&self) -> Result<(), ChunkError> {
        let instructions = self.instructions()?;

        for entry in &self.functions {
            let starts_instruction = instructions
                .binary_search_by_key(&(entry.addr as usize), |inst| inst.addr)
                .is_ok();
            if !starts_instruction {
                return Err(ChunkError::BadFunctionEntry {
                    name: entry.name.clone(),
                    addr: entry.addr,
                });
            }
        }

        for inst in instructions {
            match inst.op {
                Op::LoadConst | Op::LoadGlobal | Op::StoreGlobal => {
                    if inst.a as usize >= self.constants.len() {
                        return Err(ChunkError::ConstantOutOfRange {
                            addr: inst.addr,
                            index: inst.a,
                        });
                    }
                }
                Op::Jmp | Op::JmpIfFalse => {
                    if inst.a as usize >= self.code.len() {
                        return Err(ChunkError::JumpOutOfRange {
                            addr: inst.addr,
                            target: inst.a,
                        });
                    }
                }
                Op::Sys => {
                    if Syscall::by_id(inst.a).is_none() {
                        return Err(ChunkError::UnknownSyscall {
                            addr: inst.addr,
                            id: inst.a,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Encodes the chunk as an in-memory cartridge image.
    pub fn to_image(&self) -> Result<Vec<u8>, ChunkError> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decodes and validates a cartridge image.
    pub fn from_image(bytes: &[u8]) -> Result<Chunk, ChunkError> {
        let chunk: Chunk = postcard::from_bytes(bytes)?;
        chunk.validate()?;
        Ok(chunk)
    }
}
