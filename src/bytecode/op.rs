// =============================================================================
// OP - Bytecode instructions
// =============================================================================
//
// The numeric ids are the bytecode format: the compiler writes them, the VM
// and the disassembler read them. Never renumber an existing opcode.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Op {
    Halt = 0,
    /// `[k]` push `constants[k]`
    LoadConst = 1,
    /// `[k]` push the global named `constants[k]` (0 when unset)
    LoadGlobal = 2,
    /// `[k]` pop into the global named `constants[k]`
    StoreGlobal = 3,
    Pop = 4,

    // arithmetic
    Add = 10,
    Sub = 11,
    Mul = 12,
    Div = 13,
    Neg = 14,
    Mod = 15,

    // comparison
    Eq = 20,
    Neq = 21,
    Lt = 22,
    Lte = 23,
    Gt = 24,
    Gte = 25,

    /// `[addr]` absolute jump
    Jmp = 30,
    /// `[addr]` pop, jump if falsy
    JmpIfFalse = 31,

    /// `[argc]` pop callee reference, call it
    Call = 40,
    Ret = 41,
    /// `[id, argc]` host primitive
    Sys = 42,
}

impl Op {
    pub const ALL: [Op; 22] = [
        Op::Halt,
        Op::LoadConst,
        Op::LoadGlobal,
        Op::StoreGlobal,
        Op::Pop,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Neg,
        Op::Mod,
        Op::Eq,
        Op::Neq,
        Op::Lt,
        Op::Lte,
        Op::Gt,
        Op::Gte,
        Op::Jmp,
        Op::JmpIfFalse,
        Op::Call,
        Op::Ret,
        Op::Sys,
    ];

    pub fn from_u32(code: u32) -> Option<Op> {
        Some(match code {
            0 => Op::Halt,
            1 => Op::LoadConst,
            2 => Op::LoadGlobal,
            3 => Op::StoreGlobal,
            4 => Op::Pop,
            10 => Op::Add,
            11 => Op::Sub,
            12 => Op::Mul,
            13 => Op::Div,
            14 => Op::Neg,
            15 => Op::Mod,
            20 => Op::Eq,
            21 => Op::Neq,
            22 => Op::Lt,
            23 => Op::Lte,
            24 => Op::Gt,
            25 => Op::Gte,
            30 => Op::Jmp,
            31 => Op::JmpIfFalse,
            40 => Op::Call,
            41 => Op::Ret,
            42 => Op::Sys,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Number of operand words following the opcode.
    pub fn operand_count(self) -> usize {
        match self {
            Op::LoadConst
            | Op::LoadGlobal
            | Op::StoreGlobal
            | Op::Jmp
            | Op::JmpIfFalse
            | Op::Call => 1,
            Op::Sys => 2,
            _ => 0,
        }
    }

    /// Total instruction width in code words.
    pub fn width(self) -> usize {
        1 + self.operand_count()
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Op::Jmp | Op::JmpIfFalse)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Halt => "HALT",
            Op::LoadConst => "LOAD_CONST",
            Op::LoadGlobal => "LOAD_GLOBAL",
            Op::StoreGlobal => "STORE_GLOBAL",
            Op::Pop => "POP",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Neg => "NEG",
            Op::Mod => "MOD",
            Op::Eq => "EQ",
            Op::Neq => "NEQ",
            Op::Lt => "LT",
            Op::Lte => "LTE",
            Op::Gt => "GT",
            Op::Gte => "GTE",
            Op::Jmp => "JMP",
            Op::JmpIfFalse => "JMP_IF_FALSE",
            Op::Call => "CALL",
            Op::Ret => "RET",
            Op::Sys => "SYS",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.mnemonic())
    }
}
