pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod syscall;

pub use compile::{Compiler, compile};
pub use compile_error::CompileError;
pub use ir::{Chunk, ChunkError, FunctionEntry, Instruction, Label};
pub use op::Op;
pub use syscall::{ArgKind, SYSCALLS, Syscall, SyscallSpec};
