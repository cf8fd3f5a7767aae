use thiserror::Error;

use crate::bytecode::ir::ChunkError;

/// Resource limits the compiler can run into.
///
/// Statement and expression kinds are closed enums, so there is no
/// "unknown node" case: everything the parser produces compiles.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("too many constants: the pool is limited to {limit} entries")]
    ConstantPoolOverflow { limit: usize },

    #[error("call to '{name}' passes {count} arguments, more than a code word can hold")]
    TooManyArguments { name: String, count: usize },

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
