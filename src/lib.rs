//! Spark: a small scripting toolchain for a fantasy console.
//!
//! Source text goes through [`frontend`] (tokens, AST), [`bytecode`]
//! (compiler, chunk format, disassembler) and [`runtime`] (stack VM and the
//! host boundary). [`console`] drives a VM frame by frame against a
//! [`runtime::Host`]; [`hardware`] is a headless host to drive it with.

pub mod bytecode;
pub mod console;
pub mod demos;
pub mod frontend;
pub mod hardware;
pub mod lang;
pub mod runtime;

pub use bytecode::{Chunk, CompileError, compile};
pub use console::{Console, LoadError};
pub use frontend::{ParserError, parse_source};
pub use hardware::Hardware;
pub use lang::value::Value;
pub use runtime::{Fault, FaultKind, Host, Reload, Vm, VmConfig};
