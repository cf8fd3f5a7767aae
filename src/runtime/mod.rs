//! Bytecode execution: the VM, its fault record, and the host boundary.

pub mod host;
pub mod runtime_error;
pub mod vm;

pub use host::{Host, NullHost};
pub use runtime_error::{Fault, FaultKind};
pub use vm::{Reload, Vm, VmConfig, VmState};
