//! # Spark runtime data
//!
//! Values shared by the compiler (constant pool) and the VM (operand stack,
//! globals).

pub mod value;
