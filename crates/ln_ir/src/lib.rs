//!
//! Bytecode shared between ln compilers and the ln virtual machine.
//!
mod builder;
mod bytecode;
mod frontend;
mod hash;

pub use builder::*;
pub use bytecode::*;
pub use frontend::*;
pub use hash::*;
