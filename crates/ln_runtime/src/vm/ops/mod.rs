//! Opcode implementations, grouped by concern.

pub(crate) mod access;
pub(crate) mod call;
pub(crate) mod collection;
pub(crate) mod math;
pub(crate) mod types;
