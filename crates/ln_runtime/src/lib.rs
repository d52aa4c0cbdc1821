//! ln language runtime: values, heap, collector and bytecode VM.

#![allow(clippy::new_without_default)]
#![allow(clippy::len_without_is_empty)]

pub mod config;
pub mod core;
pub mod errors;
mod gc;
mod modules;
mod natives;
mod util;
pub mod vm;

pub use config::{InterpretResult, VmConfig};
pub use crate::core::{Heap, HeapStats, Obj, ObjType, ObjectId, Value, ValueKind, values_equal};
pub use errors::{RuntimeError, TraceFrame, VmError};
pub use modules::{MODULE_EXTENSION, ModuleLoader, StdModuleLoader};
pub use natives::NativeRegistry;
pub use vm::{CallFrame, MethodTable, Vm};

pub use crate::core::object::NativeFn;
