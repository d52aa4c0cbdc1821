//! Module loading and import.

mod import;
mod loader;

pub(crate) use import::op_import;
pub use loader::{ModuleLoader, StdModuleLoader, MODULE_EXTENSION};
