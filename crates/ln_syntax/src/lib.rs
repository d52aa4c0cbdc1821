//! Source locations and compile-time diagnostics shared by the ln
//! frontend and runtime.

mod diagnostic;
mod render;
mod source;
mod span;

pub use diagnostic::{Diagnostic, Severity};
pub use render::{render_diagnostic, render_diagnostics};
pub use source::{SourceFile, SourceText};
pub use span::{ByteIndex, Span};
