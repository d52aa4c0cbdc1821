use ln_syntax::Diagnostic;

use crate::FunctionProto;

/// The scanner/parser/code generator as seen from the VM.
///
/// A successful compile yields the top-level function of the unit. Any
/// error diagnostic means the unit produced no function at all.
pub trait Frontend {
    fn compile(&self, module_name: &str, source: &str) -> Result<FunctionProto, Vec<Diagnostic>>;
}
