#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ln_ir::{FunctionProto, Frontend};
use ln_runtime::{InterpretResult, ModuleLoader, Value, Vm, VmConfig};
use ln_syntax::Diagnostic;

pub fn quiet_vm() -> Vm {
    Vm::with_config(VmConfig::quiet())
}

/// Collects before every allocation, so any missing root shows up as a
/// freed object.
pub fn stress_vm() -> Vm {
    Vm::with_config(VmConfig {
        stress_gc: true,
        print_errors: false,
        ..VmConfig::default()
    })
}

pub fn run(vm: &mut Vm, proto: &FunctionProto) -> InterpretResult {
    let closure = vm.closure_for("main", proto);
    vm.run(closure)
}

pub fn var(vm: &Vm, name: &str) -> Value {
    vm.module_variable("main", name)
        .unwrap_or_else(|| panic!("module variable '{name}' not set"))
}

pub fn number(vm: &Vm, name: &str) -> f64 {
    let value = var(vm, name);
    assert!(value.is_number(), "'{name}' is {}", vm.display(value));
    value.as_number()
}

pub fn text(vm: &Vm, name: &str) -> String {
    vm.display(var(vm, name))
}

/// Frontend that hands out prebuilt prototypes by module name.
#[derive(Default)]
pub struct StubFrontend {
    pub units: HashMap<String, FunctionProto>,
}

impl StubFrontend {
    pub fn with(mut self, name: &str, proto: FunctionProto) -> Self {
        self.units.insert(name.to_string(), proto);
        self
    }
}

impl Frontend for StubFrontend {
    fn compile(&self, module_name: &str, _source: &str) -> Result<FunctionProto, Vec<Diagnostic>> {
        self.units
            .get(module_name)
            .cloned()
            .ok_or_else(|| vec![Diagnostic::error(format!("no unit named {module_name}"), None)])
    }
}

/// Loader serving module sources from memory.
#[derive(Default)]
pub struct MemoryLoader {
    pub files: HashMap<String, String>,
}

impl ModuleLoader for MemoryLoader {
    fn resolve(&self, _importer: Option<&Path>, raw: &str) -> Result<PathBuf, String> {
        if self.files.contains_key(raw) {
            Ok(PathBuf::from(raw))
        } else {
            Err(format!("no such module {raw}"))
        }
    }

    fn load(&self, path: &Path) -> Result<String, String> {
        self.files
            .get(path.to_string_lossy().as_ref())
            .cloned()
            .ok_or_else(|| format!("cannot read {}", path.display()))
    }
}
