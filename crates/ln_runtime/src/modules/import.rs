use ln_syntax::{SourceFile, render_diagnostics};

use crate::core::{ObjectId, Value};
use crate::errors::{VmError, messages};
use crate::vm::Vm;

/// `import "path"`. An already loaded module is pushed directly; otherwise
/// the source is resolved, compiled and its body run in a frame whose
/// return value is replaced by the module itself.
pub(crate) fn op_import(vm: &mut Vm, path: ObjectId) -> Result<(), VmError> {
    let hash = vm.heap.string_hash(path);
    if let Some(module) = vm.modules.get(path, hash) {
        vm.last_module = module.as_obj_opt();
        vm.push(module);
        return Ok(());
    }

    let raw = vm.heap.str(path).to_string();
    let fail = |reason: String| VmError::Import {
        path: raw.clone(),
        reason,
    };

    let importer = vm
        .current_module()
        .and_then(|m| vm.heap.module(m))
        .and_then(|m| m.path.clone());
    let resolved = vm.loader.resolve(importer.as_deref(), &raw).map_err(fail)?;
    let source = vm.loader.load(&resolved).map_err(fail)?;
    let frontend = vm
        .frontend
        .as_ref()
        .ok_or_else(|| fail(messages::NO_FRONTEND.to_string()))?;
    let proto = frontend.compile(&raw, &source).map_err(|diagnostics| {
        let file = SourceFile::new(raw.as_str(), source.as_str());
        fail(render_diagnostics(&file, &diagnostics).trim_end().to_string())
    })?;

    tracing::debug!(module = %raw, path = %resolved.display(), "importing module");
    let module = vm.new_module(path, Some(resolved));
    vm.temp_roots.push(Value::object(module));
    let function = vm.load_function(module, &proto);
    vm.temp_roots.push(Value::object(function));
    let closure = vm.new_closure(function, Vec::new());
    vm.temp_roots.truncate(vm.temp_roots.len() - 2);

    vm.push(Value::object(closure));
    vm.call(closure, 0)?;
    if let Some(frame) = vm.frames.last_mut() {
        frame.is_import = true;
    }
    Ok(())
}
