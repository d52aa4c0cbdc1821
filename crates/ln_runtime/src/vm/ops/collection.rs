//! List and map literals.

use crate::core::{Obj, Value, ValueTable};
use crate::errors::VmError;
use crate::vm::Vm;

/// Builds a list from the top `count` values, first pushed first.
pub(crate) fn op_new_list(vm: &mut Vm, count: u8) -> Result<(), VmError> {
    let start = vm.stack.len() - count as usize;
    let items = vm.stack[start..].to_vec();
    let list = vm.new_list(items);
    vm.stack.truncate(start);
    vm.push(Value::object(list));
    Ok(())
}

/// Builds a map from the top `count` key/value pairs.
pub(crate) fn op_new_map(vm: &mut Vm, count: u8) -> Result<(), VmError> {
    let start = vm.stack.len() - 2 * count as usize;
    let mut table = ValueTable::new();
    for pair in vm.stack[start..].chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);
        table.set(key, vm.heap.value_hash(key), value);
    }
    let map = vm.alloc(Obj::Map(table));
    vm.stack.truncate(start);
    vm.push(Value::object(map));
    Ok(())
}
