//! Class and enum declarations.

use crate::core::{Obj, ObjectId, Value};
use crate::errors::VmError;
use crate::vm::Vm;

pub(crate) fn op_class(vm: &mut Vm, name: ObjectId) {
    let class = vm.new_class(name, None);
    vm.push(Value::object(class));
}

/// Creates a subclass of the class on top of the stack and pushes it above
/// the superclass. Inherited methods are copied in now, so later changes to
/// the superclass do not reach existing subclasses.
pub(crate) fn op_subclass(vm: &mut Vm, name: ObjectId) -> Result<(), VmError> {
    let Some(superclass) = vm.peek(0).as_obj_opt().filter(|&id| vm.heap.class(id).is_some())
    else {
        return Err(VmError::SuperclassNotClass);
    };
    let class = vm.new_class(name, Some(superclass));
    let inherited = vm
        .heap
        .class(superclass)
        .map(|c| c.methods.clone())
        .unwrap_or_default();
    vm.mutate(class, |obj| {
        if let Obj::Class(c) = obj {
            c.methods.add_all(&inherited);
        }
    });
    vm.push(Value::object(class));
    Ok(())
}

/// Stores the closure on top of the stack as a method of the class below.
pub(crate) fn op_method(vm: &mut Vm, name: ObjectId) {
    let method = vm.peek(0);
    let class = vm.peek(1);
    let hash = vm.heap.string_hash(name);
    if let Some(id) = class.as_obj_opt() {
        vm.mutate(id, |obj| {
            if let Obj::Class(c) = obj {
                c.methods.set(name, hash, method);
            }
        });
    }
    vm.pop();
}

pub(crate) fn op_enum(vm: &mut Vm, name: ObjectId) {
    let enumeration = vm.new_enum(name);
    vm.push(Value::object(enumeration));
}

/// Adds the value on top of the stack to the enum below it.
pub(crate) fn op_enum_value(vm: &mut Vm, name: ObjectId) {
    let value = vm.pop();
    let target = vm.peek(0);
    let hash = vm.heap.string_hash(name);
    if let Some(id) = target.as_obj_opt() {
        vm.mutate(id, |obj| {
            if let Obj::Enum(e) = obj {
                e.values.set(name, hash, value);
            }
        });
    }
}
