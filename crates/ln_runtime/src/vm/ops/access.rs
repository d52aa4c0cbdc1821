//! Property and index access.

use crate::core::{Obj, ObjectId, Value};
use crate::errors::VmError;
use crate::vm::Vm;

impl Vm {
    /// First value named `name` in the static properties of `class` or any
    /// of its superclasses.
    pub(crate) fn class_property(&self, class: ObjectId, name: ObjectId) -> Option<Value> {
        let hash = self.heap.string_hash(name);
        let mut current = Some(class);
        while let Some(id) = current {
            let class = self.heap.class(id)?;
            if let Some(value) = class.properties.get(name, hash) {
                return Some(value);
            }
            current = class.superclass;
        }
        None
    }

    /// Replaces the receiver on top of the stack with `class`'s method
    /// `name` bound to it. Returns `false` if the class has no such method.
    pub(crate) fn bind_method(&mut self, class: ObjectId, name: ObjectId) -> bool {
        let hash = self.heap.string_hash(name);
        let Some(method) = self
            .heap
            .class(class)
            .and_then(|c| c.methods.get(name, hash))
            .and_then(Value::as_obj_opt)
        else {
            return false;
        };
        let receiver = self.peek(0);
        let bound = self.new_bound_method(receiver, method);
        self.pop();
        self.push(Value::object(bound));
        true
    }

    fn quoted_name(&self, id: ObjectId) -> String {
        format!("'{}'", self.heap.str(id))
    }
}

#[inline]
fn replace_top(vm: &mut Vm, value: Value) {
    vm.pop();
    vm.push(value);
}

pub(crate) fn op_get_property(vm: &mut Vm, name: ObjectId) -> Result<(), VmError> {
    let receiver = vm.peek(0);
    let Some(id) = receiver.as_obj_opt() else {
        return Err(VmError::NoProperties(vm.type_name(receiver)));
    };
    let hash = vm.heap.string_hash(name);

    match vm.heap.try_get(id) {
        Some(Obj::Instance(instance)) => {
            let field = instance.fields.get(name, hash);
            let class = instance.class;
            if let Some(value) = field {
                replace_top(vm, value);
                return Ok(());
            }
            if vm.bind_method(class, name) {
                return Ok(());
            }
            if let Some(value) = vm.class_property(class, name) {
                replace_top(vm, value);
                return Ok(());
            }
            let owner = vm.heap.class(class).map_or_else(String::new, |c| vm.quoted_name(c.name));
            Err(VmError::NoProperty {
                owner: format!("{owner} instance"),
                name: vm.heap.str(name).to_string(),
            })
        }
        Some(Obj::Module(module)) => match module.values.get(name, hash) {
            Some(value) => {
                replace_top(vm, value);
                Ok(())
            }
            None => Err(VmError::NoProperty {
                owner: format!("{} module", vm.quoted_name(module.name)),
                name: vm.heap.str(name).to_string(),
            }),
        },
        Some(Obj::Class(class)) => {
            let class_name = class.name;
            match vm.class_property(id, name) {
                Some(value) => {
                    replace_top(vm, value);
                    Ok(())
                }
                None => Err(VmError::NoProperty {
                    owner: format!("{} class", vm.quoted_name(class_name)),
                    name: vm.heap.str(name).to_string(),
                }),
            }
        }
        Some(Obj::Enum(enumeration)) => match enumeration.values.get(name, hash) {
            Some(value) => {
                replace_top(vm, value);
                Ok(())
            }
            None => Err(VmError::NoProperty {
                owner: format!("{} enum", vm.quoted_name(enumeration.name)),
                name: vm.heap.str(name).to_string(),
            }),
        },
        _ => Err(VmError::NoProperties(vm.type_name(receiver))),
    }
}

/// `target.name = value`. Leaves `nil` as the expression's value.
pub(crate) fn op_set_property(vm: &mut Vm, name: ObjectId) -> Result<(), VmError> {
    let target = vm.peek(1);
    let value = vm.peek(0);
    let hash = vm.heap.string_hash(name);
    let stored = target.as_obj_opt().and_then(|id| {
        vm.mutate(id, |obj| match obj {
            Obj::Instance(instance) => {
                instance.fields.set(name, hash, value);
                true
            }
            Obj::Class(class) => {
                class.properties.set(name, hash, value);
                true
            }
            _ => false,
        })
    });
    if stored != Some(true) {
        return Err(VmError::CannotSetProperty(vm.type_name(target)));
    }
    vm.pop();
    vm.pop();
    vm.push(Value::NIL);
    Ok(())
}

/// `super.name`: pops the superclass and binds its method to the receiver.
pub(crate) fn op_get_super(vm: &mut Vm, name: ObjectId) -> Result<(), VmError> {
    let superclass = vm.pop();
    let Some(class) = superclass.as_obj_opt().filter(|&id| vm.heap.class(id).is_some()) else {
        return Err(VmError::SuperclassNotClass);
    };
    if !vm.bind_method(class, name) {
        return Err(VmError::UndefinedProperty(vm.heap.str(name).to_string()));
    }
    Ok(())
}

fn list_index(index: Value, len: usize) -> Result<usize, VmError> {
    if !index.is_number() {
        return Err(VmError::IndexNotNumber);
    }
    let n = index.as_number();
    if n.fract() != 0.0 {
        return Err(VmError::IndexNotNumber);
    }
    if n < 0.0 || n >= len as f64 {
        return Err(VmError::IndexOutOfBounds { index: n, len });
    }
    Ok(n as usize)
}

/// `container[index]`.
pub(crate) fn op_get_index(vm: &mut Vm) -> Result<(), VmError> {
    let index = vm.peek(0);
    let container = vm.peek(1);
    let result = match container.as_obj_opt().and_then(|id| vm.heap.try_get(id)) {
        Some(Obj::List(items)) => items[list_index(index, items.len())?],
        Some(Obj::Map(table)) => match table.get(index, vm.heap.value_hash(index)) {
            Some(value) => value,
            None => return Err(VmError::KeyNotFound(vm.display(index))),
        },
        _ => return Err(VmError::NotIndexable),
    };
    vm.pop();
    vm.pop();
    vm.push(result);
    Ok(())
}

/// `container[index] = value`; the assigned value is the result.
pub(crate) fn op_set_index(vm: &mut Vm) -> Result<(), VmError> {
    let value = vm.peek(0);
    let index = vm.peek(1);
    let container = vm.peek(2);
    let hash = vm.heap.value_hash(index);
    let Some(id) = container.as_obj_opt() else {
        return Err(VmError::NotIndexable);
    };
    let stored = vm.mutate(id, |obj| match obj {
        Obj::List(items) => {
            let at = list_index(index, items.len())?;
            items[at] = value;
            Ok(())
        }
        Obj::Map(table) => {
            table.set(index, hash, value);
            Ok(())
        }
        _ => Err(VmError::NotIndexable),
    });
    stored.unwrap_or(Err(VmError::NotIndexable))?;
    vm.stack.truncate(vm.stack.len() - 3);
    vm.push(value);
    Ok(())
}
