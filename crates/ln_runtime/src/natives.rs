//! The native function boundary and the core natives every VM starts with.
//!
//! A native receives a copy of its argument window and returns a value, or
//! [`Value::EMPTY`] after recording a message with [`Vm::native_error`].

use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::{NativeFn, NativeObj, Obj, ObjType, ObjectId, Table, Value};
use crate::vm::{MethodTable, Vm};

impl Vm {
    pub(crate) fn method_table(&self, table: MethodTable) -> &Table {
        match table {
            MethodTable::String => &self.string_methods,
            MethodTable::List => &self.list_methods,
            MethodTable::Map => &self.map_methods,
            MethodTable::File => &self.file_methods,
        }
    }

    fn method_table_mut(&mut self, table: MethodTable) -> &mut Table {
        match table {
            MethodTable::String => &mut self.string_methods,
            MethodTable::List => &mut self.list_methods,
            MethodTable::Map => &mut self.map_methods,
            MethodTable::File => &mut self.file_methods,
        }
    }

    fn new_native(&mut self, name: &'static str, function: NativeFn) -> (ObjectId, Value) {
        let key = self.copy_string(name);
        self.temp_roots.push(Value::object(key));
        let native = self.alloc(Obj::Native(NativeObj { name, function }));
        self.temp_roots.pop();
        (key, Value::object(native))
    }

    /// Binds `name` in the global table to a native function.
    pub fn define_native(&mut self, name: &'static str, function: NativeFn) {
        let (key, native) = self.new_native(name, function);
        let hash = self.heap.string_hash(key);
        self.globals.set(key, hash, native);
    }

    /// Adds a native method for a built-in receiver type.
    pub fn define_method(&mut self, table: MethodTable, name: &'static str, function: NativeFn) {
        let (key, native) = self.new_native(name, function);
        let hash = self.heap.string_hash(key);
        self.method_table_mut(table).set(key, hash, native);
    }

    /// Installs a script closure as a list or map method. It is called with
    /// the receiver as its first argument.
    pub fn define_closure_method(&mut self, table: MethodTable, name: &str, closure: Value) {
        self.temp_roots.push(closure);
        let key = self.copy_string(name);
        self.temp_roots.pop();
        let hash = self.heap.string_hash(key);
        self.method_table_mut(table).set(key, hash, closure);
    }

    /// Records why a native failed and returns the failure sentinel.
    pub fn native_error(&mut self, message: impl Into<String>) -> Value {
        self.native_error = Some(message.into());
        Value::EMPTY
    }
}

/// Natives collected before they are bound into a VM.
#[derive(Default)]
pub struct NativeRegistry {
    functions: Vec<(&'static str, NativeFn)>,
    methods: Vec<(MethodTable, &'static str, NativeFn)>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, function: NativeFn) -> &mut Self {
        self.functions.push((name, function));
        self
    }

    pub fn register_method(
        &mut self,
        table: MethodTable,
        name: &'static str,
        function: NativeFn,
    ) -> &mut Self {
        self.methods.push((table, name, function));
        self
    }

    pub fn install_into(self, vm: &mut Vm) {
        for (name, function) in self.functions {
            vm.define_native(name, function);
        }
        for (table, name, function) in self.methods {
            vm.define_method(table, name, function);
        }
    }
}

pub(crate) fn install_core(vm: &mut Vm) {
    let mut registry = NativeRegistry::new();
    registry
        .register("clock", native_clock)
        .register("print", native_print)
        .register("len", native_len)
        .register("type", native_type)
        .register("open", native_open)
        .register_method(MethodTable::String, "len", native_len)
        .register_method(MethodTable::List, "len", native_len)
        .register_method(MethodTable::List, "push", list_push)
        .register_method(MethodTable::List, "pop", list_pop)
        .register_method(MethodTable::Map, "len", native_len)
        .register_method(MethodTable::Map, "has", map_has)
        .register_method(MethodTable::Map, "remove", map_remove)
        .register_method(MethodTable::Map, "keys", map_keys)
        .register_method(MethodTable::File, "read", file_read)
        .register_method(MethodTable::File, "write", file_write)
        .register_method(MethodTable::File, "close", file_close);
    registry.install_into(vm);
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).copied().unwrap_or(Value::NIL)
}

/// The receiver of a native method.
fn receiver(args: &[Value]) -> Option<ObjectId> {
    arg(args, 0).as_obj_opt()
}

fn native_clock(_vm: &mut Vm, _args: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64());
    Value::from_f64(seconds)
}

fn native_print(vm: &mut Vm, args: &[Value]) -> Value {
    let line = args
        .iter()
        .map(|&v| vm.display(v))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
    Value::NIL
}

fn native_len(vm: &mut Vm, args: &[Value]) -> Value {
    let value = arg(args, 0);
    let len = match value.as_obj_opt().and_then(|id| vm.heap.try_get(id)) {
        Some(Obj::String(s)) => s.chars.chars().count(),
        Some(Obj::List(items)) => items.len(),
        Some(Obj::Map(table)) => table.len(),
        _ => {
            let type_name = vm.type_name(value);
            return vm.native_error(format!("Object of type '{type_name}' has no len()."));
        }
    };
    Value::from_f64(len as f64)
}

fn native_type(vm: &mut Vm, args: &[Value]) -> Value {
    let name = vm.type_name(arg(args, 0));
    Value::object(vm.take_string(name))
}

fn native_open(vm: &mut Vm, args: &[Value]) -> Value {
    let (path, mode) = (arg(args, 0), arg(args, 1));
    if !vm.is_type(path, ObjType::String) {
        return vm.native_error("open() expects a path string.");
    }
    let path = vm.heap.str(path.as_obj()).to_string();
    let mode = if vm.is_type(mode, ObjType::String) {
        vm.heap.str(mode.as_obj()).to_string()
    } else {
        "r".to_string()
    };
    match vm.open_file(&path, &mode) {
        Ok(file) => file,
        Err(e) => vm.native_error(e.to_string()),
    }
}

fn list_push(vm: &mut Vm, args: &[Value]) -> Value {
    let extra = args.get(1..).unwrap_or(&[]);
    let pushed = receiver(args).and_then(|id| {
        vm.mutate(id, |obj| match obj {
            Obj::List(items) => {
                items.extend_from_slice(extra);
                true
            }
            _ => false,
        })
    });
    match pushed {
        Some(true) => Value::NIL,
        _ => vm.native_error("push() receiver is not a list."),
    }
}

fn list_pop(vm: &mut Vm, args: &[Value]) -> Value {
    let popped = receiver(args).and_then(|id| {
        vm.mutate(id, |obj| match obj {
            Obj::List(items) => Some(items.pop()),
            _ => None,
        })
    });
    match popped {
        Some(Some(Some(value))) => value,
        Some(Some(None)) => vm.native_error("pop() from empty list."),
        _ => vm.native_error("pop() receiver is not a list."),
    }
}

fn map_has(vm: &mut Vm, args: &[Value]) -> Value {
    let key = arg(args, 1);
    Value::from_bool(vm.map_get(arg(args, 0), key).is_some())
}

fn map_remove(vm: &mut Vm, args: &[Value]) -> Value {
    let key = arg(args, 1);
    let hash = vm.heap.value_hash(key);
    let removed = receiver(args).and_then(|id| {
        vm.mutate(id, |obj| match obj {
            Obj::Map(table) => {
                let value = table.get(key, hash).unwrap_or(Value::NIL);
                table.delete(key, hash);
                Some(value)
            }
            _ => None,
        })
    });
    match removed {
        Some(Some(value)) => value,
        _ => vm.native_error("remove() receiver is not a map."),
    }
}

fn map_keys(vm: &mut Vm, args: &[Value]) -> Value {
    let keys: Vec<Value> = match receiver(args).and_then(|id| vm.heap.map(id)) {
        Some(table) => table.iter().map(|(k, _)| k).collect(),
        None => return vm.native_error("keys() receiver is not a map."),
    };
    Value::object(vm.new_list(keys))
}

fn file_read(vm: &mut Vm, args: &[Value]) -> Value {
    match vm.read_file(arg(args, 0)) {
        Ok(contents) => Value::object(vm.take_string(contents)),
        Err(e) => vm.native_error(e.to_string()),
    }
}

fn file_write(vm: &mut Vm, args: &[Value]) -> Value {
    let text = vm.display(arg(args, 1));
    match vm.write_file(arg(args, 0), &text) {
        Ok(()) => Value::NIL,
        Err(e) => vm.native_error(e.to_string()),
    }
}

fn file_close(vm: &mut Vm, args: &[Value]) -> Value {
    vm.close_file(arg(args, 0));
    Value::NIL
}
