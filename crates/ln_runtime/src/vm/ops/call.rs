//! Calls, method invocation and closure creation.

use smallvec::SmallVec;

use crate::core::{NativeFn, Obj, ObjectId, Value};
use crate::errors::VmError;
use crate::vm::{CallFrame, MethodTable, Vm};

/// Slots kept free above the current top when a frame is pushed.
const FRAME_HEADROOM: usize = u8::MAX as usize + 1;

impl Vm {
    pub(crate) fn function_name(&self, function: ObjectId) -> String {
        match self.heap.function(function).and_then(|f| f.name) {
            Some(name) => self.heap.str(name).to_string(),
            None => "script".to_string(),
        }
    }

    /// Pushes a frame for `closure`. The callee and its `argc` arguments
    /// are already on the stack.
    pub(crate) fn call(&mut self, closure: ObjectId, argc: u8) -> Result<(), VmError> {
        let Some(function) = self.heap.closure(closure).map(|c| c.function) else {
            return Err(VmError::NotCallable);
        };
        let Some(f) = self.heap.function(function) else {
            return Err(VmError::NotCallable);
        };
        if argc < f.arity {
            return Err(VmError::Arity {
                name: self.function_name(function),
                expected: f.arity,
                got: argc,
            });
        }
        if self.stack.len() + FRAME_HEADROOM > self.config.stack_max {
            return Err(VmError::StackOverflow);
        }
        let code = f.code.clone();
        let slots = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame {
            closure,
            function,
            code,
            ip: 0,
            slots,
            is_import: false,
        });
        Ok(())
    }

    pub(crate) fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), VmError> {
        let Some(id) = callee.as_obj_opt() else {
            return Err(VmError::NotCallable);
        };
        let slot = self.stack.len() - argc as usize - 1;
        match self.heap.try_get(id) {
            Some(Obj::BoundMethod(bound)) => {
                let (receiver, method) = (bound.receiver, bound.method);
                self.stack[slot] = receiver;
                self.call(method, argc)
            }
            Some(Obj::Class(class)) => {
                let initializer = class
                    .methods
                    .get(self.init_string, self.heap.string_hash(self.init_string));
                let instance = self.new_instance(id);
                self.stack[slot] = Value::object(instance);
                match initializer {
                    Some(init) => self.call_value(init, argc),
                    None if argc != 0 => Err(VmError::InitArity(argc)),
                    None => Ok(()),
                }
            }
            Some(Obj::Closure(_)) => self.call(id, argc),
            Some(Obj::Native(native)) => {
                let (function, name) = (native.function, native.name);
                self.call_native(function, name, slot + 1, slot)
            }
            _ => Err(VmError::NotCallable),
        }
    }

    /// Calls a native on `stack[args_start..]` and replaces everything from
    /// `result_slot` up with its result.
    pub(crate) fn call_native(
        &mut self,
        function: NativeFn,
        name: &'static str,
        args_start: usize,
        result_slot: usize,
    ) -> Result<(), VmError> {
        let args: SmallVec<[Value; 8]> = SmallVec::from_slice(&self.stack[args_start..]);
        self.native_error = None;
        let result = function(self, &args);
        if result.is_empty() {
            let message = self
                .native_error
                .take()
                .unwrap_or_else(|| format!("Native function '{name}' failed."));
            return Err(VmError::Native(message));
        }
        self.stack.truncate(result_slot);
        self.push(result);
        Ok(())
    }

    fn invoke_builtin(
        &mut self,
        table: MethodTable,
        receiver: Value,
        name: ObjectId,
        argc: u8,
    ) -> Result<(), VmError> {
        let hash = self.heap.string_hash(name);
        let slot = self.stack.len() - argc as usize - 1;
        let method = self
            .method_table(table)
            .get(name, hash)
            .and_then(Value::as_obj_opt);
        match method.map(|id| (id, self.heap.try_get(id))) {
            Some((_, Some(Obj::Native(native)))) => {
                let (function, native_name) = (native.function, native.name);
                self.call_native(function, native_name, slot, slot)
            }
            // Script-defined methods get the receiver as an extra first argument.
            Some((closure, Some(Obj::Closure(_)))) => {
                self.stack.insert(slot + 1, receiver);
                self.call(closure, argc + 1)
            }
            _ => Err(VmError::NoMethod {
                receiver: match table {
                    MethodTable::String => "String",
                    MethodTable::List => "List",
                    MethodTable::Map => "Map",
                    MethodTable::File => "File",
                },
                name: self.heap.str(name).to_string(),
            }),
        }
    }

    /// `receiver.name(args)` without materialising a bound method.
    pub(crate) fn invoke(&mut self, name: ObjectId, argc: u8) -> Result<(), VmError> {
        let receiver = self.peek(argc as usize);
        let Some(id) = receiver.as_obj_opt() else {
            return Err(VmError::NoMethods);
        };
        let hash = self.heap.string_hash(name);
        let undefined = |vm: &Vm| VmError::UndefinedProperty(vm.heap.str(name).to_string());

        match self.heap.try_get(id) {
            Some(Obj::Module(module)) => match module.values.get(name, hash) {
                Some(value) => self.call_value(value, argc),
                None => Err(undefined(self)),
            },
            Some(Obj::Class(class)) => match class.methods.get(name, hash) {
                Some(method) => self.call_value(method, argc),
                None => Err(undefined(self)),
            },
            Some(Obj::Instance(instance)) => {
                let field = instance.fields.get(name, hash);
                let class = instance.class;
                if let Some(value) = field {
                    let slot = self.stack.len() - argc as usize - 1;
                    self.stack[slot] = value;
                    return self.call_value(value, argc);
                }
                self.invoke_from_class(class, name, argc)
            }
            Some(Obj::Enum(enumeration)) => match enumeration.values.get(name, hash) {
                Some(value) => self.call_value(value, argc),
                None => Err(VmError::NoProperty {
                    owner: format!("'{}' enum", self.heap.str(enumeration.name)),
                    name: self.heap.str(name).to_string(),
                }),
            },
            Some(Obj::String(_)) => self.invoke_builtin(MethodTable::String, receiver, name, argc),
            Some(Obj::List(_)) => self.invoke_builtin(MethodTable::List, receiver, name, argc),
            Some(Obj::Map(_)) => self.invoke_builtin(MethodTable::Map, receiver, name, argc),
            Some(Obj::File(_)) => self.invoke_builtin(MethodTable::File, receiver, name, argc),
            _ => Err(VmError::NoMethods),
        }
    }

    pub(crate) fn invoke_from_class(
        &mut self,
        class: ObjectId,
        name: ObjectId,
        argc: u8,
    ) -> Result<(), VmError> {
        let hash = self.heap.string_hash(name);
        match self.heap.class(class).and_then(|c| c.methods.get(name, hash)) {
            Some(method) => self.call_value(method, argc),
            None => Err(VmError::UndefinedProperty(self.heap.str(name).to_string())),
        }
    }
}

/// `super.name(args)`: the superclass sits above the arguments.
pub(crate) fn op_super_invoke(vm: &mut Vm, name: ObjectId, argc: u8) -> Result<(), VmError> {
    let superclass = vm.pop();
    let Some(class) = superclass.as_obj_opt().filter(|&id| vm.heap.class(id).is_some()) else {
        return Err(VmError::SuperclassNotClass);
    };
    vm.invoke_from_class(class, name, argc)
}

/// Wraps the function constant in a closure, capturing its upvalues from
/// the current frame.
pub(crate) fn op_closure(vm: &mut Vm, function: ObjectId) -> Result<(), VmError> {
    let Some(descs) = vm.heap.function(function).map(|f| f.upvalues.clone()) else {
        return Err(VmError::NotCallable);
    };
    let Some(frame) = vm.frames.last() else {
        return Err(VmError::NotCallable);
    };
    let (base, enclosing) = (frame.slots, frame.closure);

    vm.temp_roots.push(Value::object(function));
    let mut upvalues = Vec::with_capacity(descs.len());
    for desc in descs.iter() {
        let upvalue = if desc.is_local {
            vm.capture_upvalue(base + desc.index as usize)
        } else {
            match vm.heap.closure(enclosing).and_then(|c| c.upvalues.get(desc.index as usize)) {
                Some(&id) => id,
                None => {
                    vm.temp_roots.pop();
                    return Err(VmError::UndefinedVariable(format!("upvalue {}", desc.index)));
                }
            }
        };
        upvalues.push(upvalue);
    }
    let closure = vm.new_closure(function, upvalues);
    vm.temp_roots.pop();
    vm.push(Value::object(closure));
    Ok(())
}
