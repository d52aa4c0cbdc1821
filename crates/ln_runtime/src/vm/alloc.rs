//! The single allocation path and the object constructors built on it.

use std::path::PathBuf;
use std::rc::Rc;

use ln_ir::{Constant, FunctionProto, fnv1a_32};

use super::Vm;
use crate::core::{
    BoundMethodObj, ClassObj, ClosureObj, EnumObj, FunctionObj, InstanceObj, ModuleObj, Obj,
    ObjectId, StringObj, Table, UpvalueObj, UpvalueState, Value, ValueTable,
};

impl Vm {
    /// Allocates `obj`, collecting first when the heap is over its
    /// threshold. Objects `obj` references are treated as roots for that
    /// collection since nothing else may point at them yet.
    pub(crate) fn alloc(&mut self, obj: Obj) -> ObjectId {
        let incoming = obj.size();
        if self.config.stress_gc || self.heap.bytes_allocated() + incoming > self.heap.next_gc() {
            let mut pending = Vec::new();
            obj.trace(&mut pending);
            self.collect_with(&pending);
        }
        self.heap.alloc(obj)
    }

    /// Mutates a live object in place. Growth is charged like an
    /// allocation and may collect, with `id` kept as a root.
    pub(crate) fn mutate<R>(&mut self, id: ObjectId, f: impl FnOnce(&mut Obj) -> R) -> Option<R> {
        let (result, grew) = self.heap.update(id, f)?;
        if grew && (self.config.stress_gc || self.heap.bytes_allocated() > self.heap.next_gc()) {
            self.collect_with(&[id]);
        }
        Some(result)
    }

    /// Interns a copy of `chars`.
    pub fn copy_string(&mut self, chars: &str) -> ObjectId {
        let hash = fnv1a_32(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(&self.heap, chars, hash) {
            return existing;
        }
        self.intern_new(chars.into(), hash)
    }

    /// Interns an owned buffer, dropping it if the content is already
    /// interned.
    pub fn take_string(&mut self, chars: String) -> ObjectId {
        let hash = fnv1a_32(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(&self.heap, &chars, hash) {
            return existing;
        }
        self.intern_new(chars.into_boxed_str(), hash)
    }

    fn intern_new(&mut self, chars: Box<str>, hash: u32) -> ObjectId {
        let id = self.alloc(Obj::String(StringObj { chars, hash }));
        self.strings.set(id, hash, Value::NIL);
        id
    }

    pub(crate) fn string_value(&mut self, chars: &str) -> Value {
        Value::object(self.copy_string(chars))
    }

    /// Turns a heap-independent prototype into a function object owned by
    /// `module`. Nested function constants are loaded recursively.
    pub fn load_function(&mut self, module: ObjectId, proto: &FunctionProto) -> ObjectId {
        let base = self.temp_roots.len();
        self.temp_roots.push(Value::object(module));
        let name = proto.name.as_deref().map(|n| self.copy_string(n));
        if let Some(name) = name {
            self.temp_roots.push(Value::object(name));
        }

        let mut constants = Vec::with_capacity(proto.chunk.constants.len());
        for constant in &proto.chunk.constants {
            let value = match constant {
                Constant::Number(n) => Value::from_f64(*n),
                Constant::Str(s) => self.string_value(s),
                Constant::Function(nested) => Value::object(self.load_function(module, nested)),
            };
            self.temp_roots.push(value);
            constants.push(value);
        }

        let id = self.alloc(Obj::Function(FunctionObj {
            name,
            arity: proto.arity,
            upvalues: proto.upvalues.clone().into_boxed_slice(),
            module,
            code: Rc::from(proto.chunk.code.as_slice()),
            lines: Rc::from(proto.chunk.lines.as_slice()),
            constants,
        }));
        self.temp_roots.truncate(base);
        id
    }

    pub(crate) fn new_closure(&mut self, function: ObjectId, upvalues: Vec<ObjectId>) -> ObjectId {
        self.alloc(Obj::Closure(ClosureObj { function, upvalues }))
    }

    pub(crate) fn new_upvalue(&mut self, slot: usize, next: Option<ObjectId>) -> ObjectId {
        self.alloc(Obj::Upvalue(UpvalueObj {
            state: UpvalueState::Open(slot),
            next,
        }))
    }

    pub(crate) fn new_class(&mut self, name: ObjectId, superclass: Option<ObjectId>) -> ObjectId {
        self.alloc(Obj::Class(ClassObj {
            name,
            superclass,
            methods: Table::new(),
            properties: Table::new(),
        }))
    }

    /// New instance whose fields start with the reserved `_class` entry.
    pub(crate) fn new_instance(&mut self, class: ObjectId) -> ObjectId {
        let mut fields = Table::new();
        fields.set(
            self.class_key,
            self.heap.string_hash(self.class_key),
            Value::object(class),
        );
        self.alloc(Obj::Instance(InstanceObj { class, fields }))
    }

    pub(crate) fn new_bound_method(&mut self, receiver: Value, method: ObjectId) -> ObjectId {
        self.alloc(Obj::BoundMethod(BoundMethodObj { receiver, method }))
    }

    pub fn new_list(&mut self, values: Vec<Value>) -> ObjectId {
        self.alloc(Obj::List(values))
    }

    pub fn new_map(&mut self) -> ObjectId {
        self.alloc(Obj::Map(ValueTable::new()))
    }

    pub(crate) fn new_enum(&mut self, name: ObjectId) -> ObjectId {
        self.alloc(Obj::Enum(EnumObj {
            name,
            values: Table::new(),
        }))
    }

    /// New module seeded with `__file__` and registered under its name.
    pub(crate) fn new_module(&mut self, name: ObjectId, path: Option<PathBuf>) -> ObjectId {
        let mut values = Table::new();
        values.set(
            self.file_key,
            self.heap.string_hash(self.file_key),
            Value::object(name),
        );
        let id = self.alloc(Obj::Module(ModuleObj { name, path, values }));
        self.modules
            .set(name, self.heap.string_hash(name), Value::object(id));
        id
    }
}
