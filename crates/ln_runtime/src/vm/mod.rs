//! Bytecode virtual machine.
//!
//! A [`Vm`] owns everything a running program touches: the operand stack,
//! the frame stack, the heap, the intern table and the global, module and
//! built-in method tables. Nothing is shared between instances.

mod alloc;
mod dispatch;
mod exception;
mod files;
mod frames;
pub(crate) mod ops;

use std::path::PathBuf;

use ln_ir::{Frontend, FunctionProto, fnv1a_32};
use ln_syntax::{SourceFile, render_diagnostics};

use crate::config::{InterpretResult, VmConfig};
use crate::core::{Heap, Obj, ObjType, ObjectId, StringObj, Table, Value};
use crate::errors::{RuntimeError, VmError};
use crate::modules::{ModuleLoader, StdModuleLoader};

pub use frames::CallFrame;

pub(crate) const INIT_NAME: &str = "init";
pub(crate) const CLASS_KEY: &str = "_class";
pub(crate) const FILE_KEY: &str = "__file__";

/// Built-in receiver types whose methods are looked up in a VM-wide table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodTable {
    String,
    List,
    Map,
    File,
}

pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    /// Head of the open upvalue list, highest stack slot first.
    pub(crate) open_upvalues: Option<ObjectId>,
    /// Intern table. Keys are weak: the collector prunes dead strings.
    pub(crate) strings: Table,
    pub(crate) globals: Table,
    pub(crate) modules: Table,
    pub(crate) string_methods: Table,
    pub(crate) list_methods: Table,
    pub(crate) map_methods: Table,
    pub(crate) file_methods: Table,
    pub(crate) init_string: ObjectId,
    pub(crate) class_key: ObjectId,
    pub(crate) file_key: ObjectId,
    /// Values kept alive while a multi-allocation construction is underway.
    pub(crate) temp_roots: Vec<Value>,
    pub(crate) last_module: Option<ObjectId>,
    pub(crate) frontend: Option<Box<dyn Frontend>>,
    pub(crate) loader: Box<dyn ModuleLoader>,
    pub(crate) native_error: Option<String>,
    pub(crate) last_error: Option<RuntimeError>,
    pub(crate) entry_depth: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::new(config.initial_gc_threshold);
        let mut strings = Table::new();
        let mut intern = |chars: &str| {
            let hash = fnv1a_32(chars.as_bytes());
            let id = heap.alloc(Obj::String(StringObj {
                chars: chars.into(),
                hash,
            }));
            strings.set(id, hash, Value::NIL);
            id
        };
        let init_string = intern(INIT_NAME);
        let class_key = intern(CLASS_KEY);
        let file_key = intern(FILE_KEY);

        let mut vm = Self {
            config,
            heap,
            stack: Vec::with_capacity(config.stack_max),
            frames: Vec::with_capacity(config.initial_frames),
            open_upvalues: None,
            strings,
            globals: Table::new(),
            modules: Table::new(),
            string_methods: Table::new(),
            list_methods: Table::new(),
            map_methods: Table::new(),
            file_methods: Table::new(),
            init_string,
            class_key,
            file_key,
            temp_roots: Vec::new(),
            last_module: None,
            frontend: None,
            loader: Box::new(StdModuleLoader),
            native_error: None,
            last_error: None,
            entry_depth: 0,
        };
        crate::natives::install_core(&mut vm);
        vm
    }

    pub fn set_frontend(&mut self, frontend: Box<dyn Frontend>) {
        self.frontend = Some(frontend);
    }

    pub fn set_module_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    // ------------------------------------------------------------------
    // Operand stack
    // ------------------------------------------------------------------

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the top value; an empty stack yields `nil`.
    #[inline]
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::NIL)
    }

    #[inline]
    pub fn peek(&self, distance: usize) -> Value {
        let len = self.stack.len();
        if distance >= len {
            return Value::NIL;
        }
        self.stack[len - 1 - distance]
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// The interned string with this content, if one exists.
    pub fn find_string(&self, chars: &str) -> Option<ObjectId> {
        self.strings
            .find_string(&self.heap, chars, fnv1a_32(chars.as_bytes()))
    }

    pub fn string(&self, id: ObjectId) -> Option<&str> {
        self.heap.string(id).map(|s| &*s.chars)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        let key = self.find_string(name)?;
        self.globals.get(key, self.heap.string_hash(key))
    }

    pub fn module(&self, name: &str) -> Option<ObjectId> {
        let key = self.find_string(name)?;
        self.modules
            .get(key, self.heap.string_hash(key))
            .and_then(Value::as_obj_opt)
    }

    pub fn module_variable(&self, module: &str, name: &str) -> Option<Value> {
        let module = self.module(module)?;
        let key = self.find_string(name)?;
        match self.heap.try_get(module)? {
            Obj::Module(m) => m.values.get(key, self.heap.string_hash(key)),
            _ => None,
        }
    }

    pub fn last_module(&self) -> Option<ObjectId> {
        self.last_module
    }

    pub fn last_error(&self) -> Option<&RuntimeError> {
        self.last_error.as_ref()
    }

    /// Elements of a list value.
    pub fn list_items(&self, value: Value) -> Option<&[Value]> {
        match self.heap.try_get(value.as_obj_opt()?)? {
            Obj::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up `key` in a map value.
    pub fn map_get(&self, map: Value, key: Value) -> Option<Value> {
        match self.heap.try_get(map.as_obj_opt()?)? {
            Obj::Map(table) => table.get(key, self.heap.value_hash(key)),
            _ => None,
        }
    }

    pub fn is_falsey(&self, value: Value) -> bool {
        if value.is_nil() {
            return true;
        }
        if value.is_bool() {
            return !value.as_bool();
        }
        if value.is_number() {
            return value.as_number() == 0.0;
        }
        match value.as_obj_opt().and_then(|id| self.heap.try_get(id)) {
            Some(Obj::String(s)) => s.chars.is_empty(),
            Some(Obj::List(items)) => items.is_empty(),
            Some(Obj::Map(table)) => table.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn is_type(&self, value: Value, ty: ObjType) -> bool {
        self.heap.is_type(value, ty)
    }

    // ------------------------------------------------------------------
    // Embedder entry points
    // ------------------------------------------------------------------

    /// Compiles `source` as module `module_name`. Returns `None` when no
    /// frontend is installed or the frontend reports errors.
    pub fn compile_to_closure(&mut self, module_name: &str, source: &str) -> Option<ObjectId> {
        let Some(frontend) = self.frontend.as_ref() else {
            tracing::warn!(module = module_name, "compile requested without a frontend");
            return None;
        };
        match frontend.compile(module_name, source) {
            Ok(proto) => Some(self.closure_for(module_name, &proto)),
            Err(diagnostics) => {
                let file = SourceFile::new(module_name, source);
                let rendered = render_diagnostics(&file, &diagnostics);
                tracing::warn!(module = module_name, errors = diagnostics.len(), "compile failed");
                if self.config.print_errors {
                    eprint!("{rendered}");
                }
                None
            }
        }
    }

    /// Materialises `proto` into module `module_name` (created on first
    /// use) and wraps it in a closure.
    pub fn closure_for(&mut self, module_name: &str, proto: &FunctionProto) -> ObjectId {
        let module = self.module_named(module_name, None);
        self.temp_roots.push(Value::object(module));
        let function = self.load_function(module, proto);
        self.temp_roots.push(Value::object(function));
        let closure = self.new_closure(function, Vec::new());
        self.temp_roots.truncate(self.temp_roots.len() - 2);
        closure
    }

    pub(crate) fn module_named(&mut self, name: &str, path: Option<PathBuf>) -> ObjectId {
        if let Some(existing) = self.module(name) {
            return existing;
        }
        let name = self.copy_string(name);
        self.new_module(name, path)
    }

    /// Runs a closure produced by [`Vm::compile_to_closure`] to completion.
    pub fn run(&mut self, closure: ObjectId) -> InterpretResult {
        self.last_error = None;
        let entry = self.enter();
        self.push(Value::object(closure));
        let outcome = self
            .call(closure, 0)
            .and_then(|()| self.execute(entry.frames));
        let result = match outcome {
            Ok(_) => InterpretResult::Ok,
            Err(error) => {
                self.fail(error, entry);
                InterpretResult::RuntimeError
            }
        };
        self.leave();
        result
    }

    pub fn interpret(&mut self, module_name: &str, source: &str) -> InterpretResult {
        match self.compile_to_closure(module_name, source) {
            Some(closure) => self.run(closure),
            None => InterpretResult::CompileError,
        }
    }

    /// Calls any callable value with `args` and returns its result. Natives
    /// may use this to call back into script; a failure then unwinds only
    /// the callback and is returned to the native.
    pub fn call_function(&mut self, callee: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let entry = self.enter();
        let outcome = self.call_with_args(callee, args, entry.frames);
        let result = outcome.map_err(|error| self.fail(error, entry));
        self.leave();
        result
    }

    fn call_with_args(&mut self, callee: Value, args: &[Value], base: usize) -> Result<Value, VmError> {
        let argc = u8::try_from(args.len()).map_err(|_| VmError::TooManyArguments(args.len()))?;
        self.push(callee);
        self.stack.extend_from_slice(args);
        self.call_value(callee, argc)?;
        if self.frames.len() > base {
            self.execute(base)
        } else {
            Ok(self.pop())
        }
    }

    /// Frees every object, closing any file still open, and consumes the VM.
    pub fn shutdown(mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
        self.strings.clear();
        let freed = self.heap.free_all();
        tracing::debug!(freed, "vm shutdown");
    }
}
