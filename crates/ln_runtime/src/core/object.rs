//! Heap object variants.

use std::fs::File;
use std::mem::size_of;
use std::path::PathBuf;
use std::rc::Rc;

use ln_ir::{Op, UpvalueDesc};

use super::heap::ObjectId;
use super::table::{Table, ValueTable};
use super::value::Value;
use crate::vm::Vm;

/// Signature every native function implements. The slice is a copy of the
/// argument window; for native methods `args[0]` is the receiver.
pub type NativeFn = fn(&mut Vm, &[Value]) -> Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjType {
    String,
    Function,
    Closure,
    Upvalue,
    Class,
    Instance,
    BoundMethod,
    List,
    Map,
    Module,
    Enum,
    Native,
    File,
}

#[derive(Debug)]
pub struct StringObj {
    pub chars: Box<str>,
    pub hash: u32,
}

#[derive(Debug)]
pub struct FunctionObj {
    /// `None` for a module's top-level body.
    pub name: Option<ObjectId>,
    pub arity: u8,
    pub upvalues: Box<[UpvalueDesc]>,
    pub module: ObjectId,
    pub code: Rc<[Op]>,
    pub lines: Rc<[u32]>,
    pub constants: Vec<Value>,
}

impl FunctionObj {
    pub fn line_at(&self, ip: usize) -> u32 {
        self.lines.get(ip).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct ClosureObj {
    pub function: ObjectId,
    pub upvalues: Vec<ObjectId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpvalueState {
    /// Still aliasing an operand stack slot of a live frame.
    Open(usize),
    Closed(Value),
}

#[derive(Debug)]
pub struct UpvalueObj {
    pub state: UpvalueState,
    /// Next open upvalue, at a lower stack slot.
    pub next: Option<ObjectId>,
}

#[derive(Debug)]
pub struct ClassObj {
    pub name: ObjectId,
    pub superclass: Option<ObjectId>,
    pub methods: Table,
    pub properties: Table,
}

#[derive(Debug)]
pub struct InstanceObj {
    pub class: ObjectId,
    pub fields: Table,
}

#[derive(Debug)]
pub struct BoundMethodObj {
    pub receiver: Value,
    pub method: ObjectId,
}

#[derive(Debug)]
pub struct ModuleObj {
    pub name: ObjectId,
    /// Source location, when the module came from disk.
    pub path: Option<PathBuf>,
    pub values: Table,
}

#[derive(Debug)]
pub struct EnumObj {
    pub name: ObjectId,
    pub values: Table,
}

pub struct NativeObj {
    pub name: &'static str,
    pub function: NativeFn,
}

impl std::fmt::Debug for NativeObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

#[derive(Debug)]
pub struct FileObj {
    /// `None` once closed.
    pub handle: Option<File>,
    pub path: Box<str>,
    pub mode: Box<str>,
}

#[derive(Debug)]
pub enum Obj {
    String(StringObj),
    Function(FunctionObj),
    Closure(ClosureObj),
    Upvalue(UpvalueObj),
    Class(ClassObj),
    Instance(InstanceObj),
    BoundMethod(BoundMethodObj),
    List(Vec<Value>),
    Map(ValueTable),
    Module(ModuleObj),
    Enum(EnumObj),
    Native(NativeObj),
    File(FileObj),
}

fn table_size<K>(capacity: usize) -> usize {
    capacity * (size_of::<K>() + size_of::<Value>() + 16)
}

impl Obj {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Obj::String(_) => ObjType::String,
            Obj::Function(_) => ObjType::Function,
            Obj::Closure(_) => ObjType::Closure,
            Obj::Upvalue(_) => ObjType::Upvalue,
            Obj::Class(_) => ObjType::Class,
            Obj::Instance(_) => ObjType::Instance,
            Obj::BoundMethod(_) => ObjType::BoundMethod,
            Obj::List(_) => ObjType::List,
            Obj::Map(_) => ObjType::Map,
            Obj::Module(_) => ObjType::Module,
            Obj::Enum(_) => ObjType::Enum,
            Obj::Native(_) => ObjType::Native,
            Obj::File(_) => ObjType::File,
        }
    }

    /// Bytes charged against the collection threshold.
    pub fn size(&self) -> usize {
        let base = size_of::<Obj>();
        let deep = match self {
            Obj::String(s) => s.chars.len(),
            Obj::Function(f) => {
                f.code.len() * size_of::<Op>()
                    + f.lines.len() * size_of::<u32>()
                    + f.constants.capacity() * size_of::<Value>()
                    + f.upvalues.len() * size_of::<UpvalueDesc>()
            }
            Obj::Closure(c) => c.upvalues.capacity() * size_of::<ObjectId>(),
            Obj::Upvalue(_) | Obj::BoundMethod(_) | Obj::Native(_) => 0,
            Obj::Class(c) => {
                table_size::<ObjectId>(c.methods.capacity())
                    + table_size::<ObjectId>(c.properties.capacity())
            }
            Obj::Instance(i) => table_size::<ObjectId>(i.fields.capacity()),
            Obj::List(values) => values.capacity() * size_of::<Value>(),
            Obj::Map(table) => table_size::<Value>(table.capacity()),
            Obj::Module(m) => table_size::<ObjectId>(m.values.capacity()),
            Obj::Enum(e) => table_size::<ObjectId>(e.values.capacity()),
            Obj::File(f) => f.path.len() + f.mode.len() + 64,
        };
        base + deep
    }

    /// Pushes every heap object this one keeps alive.
    pub fn trace(&self, out: &mut Vec<ObjectId>) {
        fn value(v: Value, out: &mut Vec<ObjectId>) {
            if let Some(id) = v.as_obj_opt() {
                out.push(id);
            }
        }
        fn table(t: &Table, out: &mut Vec<ObjectId>) {
            for (key, v) in t.iter() {
                out.push(key);
                value(v, out);
            }
        }

        match self {
            Obj::String(_) | Obj::Native(_) | Obj::File(_) => {}
            Obj::Function(f) => {
                out.extend(f.name);
                out.push(f.module);
                for &c in &f.constants {
                    value(c, out);
                }
            }
            Obj::Closure(c) => {
                out.push(c.function);
                out.extend_from_slice(&c.upvalues);
            }
            Obj::Upvalue(u) => {
                if let UpvalueState::Closed(v) = u.state {
                    value(v, out);
                }
            }
            Obj::Class(c) => {
                out.push(c.name);
                out.extend(c.superclass);
                table(&c.methods, out);
                table(&c.properties, out);
            }
            Obj::Instance(i) => {
                out.push(i.class);
                table(&i.fields, out);
            }
            Obj::BoundMethod(b) => {
                value(b.receiver, out);
                out.push(b.method);
            }
            Obj::List(values) => {
                for &v in values {
                    value(v, out);
                }
            }
            Obj::Map(map) => {
                for (k, v) in map.iter() {
                    value(k, out);
                    value(v, out);
                }
            }
            Obj::Module(m) => {
                out.push(m.name);
                table(&m.values, out);
            }
            Obj::Enum(e) => {
                out.push(e.name);
                table(&e.values, out);
            }
        }
    }
}
