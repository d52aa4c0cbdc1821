//!
//! Instruction set and the heap-independent shape of a compiled function.
//!

/// One VM instruction. Operands are inline; `u32` operands index the
/// owning chunk's constant pool, jump targets are absolute op indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Constant(u32),
    Nil,
    Empty,
    True,
    False,
    Pop,
    GetLocal(u8),
    SetLocal(u8),
    GetGlobal(u32),
    GetModule(u32),
    DefineModule(u32),
    SetModule(u32),
    GetUpvalue(u8),
    SetUpvalue(u8),
    GetProperty(u32),
    SetProperty(u32),
    GetSuper(u32),
    GetIndex,
    SetIndex,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    Not,
    Negate,
    Jump(usize),
    JumpIfFalse(usize),
    Loop(usize),
    Break,
    Import(u32),
    Call(u8),
    Invoke(u32, u8),
    SuperInvoke(u32, u8),
    Closure(u32),
    CloseUpvalue,
    Return,
    Class(u32),
    Subclass(u32),
    Method(u32),
    Enum(u32),
    EnumValue(u32),
    NewList(u8),
    NewMap(u8),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Number(f64),
    Str(String),
    Function(Box<FunctionProto>),
}

/// Where a closure finds a captured variable when it is created: a local
/// slot of the enclosing frame, or one of the enclosing closure's upvalues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpvalueDesc {
    pub is_local: bool,
    pub index: u8,
}

/// Ops, a parallel per-op source line table, and the constant pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub lines: Vec<u32>,
    pub constants: Vec<Constant>,
}

impl Chunk {
    pub fn write(&mut self, op: Op, line: u32) -> usize {
        self.code.push(op);
        self.lines.push(line);
        self.code.len() - 1
    }

    pub fn add_constant(&mut self, constant: Constant) -> u32 {
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    pub fn line_at(&self, index: usize) -> u32 {
        self.lines.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// A compiled function before it is loaded into a VM heap. `name` is
/// `None` for the top-level body of a module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionProto {
    pub name: Option<String>,
    pub arity: u8,
    pub upvalues: Vec<UpvalueDesc>,
    pub chunk: Chunk,
}

impl FunctionProto {
    pub fn script() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>, arity: u8) -> Self {
        Self {
            name: Some(name.into()),
            arity,
            ..Self::default()
        }
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalues.len()
    }
}
