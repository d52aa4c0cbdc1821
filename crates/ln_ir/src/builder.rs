//! Incremental assembly of a [`FunctionProto`].
//!
//! Compilers drive this the way a code generator walks its tree: set the
//! current source line, emit ops, intern names into the constant pool and
//! back-patch forward jumps once their target is known.

use crate::{Constant, FunctionProto, Op, UpvalueDesc};

pub struct FunctionBuilder {
    proto: FunctionProto,
    line: u32,
}

impl FunctionBuilder {
    /// Top-level body of a module.
    pub fn script() -> Self {
        Self {
            proto: FunctionProto::script(),
            line: 1,
        }
    }

    pub fn function(name: impl Into<String>, arity: u8) -> Self {
        Self {
            proto: FunctionProto::named(name, arity),
            line: 1,
        }
    }

    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn emit(&mut self, op: Op) -> usize {
        self.proto.chunk.write(op, self.line)
    }

    /// Index the next emitted op will get.
    pub fn here(&self) -> usize {
        self.proto.chunk.len()
    }

    pub fn constant(&mut self, constant: Constant) -> u32 {
        self.proto.chunk.add_constant(constant)
    }

    pub fn number(&mut self, n: f64) -> u32 {
        self.constant(Constant::Number(n))
    }

    /// Adds a string constant, reusing an existing identical entry.
    pub fn string(&mut self, s: &str) -> u32 {
        let existing = self
            .proto
            .chunk
            .constants
            .iter()
            .position(|c| matches!(c, Constant::Str(v) if v == s));
        match existing {
            Some(idx) => idx as u32,
            None => self.constant(Constant::Str(s.to_string())),
        }
    }

    pub fn nested(&mut self, function: FunctionProto) -> u32 {
        self.constant(Constant::Function(Box::new(function)))
    }

    pub fn emit_number(&mut self, n: f64) -> usize {
        let idx = self.number(n);
        self.emit(Op::Constant(idx))
    }

    pub fn emit_string(&mut self, s: &str) -> usize {
        let idx = self.string(s);
        self.emit(Op::Constant(idx))
    }

    /// Emits a `Closure` op for `function`.
    pub fn emit_closure(&mut self, function: FunctionProto) -> usize {
        let idx = self.nested(function);
        self.emit(Op::Closure(idx))
    }

    /// Emits a forward jump whose target is patched later.
    pub fn jump(&mut self, op: fn(usize) -> Op) -> usize {
        self.emit(op(usize::MAX))
    }

    /// Points the jump at `at` to the next op to be emitted.
    pub fn patch_jump(&mut self, at: usize) {
        let target = self.here();
        match &mut self.proto.chunk.code[at] {
            Op::Jump(to) | Op::JumpIfFalse(to) | Op::Loop(to) => *to = target,
            other => panic!("patch_jump on non-jump op {other:?}"),
        }
    }

    pub fn loop_to(&mut self, start: usize) -> usize {
        self.emit(Op::Loop(start))
    }

    /// Registers a captured variable and returns its upvalue index.
    pub fn capture(&mut self, is_local: bool, index: u8) -> u8 {
        let desc = UpvalueDesc { is_local, index };
        if let Some(i) = self.proto.upvalues.iter().position(|u| *u == desc) {
            return i as u8;
        }
        self.proto.upvalues.push(desc);
        (self.proto.upvalues.len() - 1) as u8
    }

    pub fn finish(self) -> FunctionProto {
        self.proto
    }
}
