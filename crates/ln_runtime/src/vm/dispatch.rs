//! The fetch-decode-execute loop.

use ln_ir::Op;

use super::Vm;
use super::ops::access::{op_get_index, op_get_property, op_get_super, op_set_index, op_set_property};
use super::ops::call::{op_closure, op_super_invoke};
use super::ops::collection::{op_new_list, op_new_map};
use super::ops::math::{op_add, op_bitwise, op_equal, op_negate, op_not, op_numeric};
use super::ops::types::{op_class, op_enum, op_enum_value, op_method, op_subclass};
use crate::core::{Obj, ObjectId, Value};
use crate::errors::VmError;
use crate::modules::op_import;

impl Vm {
    #[inline]
    fn constant(&self, index: u32) -> Value {
        self.frames
            .last()
            .and_then(|frame| self.heap.function(frame.function))
            .and_then(|f| f.constants.get(index as usize).copied())
            .unwrap_or(Value::NIL)
    }

    /// A string constant naming a variable, property or module.
    #[inline]
    fn name_constant(&self, index: u32) -> ObjectId {
        self.constant(index).as_obj()
    }

    pub(crate) fn current_module(&self) -> Option<ObjectId> {
        let frame = self.frames.last()?;
        self.heap.function(frame.function).map(|f| f.module)
    }

    #[inline]
    fn jump_to(&mut self, target: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target;
        }
    }

    fn current_upvalue(&self, index: u8) -> Option<ObjectId> {
        let frame = self.frames.last()?;
        self.heap
            .closure(frame.closure)?
            .upvalues
            .get(index as usize)
            .copied()
    }

    /// Executes until the frame stack drops back to `base` frames and
    /// returns the value the last popped frame returned.
    pub(crate) fn execute(&mut self, base: usize) -> Result<Value, VmError> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Value::NIL);
            };
            let fetched = frame.code.get(frame.ip).copied();
            frame.ip += 1;
            let slots = frame.slots;
            let op = match fetched {
                Some(op) => op,
                // Falling off the end returns nil.
                None => {
                    self.push(Value::NIL);
                    Op::Return
                }
            };

            match op {
                Op::Constant(index) => {
                    let value = self.constant(index);
                    self.push(value);
                }
                Op::Nil => self.push(Value::NIL),
                Op::Empty => self.push(Value::EMPTY),
                Op::True => self.push(Value::TRUE),
                Op::False => self.push(Value::FALSE),
                Op::Pop => {
                    self.pop();
                }

                Op::GetLocal(slot) => {
                    let value = self
                        .stack
                        .get(slots + slot as usize)
                        .copied()
                        .unwrap_or(Value::NIL);
                    self.push(value);
                }
                Op::SetLocal(slot) => {
                    let value = self.peek(0);
                    if let Some(cell) = self.stack.get_mut(slots + slot as usize) {
                        *cell = value;
                    }
                }
                Op::GetGlobal(index) => {
                    let name = self.name_constant(index);
                    match self.globals.get(name, self.heap.string_hash(name)) {
                        Some(value) => self.push(value),
                        None => {
                            return Err(VmError::UndefinedVariable(
                                self.heap.str(name).to_string(),
                            ));
                        }
                    }
                }
                Op::GetModule(index) => {
                    let name = self.name_constant(index);
                    let hash = self.heap.string_hash(name);
                    let value = self
                        .current_module()
                        .and_then(|m| self.heap.module(m))
                        .and_then(|m| m.values.get(name, hash));
                    match value {
                        Some(value) => self.push(value),
                        None => {
                            return Err(VmError::UndefinedVariable(
                                self.heap.str(name).to_string(),
                            ));
                        }
                    }
                }
                Op::DefineModule(index) => {
                    let name = self.name_constant(index);
                    let value = self.peek(0);
                    self.module_set(name, value);
                    self.pop();
                }
                Op::SetModule(index) => {
                    let name = self.name_constant(index);
                    let value = self.peek(0);
                    if self.module_set(name, value) {
                        self.module_delete(name);
                        return Err(VmError::UndefinedVariable(self.heap.str(name).to_string()));
                    }
                }
                Op::GetUpvalue(index) => {
                    let value = self
                        .current_upvalue(index)
                        .map_or(Value::NIL, |id| self.upvalue_get(id));
                    self.push(value);
                }
                Op::SetUpvalue(index) => {
                    let value = self.peek(0);
                    if let Some(id) = self.current_upvalue(index) {
                        self.upvalue_set(id, value);
                    }
                }

                Op::GetProperty(index) => {
                    let name = self.name_constant(index);
                    op_get_property(self, name)?
                }
                Op::SetProperty(index) => {
                    let name = self.name_constant(index);
                    op_set_property(self, name)?
                }
                Op::GetSuper(index) => {
                    let name = self.name_constant(index);
                    op_get_super(self, name)?
                }
                Op::GetIndex => op_get_index(self)?,
                Op::SetIndex => op_set_index(self)?,

                Op::Equal => op_equal(self),
                Op::Greater => op_numeric(self, ">", |a, b| Value::from_bool(a > b))?,
                Op::Less => op_numeric(self, "<", |a, b| Value::from_bool(a < b))?,
                Op::Add => op_add(self)?,
                Op::Subtract => op_numeric(self, "-", |a, b| Value::from_f64(a - b))?,
                Op::Multiply => op_numeric(self, "*", |a, b| Value::from_f64(a * b))?,
                Op::Divide => op_numeric(self, "/", |a, b| Value::from_f64(a / b))?,
                Op::Modulo => op_numeric(self, "%", |a, b| Value::from_f64(a % b))?,
                Op::BitwiseAnd => op_bitwise(self, "&", |a, b| a & b)?,
                Op::BitwiseOr => op_bitwise(self, "|", |a, b| a | b)?,
                Op::BitwiseXor => op_bitwise(self, "^", |a, b| a ^ b)?,
                Op::LeftShift => op_bitwise(self, "<<", |a, b| a.wrapping_shl(b as u32))?,
                Op::RightShift => op_bitwise(self, ">>", |a, b| a.wrapping_shr(b as u32))?,
                Op::Not => op_not(self),
                Op::Negate => op_negate(self)?,

                Op::Jump(target) | Op::Loop(target) => self.jump_to(target),
                Op::JumpIfFalse(target) => {
                    if self.is_falsey(self.peek(0)) {
                        self.jump_to(target);
                    }
                }
                Op::Break => {}

                Op::Import(index) => {
                    let name = self.name_constant(index);
                    op_import(self, name)?
                }
                Op::Call(argc) => {
                    let callee = self.peek(argc as usize);
                    self.call_value(callee, argc)?;
                }
                Op::Invoke(index, argc) => self.invoke(self.name_constant(index), argc)?,
                Op::SuperInvoke(index, argc) => {
                    let name = self.name_constant(index);
                    op_super_invoke(self, name, argc)?
                }
                Op::Closure(index) => {
                    let function = self.constant(index).as_obj();
                    op_closure(self, function)?
                }
                Op::CloseUpvalue => {
                    self.close_upvalues(self.stack.len().saturating_sub(1));
                    self.pop();
                }
                Op::Return => {
                    let result = self.pop();
                    let Some(frame) = self.frames.pop() else {
                        return Ok(result);
                    };
                    self.close_upvalues(frame.slots);
                    let result = if frame.is_import {
                        let module = self.heap.function(frame.function).map(|f| f.module);
                        self.last_module = module;
                        module.map_or(result, Value::object)
                    } else {
                        result
                    };
                    self.stack.truncate(frame.slots);
                    if self.frames.len() <= base {
                        return Ok(result);
                    }
                    self.push(result);
                }

                Op::Class(index) => {
                    let name = self.name_constant(index);
                    op_class(self, name)
                }
                Op::Subclass(index) => {
                    let name = self.name_constant(index);
                    op_subclass(self, name)?
                }
                Op::Method(index) => {
                    let name = self.name_constant(index);
                    op_method(self, name)
                }
                Op::Enum(index) => {
                    let name = self.name_constant(index);
                    op_enum(self, name)
                }
                Op::EnumValue(index) => {
                    let name = self.name_constant(index);
                    op_enum_value(self, name)
                }
                Op::NewList(count) => op_new_list(self, count)?,
                Op::NewMap(count) => op_new_map(self, count)?,
            }
        }
    }

    /// Sets a variable in the current module. Returns `true` if it was new.
    fn module_set(&mut self, name: ObjectId, value: Value) -> bool {
        let hash = self.heap.string_hash(name);
        let Some(module) = self.current_module() else {
            return false;
        };
        self.mutate(module, |obj| match obj {
            Obj::Module(m) => m.values.set(name, hash, value),
            _ => false,
        })
        .unwrap_or(false)
    }

    fn module_delete(&mut self, name: ObjectId) {
        let hash = self.heap.string_hash(name);
        if let Some(module) = self.current_module() {
            self.mutate(module, |obj| {
                if let Obj::Module(m) = obj {
                    m.values.delete(name, hash);
                }
            });
        }
    }
}
