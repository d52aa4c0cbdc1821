//! Arithmetic, comparison and logical operators.
//!
//! Operands stay on the stack until the result is ready, so anything an
//! allocation might collect is still rooted.

use crate::core::{ObjType, Value, values_equal};
use crate::errors::VmError;
use crate::vm::Vm;

fn operand_types(vm: &Vm, op: &'static str) -> VmError {
    VmError::OperandTypes {
        op,
        left: vm.type_name(vm.peek(1)),
        right: vm.type_name(vm.peek(0)),
    }
}

#[inline]
fn replace_pair(vm: &mut Vm, result: Value) {
    vm.pop();
    vm.pop();
    vm.push(result);
}

/// `+`: numbers add, strings concatenate, lists join into a new list.
pub(crate) fn op_add(vm: &mut Vm) -> Result<(), VmError> {
    let b = vm.peek(0);
    let a = vm.peek(1);
    if a.is_number() && b.is_number() {
        replace_pair(vm, Value::from_f64(a.as_number() + b.as_number()));
        return Ok(());
    }
    if vm.is_type(a, ObjType::String) && vm.is_type(b, ObjType::String) {
        let left = vm.heap.str(a.as_obj());
        let right = vm.heap.str(b.as_obj());
        let mut joined = String::with_capacity(left.len() + right.len());
        joined.push_str(left);
        joined.push_str(right);
        let result = vm.take_string(joined);
        replace_pair(vm, Value::object(result));
        return Ok(());
    }
    let lists = a
        .as_obj_opt()
        .zip(b.as_obj_opt())
        .and_then(|(x, y)| Some((vm.heap.list(x)?, vm.heap.list(y)?)));
    if let Some((left, right)) = lists {
        let mut joined = Vec::with_capacity(left.len() + right.len());
        joined.extend_from_slice(left);
        joined.extend_from_slice(right);
        let result = vm.new_list(joined);
        replace_pair(vm, Value::object(result));
        return Ok(());
    }
    Err(operand_types(vm, "+"))
}

/// Binary operator over two numbers.
pub(crate) fn op_numeric(
    vm: &mut Vm,
    symbol: &'static str,
    apply: impl FnOnce(f64, f64) -> Value,
) -> Result<(), VmError> {
    let b = vm.peek(0);
    let a = vm.peek(1);
    if !a.is_number() || !b.is_number() {
        return Err(operand_types(vm, symbol));
    }
    replace_pair(vm, apply(a.as_number(), b.as_number()));
    Ok(())
}

/// Bitwise operator; both operands are truncated to 32-bit integers.
pub(crate) fn op_bitwise(
    vm: &mut Vm,
    symbol: &'static str,
    apply: fn(i32, i32) -> i32,
) -> Result<(), VmError> {
    op_numeric(vm, symbol, |a, b| {
        Value::from_f64(apply(to_i32(a), to_i32(b)) as f64)
    })
}

#[inline]
fn to_i32(n: f64) -> i32 {
    n as i64 as i32
}

pub(crate) fn op_equal(vm: &mut Vm) {
    let b = vm.pop();
    let a = vm.pop();
    vm.push(Value::from_bool(values_equal(a, b)));
}

pub(crate) fn op_not(vm: &mut Vm) {
    let value = vm.pop();
    let falsey = vm.is_falsey(value);
    vm.push(Value::from_bool(falsey));
}

pub(crate) fn op_negate(vm: &mut Vm) -> Result<(), VmError> {
    let value = vm.peek(0);
    if !value.is_number() {
        return Err(VmError::UnaryOperand(vm.type_name(value)));
    }
    vm.pop();
    vm.push(Value::from_f64(-value.as_number()));
    Ok(())
}
