mod common;

use common::{number, quiet_vm, run, stress_vm, text, var};
use ln_ir::{FunctionBuilder, Op};
use ln_runtime::{InterpretResult, Value, Vm, VmError};

fn add_function() -> ln_ir::FunctionProto {
    let mut add = FunctionBuilder::function("add", 2);
    add.emit(Op::GetLocal(1));
    add.emit(Op::GetLocal(2));
    add.emit(Op::Add);
    add.emit(Op::Return);
    add.finish()
}

fn define(script: &mut FunctionBuilder, name: &str) {
    let idx = script.string(name);
    script.emit(Op::DefineModule(idx));
}

fn get(script: &mut FunctionBuilder, name: &str) {
    let idx = script.string(name);
    script.emit(Op::GetModule(idx));
}

fn end(script: &mut FunctionBuilder) {
    script.emit(Op::Nil);
    script.emit(Op::Return);
}

#[test]
fn add_two_numbers() {
    for mut vm in [quiet_vm(), stress_vm()] {
        let mut script = FunctionBuilder::script();
        script.emit_closure(add_function());
        define(&mut script, "add");
        get(&mut script, "add");
        script.emit_number(2.0);
        script.emit_number(3.0);
        script.emit(Op::Call(2));
        define(&mut script, "result");
        end(&mut script);

        assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
        assert_eq!(number(&vm, "result"), 5.0);
        assert_eq!(vm.stack_len(), 0);
        assert_eq!(vm.frame_count(), 0);
    }
}

#[test]
fn embedder_can_call_script_functions() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.emit_closure(add_function());
    define(&mut script, "add");
    end(&mut script);
    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);

    let add = var(&vm, "add");
    let result = vm
        .call_function(add, &[Value::from_f64(20.0), Value::from_f64(22.0)])
        .unwrap();
    assert_eq!(result, Value::from_f64(42.0));
}

#[test]
fn strings_concatenate_into_interned_result() {
    let mut vm = stress_vm();
    let mut script = FunctionBuilder::script();
    script.emit_string("foo");
    script.emit_string("bar");
    script.emit(Op::Add);
    define(&mut script, "joined");
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
    assert_eq!(text(&vm, "joined"), "foobar");
    let id = var(&vm, "joined").as_obj();
    assert_eq!(vm.find_string("foobar"), Some(id));
    assert_eq!(vm.copy_string("foobar"), id);
}

#[test]
fn undefined_global_is_a_runtime_error() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.line(3);
    let name = script.string("missing");
    script.emit(Op::GetGlobal(name));
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    let err = vm.last_error().unwrap();
    assert_eq!(err.error, VmError::UndefinedVariable("missing".into()));
    assert_eq!(err.trace.len(), 1);
    assert_eq!(err.trace[0].function, "script");
    assert_eq!(err.trace[0].module, "main");
    assert_eq!(err.trace[0].line, 3);
    assert_eq!(vm.stack_len(), 0);
    assert_eq!(vm.frame_count(), 0);
}

#[test]
fn mismatched_operands_name_both_types() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.emit_number(1.0);
    script.emit_string("x");
    script.emit(Op::Subtract);
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    assert_eq!(
        vm.last_error().unwrap().message(),
        "Unsupported operand types for -: 'number', 'string'"
    );
}

#[test]
fn too_few_arguments_fails_extra_ones_are_ignored() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.emit_closure(add_function());
    define(&mut script, "add");
    get(&mut script, "add");
    script.emit_number(1.0);
    script.emit_number(2.0);
    script.emit_number(100.0);
    script.emit(Op::Call(3));
    define(&mut script, "extra");
    get(&mut script, "add");
    script.emit_number(1.0);
    script.emit(Op::Call(1));
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    assert_eq!(number(&vm, "extra"), 3.0);
    assert_eq!(
        vm.last_error().unwrap().message(),
        "Function 'add' expected 2 argument(s) but got 1."
    );
}

#[test]
fn nested_error_traces_every_frame() {
    let mut vm = quiet_vm();
    let mut inner = FunctionBuilder::function("inner", 0);
    inner.line(10);
    inner.emit(Op::Nil);
    inner.emit(Op::Negate);
    inner.emit(Op::Return);

    let mut script = FunctionBuilder::script();
    script.line(20);
    script.emit_closure(inner.finish());
    script.emit(Op::Call(0));
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    let err = vm.last_error().unwrap();
    assert_eq!(err.message(), "Unsupported operand type for unary -: 'nil'");
    let lines: Vec<(String, u32)> = err
        .trace
        .iter()
        .map(|f| (f.function.clone(), f.line))
        .collect();
    assert_eq!(
        lines,
        vec![("inner".to_string(), 10), ("script".to_string(), 20)]
    );
}

#[test]
fn unbounded_recursion_overflows_the_stack() {
    let mut vm = quiet_vm();
    let mut recurse = FunctionBuilder::function("recurse", 0);
    let name = recurse.string("recurse");
    recurse.emit(Op::GetModule(name));
    recurse.emit(Op::Call(0));
    recurse.emit(Op::Return);

    let mut script = FunctionBuilder::script();
    script.emit_closure(recurse.finish());
    define(&mut script, "recurse");
    get(&mut script, "recurse");
    script.emit(Op::Call(0));
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    assert_eq!(vm.last_error().unwrap().error, VmError::StackOverflow);
}

#[test]
fn falsey_values() {
    let mut vm = quiet_vm();
    let empty_string = vm.copy_string("");
    let word = vm.copy_string("a");
    let empty_list = vm.new_list(Vec::new());
    let full_list = vm.new_list(vec![Value::NIL]);
    let empty_map = vm.new_map();

    for falsey in [
        Value::NIL,
        Value::FALSE,
        Value::from_f64(0.0),
        Value::object(empty_string),
        Value::object(empty_list),
        Value::object(empty_map),
    ] {
        assert!(vm.is_falsey(falsey), "{} should be falsey", vm.display(falsey));
    }
    for truthy in [
        Value::TRUE,
        Value::from_f64(-1.0),
        Value::object(word),
        Value::object(full_list),
    ] {
        assert!(!vm.is_falsey(truthy), "{} should be truthy", vm.display(truthy));
    }
}

#[test]
fn conditional_jump_and_loop() {
    // sum = 0; i = 0; while (i < 5) { sum = sum + i; i = i + 1; }
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.emit_number(0.0);
    define(&mut script, "sum");
    script.emit_number(0.0);
    define(&mut script, "i");

    let start = script.here();
    get(&mut script, "i");
    script.emit_number(5.0);
    script.emit(Op::Less);
    let exit = script.jump(Op::JumpIfFalse);
    script.emit(Op::Pop);
    get(&mut script, "sum");
    get(&mut script, "i");
    script.emit(Op::Add);
    let sum = script.string("sum");
    script.emit(Op::SetModule(sum));
    script.emit(Op::Pop);
    get(&mut script, "i");
    script.emit_number(1.0);
    script.emit(Op::Add);
    let i = script.string("i");
    script.emit(Op::SetModule(i));
    script.emit(Op::Pop);
    script.loop_to(start);
    script.patch_jump(exit);
    script.emit(Op::Pop);
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
    assert_eq!(number(&vm, "sum"), 10.0);
}

#[test]
fn assigning_an_undeclared_module_variable_fails() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    script.emit_number(1.0);
    let name = script.string("ghost");
    script.emit(Op::SetModule(name));
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::RuntimeError);
    assert_eq!(vm.module_variable("main", "ghost"), None);
}

#[test]
fn bitwise_operators_work_on_truncated_integers() {
    let mut vm = quiet_vm();
    let mut script = FunctionBuilder::script();
    for (a, b, op, name) in [
        (6.9, 3.0, Op::BitwiseAnd, "and"),
        (4.0, 1.0, Op::BitwiseOr, "or"),
        (5.0, 1.0, Op::BitwiseXor, "xor"),
        (1.0, 4.0, Op::LeftShift, "shl"),
        (-16.0, 2.0, Op::RightShift, "shr"),
    ] {
        script.emit_number(a);
        script.emit_number(b);
        script.emit(op);
        define(&mut script, name);
    }
    script.emit_number(7.0);
    script.emit_number(4.0);
    script.emit(Op::Modulo);
    define(&mut script, "rem");
    end(&mut script);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
    assert_eq!(number(&vm, "and"), 2.0);
    assert_eq!(number(&vm, "or"), 5.0);
    assert_eq!(number(&vm, "xor"), 4.0);
    assert_eq!(number(&vm, "shl"), 16.0);
    assert_eq!(number(&vm, "shr"), -4.0);
    assert_eq!(number(&vm, "rem"), 3.0);
}

#[test]
fn compile_without_frontend_is_a_compile_error() {
    let mut vm: Vm = quiet_vm();
    assert_eq!(vm.interpret("main", "1 + 1"), InterpretResult::CompileError);
}
