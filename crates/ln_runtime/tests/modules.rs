mod common;

use common::{MemoryLoader, StubFrontend, number, quiet_vm, run};
use ln_ir::{FunctionBuilder, FunctionProto, Op};
use ln_runtime::{InterpretResult, Vm};

/// A module body: `answer = 42`.
fn answer_module() -> FunctionProto {
    let mut body = FunctionBuilder::script();
    body.emit_number(42.0);
    let answer = body.string("answer");
    body.emit(Op::DefineModule(answer));
    body.emit(Op::Nil);
    body.emit(Op::Return);
    body.finish()
}

fn importing(path: &str) -> FunctionProto {
    let mut script = FunctionBuilder::script();
    let path = script.string(path);
    let answer = script.string("answer");
    script.emit(Op::Import(path));
    script.emit(Op::GetProperty(answer));
    let first = script.string("first");
    script.emit(Op::DefineModule(first));
    script.emit(Op::Import(path));
    let again = script.string("again");
    script.emit(Op::DefineModule(again));
    script.emit(Op::Nil);
    script.emit(Op::Return);
    script.finish()
}

fn vm_with(files: &[(&str, &str)], frontend: StubFrontend) -> Vm {
    let mut vm = quiet_vm();
    let mut loader = MemoryLoader::default();
    for (path, source) in files {
        loader.files.insert(path.to_string(), source.to_string());
    }
    vm.set_module_loader(Box::new(loader));
    vm.set_frontend(Box::new(frontend));
    vm
}

#[test]
fn import_runs_the_module_once_and_yields_it() {
    let mut vm = vm_with(
        &[("lib", "answer = 42")],
        StubFrontend::default().with("lib", answer_module()),
    );

    assert_eq!(run(&mut vm, &importing("lib")), InterpretResult::Ok);
    assert_eq!(number(&vm, "first"), 42.0);

    let module = vm.module("lib").unwrap();
    assert_eq!(vm.last_module(), Some(module));
    assert_eq!(common::var(&vm, "again").as_obj(), module);
    assert_eq!(vm.module_variable("lib", "answer").map(|v| v.as_number()), Some(42.0));
    assert_eq!(vm.type_name(common::var(&vm, "again")), "module");
    assert_eq!(vm.frame_count(), 0);
}

#[test]
fn missing_module_is_a_runtime_error() {
    let mut vm = vm_with(&[], StubFrontend::default());

    assert_eq!(run(&mut vm, &importing("nowhere")), InterpretResult::RuntimeError);
    let message = vm.last_error().unwrap().message();
    assert!(message.starts_with("Could not import 'nowhere': "), "{message}");
    assert!(message.contains("no such module nowhere"), "{message}");
}

#[test]
fn module_that_fails_to_compile_is_an_import_error() {
    let mut vm = vm_with(&[("broken", "???")], StubFrontend::default());

    assert_eq!(run(&mut vm, &importing("broken")), InterpretResult::RuntimeError);
    let message = vm.last_error().unwrap().message();
    assert!(message.contains("no unit named broken"), "{message}");
    assert!(vm.module("broken").is_none());
}

#[test]
fn interpret_goes_through_the_frontend() {
    let mut vm = quiet_vm();
    vm.set_frontend(Box::new(StubFrontend::default().with("main", answer_module())));
    assert_eq!(vm.interpret("main", "answer = 42"), InterpretResult::Ok);
    assert_eq!(number(&vm, "answer"), 42.0);
    assert_eq!(vm.interpret("other", "x"), InterpretResult::CompileError);
}

#[test]
fn modules_record_their_file() {
    let mut vm = vm_with(
        &[("lib", "answer = 42")],
        StubFrontend::default().with("lib", answer_module()),
    );
    assert_eq!(run(&mut vm, &importing("lib")), InterpretResult::Ok);
    let file = vm.module_variable("lib", "__file__").unwrap();
    assert_eq!(vm.display(file), "lib");
}

#[test]
fn errors_inside_a_module_trace_through_the_import() {
    let mut failing = FunctionBuilder::script();
    failing.line(4);
    let missing = failing.string("missing");
    failing.emit(Op::GetGlobal(missing));
    failing.emit(Op::Return);

    let mut vm = vm_with(
        &[("bad", "missing")],
        StubFrontend::default().with("bad", failing.finish()),
    );
    assert_eq!(run(&mut vm, &importing("bad")), InterpretResult::RuntimeError);
    let trace = &vm.last_error().unwrap().trace;
    assert_eq!(trace.len(), 2);
    assert_eq!((trace[0].module.as_str(), trace[0].line), ("bad", 4));
    assert_eq!(trace[1].module, "main");
}
