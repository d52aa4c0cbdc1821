mod common;

use common::{quiet_vm, run, stress_vm, var};
use ln_ir::{FunctionBuilder, Op};
use ln_runtime::{Heap, InterpretResult, Obj, ObjType, Value};

#[test]
fn unrooted_objects_are_swept_rooted_ones_survive() {
    let mut vm = quiet_vm();
    let dropped = vm.new_list(Vec::new());
    let kept = vm.new_list(Vec::new());
    vm.push(Value::object(kept));

    vm.collect_garbage();

    assert!(!vm.is_live(dropped));
    assert!(vm.is_live(kept));
    assert_eq!(vm.list_items(Value::object(kept)), Some(&[][..]));
}

#[test]
fn reachability_follows_list_elements() {
    let mut vm = quiet_vm();
    let word = vm.copy_string("element");
    let list = vm.new_list(vec![Value::object(word)]);
    vm.push(Value::object(list));

    vm.collect_garbage();

    assert!(vm.is_live(word));
    assert_eq!(vm.find_string("element"), Some(word));
}

#[test]
fn byte_count_is_recomputed_from_survivors() {
    let mut vm = quiet_vm();
    for i in 0..100 {
        let s = vm.copy_string(&format!("garbage {i}"));
        if i % 10 == 0 {
            vm.push(Value::object(s));
        }
    }

    vm.collect_garbage();

    let heap = vm.heap();
    let summed: usize = heap.iter().map(|(_, obj)| obj.size()).sum();
    assert_eq!(heap.bytes_allocated(), summed);
    assert_eq!(heap.stats().bytes, summed);
    assert_eq!(
        heap.next_gc(),
        summed * vm.config().gc_grow_factor
    );
    assert_eq!(heap.stats().objects, heap.len());
}

#[test]
fn intern_table_forgets_collected_strings() {
    let mut vm = quiet_vm();
    let first = vm.copy_string("transient");
    assert_eq!(vm.copy_string("transient"), first);
    assert_eq!(vm.find_string("transient"), Some(first));

    vm.collect_garbage();

    assert!(!vm.is_live(first));
    assert_eq!(vm.find_string("transient"), None);
    let again = vm.copy_string("transient");
    assert_ne!(again, first);
    assert_eq!(vm.string(again), Some("transient"));
}

#[test]
fn reserved_names_and_natives_are_roots() {
    let mut vm = quiet_vm();
    vm.collect_garbage();
    for name in ["init", "_class", "__file__", "print", "push"] {
        assert!(vm.find_string(name).is_some(), "{name} was collected");
    }
    assert!(vm.global("print").is_some());
}

#[test]
fn unreachable_cycles_are_freed() {
    let mut heap = Heap::new(1 << 20);
    let a = heap.alloc(Obj::List(Vec::new()));
    let b = heap.alloc(Obj::List(vec![Value::object(a)]));
    heap.update(a, |obj| {
        if let Obj::List(items) = obj {
            items.push(Value::object(b));
        }
    });
    let root = heap.alloc(Obj::List(Vec::new()));

    let mut gray = Vec::new();
    assert!(heap.mark(root));
    gray.push(root);
    heap.trace_references(&mut gray);

    assert_eq!(heap.sweep(), 2);
    assert!(heap.contains(root));
    assert!(!heap.contains(a));
    assert!(!heap.contains(b));
}

#[test]
fn reachable_cycles_survive() {
    let mut heap = Heap::new(1 << 20);
    let a = heap.alloc(Obj::List(Vec::new()));
    let b = heap.alloc(Obj::List(vec![Value::object(a)]));
    heap.update(a, |obj| {
        if let Obj::List(items) = obj {
            items.push(Value::object(b));
        }
    });

    let mut gray = Vec::new();
    assert!(heap.mark(a));
    gray.push(a);
    heap.trace_references(&mut gray);

    assert_eq!(heap.sweep(), 0);
    assert!(heap.contains(b));
    assert_eq!(heap.stats().by_type.get(&ObjType::List), Some(&(2, heap.bytes_allocated())));
}

#[test]
fn stress_collection_preserves_program_results() {
    // xs = []; for i in 0..50 { xs.push("item" + i) } -- strings built at runtime
    let mut vm = stress_vm();
    let mut script = FunctionBuilder::script();
    let xs = script.string("xs");
    let push = script.string("push");
    script.emit(Op::NewList(0));
    script.emit(Op::DefineModule(xs));
    for i in 0..50 {
        script.emit(Op::GetModule(xs));
        script.emit_string("item");
        script.emit_string(&format!("{i}"));
        script.emit(Op::Add);
        script.emit(Op::Invoke(push, 1));
        script.emit(Op::Pop);
    }
    script.emit(Op::Nil);
    script.emit(Op::Return);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
    let items = vm.list_items(var(&vm, "xs")).unwrap().to_vec();
    assert_eq!(items.len(), 50);
    assert_eq!(vm.display(items[49]), "item49");
    vm.collect_garbage();
    assert!(items.iter().all(|v| vm.is_live(v.as_obj())));
}

/// Script that pushes 200 batches of 200 numbers onto the existing list
/// `xs`. Apart from the loop counter it allocates nothing.
fn grow_xs() -> ln_ir::FunctionProto {
    let mut script = FunctionBuilder::script();
    let xs = script.string("xs");
    let n = script.string("n");
    let push = script.string("push");
    let numbers: Vec<u32> = (0..200).map(|i| script.number(f64::from(i))).collect();
    script.emit_number(0.0);
    script.emit(Op::DefineModule(n));

    let start = script.here();
    script.emit(Op::GetModule(n));
    script.emit_number(200.0);
    script.emit(Op::Less);
    let exit = script.jump(Op::JumpIfFalse);
    script.emit(Op::Pop);
    script.emit(Op::GetModule(xs));
    for &index in &numbers {
        script.emit(Op::Constant(index));
    }
    script.emit(Op::Invoke(push, 200));
    script.emit(Op::Pop);
    script.emit(Op::GetModule(n));
    script.emit_number(1.0);
    script.emit(Op::Add);
    script.emit(Op::SetModule(n));
    script.emit(Op::Pop);
    script.loop_to(start);
    script.patch_jump(exit);
    script.emit(Op::Pop);
    script.emit(Op::Nil);
    script.emit(Op::Return);
    script.finish()
}

fn define_empty_xs(vm: &mut ln_runtime::Vm) {
    let mut script = FunctionBuilder::script();
    let xs = script.string("xs");
    script.emit(Op::NewList(0));
    script.emit(Op::DefineModule(xs));
    script.emit(Op::Nil);
    script.emit(Op::Return);
    assert_eq!(run(vm, &script.finish()), InterpretResult::Ok);
}

#[test]
fn container_growth_is_charged() {
    let mut vm = quiet_vm();
    define_empty_xs(&mut vm);
    assert_eq!(run(&mut vm, &grow_xs()), InterpretResult::Ok);

    assert_eq!(vm.list_items(var(&vm, "xs")).map(<[_]>::len), Some(40_000));
    assert_eq!(vm.heap().bytes_allocated(), vm.heap().stats().bytes);
}

#[test]
fn container_growth_alone_triggers_collection() {
    let mut vm = quiet_vm();
    define_empty_xs(&mut vm);
    let closure = vm.closure_for("main", &grow_xs());
    vm.push(Value::object(closure));
    vm.collect_garbage();
    vm.pop();

    let garbage = vm.new_list(Vec::new());
    assert!(vm.heap().bytes_allocated() < vm.heap().next_gc());
    assert_eq!(vm.run(closure), InterpretResult::Ok);

    assert!(!vm.is_live(garbage));
    assert_eq!(vm.heap().bytes_allocated(), vm.heap().stats().bytes);
}

#[test]
fn map_and_field_growth_is_charged() {
    // m = {}; for i in 0..100 { m[i] = i }
    let mut vm = stress_vm();
    let mut script = FunctionBuilder::script();
    let m = script.string("m");
    script.emit(Op::NewMap(0));
    script.emit(Op::DefineModule(m));
    for i in 0..100 {
        script.emit(Op::GetModule(m));
        script.emit_number(f64::from(i));
        script.emit_number(f64::from(i));
        script.emit(Op::SetIndex);
        script.emit(Op::Pop);
    }
    script.emit(Op::Nil);
    script.emit(Op::Return);

    assert_eq!(run(&mut vm, &script.finish()), InterpretResult::Ok);
    let map = var(&vm, "m");
    assert_eq!(vm.map_get(map, Value::from_f64(99.0)), Some(Value::from_f64(99.0)));
    assert_eq!(vm.heap().bytes_allocated(), vm.heap().stats().bytes);
}
