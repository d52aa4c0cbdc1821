//! Mark-sweep garbage collection.
//!
//! Collection runs synchronously inside the allocation that crosses the
//! threshold: roots are marked gray, the gray worklist is drained, dead
//! strings are dropped from the intern table, then the heap is swept.

use crate::core::{Heap, Obj, ObjectId, Table, Value};
use crate::vm::Vm;

fn mark_object(heap: &mut Heap, gray: &mut Vec<ObjectId>, id: ObjectId) {
    if heap.mark(id) {
        gray.push(id);
    }
}

fn mark_value(heap: &mut Heap, gray: &mut Vec<ObjectId>, value: Value) {
    if let Some(id) = value.as_obj_opt() {
        mark_object(heap, gray, id);
    }
}

fn mark_table(heap: &mut Heap, gray: &mut Vec<ObjectId>, table: &Table) {
    for (key, value) in table.iter() {
        mark_object(heap, gray, key);
        mark_value(heap, gray, value);
    }
}

impl Vm {
    /// Runs a full collection now.
    pub fn collect_garbage(&mut self) {
        self.collect_with(&[]);
    }

    pub(crate) fn collect_with(&mut self, extra_roots: &[ObjectId]) {
        let before = self.heap.bytes_allocated();
        let mut gray = Vec::new();

        self.mark_roots(&mut gray);
        for &id in extra_roots {
            mark_object(&mut self.heap, &mut gray, id);
        }
        self.heap.trace_references(&mut gray);

        let heap = &self.heap;
        let dead_strings = self.strings.retain(|id, _| heap.is_marked(id));

        let freed = self.heap.sweep();
        let after = self.heap.bytes_allocated();
        let next = after.saturating_mul(self.config.gc_grow_factor);
        self.heap.set_next_gc(next);

        tracing::debug!(
            before,
            after,
            freed,
            dead_strings,
            next_gc = next,
            "gc cycle"
        );
    }

    fn mark_roots(&mut self, gray: &mut Vec<ObjectId>) {
        let Vm {
            heap,
            stack,
            frames,
            open_upvalues,
            globals,
            modules,
            string_methods,
            list_methods,
            map_methods,
            file_methods,
            init_string,
            class_key,
            file_key,
            temp_roots,
            last_module,
            ..
        } = self;

        for &value in stack.iter() {
            mark_value(heap, gray, value);
        }
        for frame in frames.iter() {
            mark_object(heap, gray, frame.closure);
        }

        let mut upvalue = *open_upvalues;
        while let Some(id) = upvalue {
            mark_object(heap, gray, id);
            upvalue = match heap.try_get(id) {
                Some(Obj::Upvalue(u)) => u.next,
                _ => None,
            };
        }

        for table in [
            &*globals,
            &*modules,
            &*string_methods,
            &*list_methods,
            &*map_methods,
            &*file_methods,
        ] {
            mark_table(heap, gray, table);
        }

        for id in [*init_string, *class_key, *file_key] {
            mark_object(heap, gray, id);
        }
        for &value in temp_roots.iter() {
            mark_value(heap, gray, value);
        }
        if let Some(module) = *last_module {
            mark_object(heap, gray, module);
        }
    }

    /// Whether `id` still resolves to a live object.
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.heap.contains(id)
    }
}

