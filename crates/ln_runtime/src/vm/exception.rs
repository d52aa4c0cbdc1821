//! Runtime error unwinding.

use super::Vm;
use crate::core::{Obj, ObjectId};
use crate::errors::{RuntimeError, TraceFrame, VmError};

/// Stack heights recorded when the embedder or a native enters the VM.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub(crate) frames: usize,
    stack: usize,
    temp_roots: usize,
    nested: bool,
}

impl Vm {
    /// Records where the current run or call starts. Must be paired with
    /// [`Vm::leave`].
    pub(crate) fn enter(&mut self) -> Entry {
        let entry = Entry {
            frames: self.frames.len(),
            stack: self.stack.len(),
            temp_roots: self.temp_roots.len(),
            nested: self.entry_depth > 0,
        };
        self.entry_depth += 1;
        entry
    }

    pub(crate) fn leave(&mut self) {
        self.entry_depth = self.entry_depth.saturating_sub(1);
    }

    /// Turns an error raised after `entry` into a [`RuntimeError`]. The
    /// outermost entry reports it and resets the VM. A nested entry, such
    /// as a native calling back into script, unwinds only what it pushed
    /// and leaves the caller's frames for the caller to recover or fail.
    pub(crate) fn fail(&mut self, error: VmError, entry: Entry) -> RuntimeError {
        if !entry.nested {
            return self.report(error);
        }
        let report = RuntimeError {
            error,
            trace: self.trace(),
        };
        tracing::debug!(
            message = %report.error,
            depth = report.trace.len(),
            "runtime error in nested call"
        );
        self.close_upvalues(entry.stack);
        self.frames.truncate(entry.frames);
        self.stack.truncate(entry.stack);
        self.temp_roots.truncate(entry.temp_roots);
        self.native_error = None;
        self.last_error = Some(report.clone());
        report
    }

    /// Converts `error` into a [`RuntimeError`] carrying one trace line per
    /// active frame, then resets the stacks. Every runtime error is fatal
    /// to the current run.
    pub(crate) fn report(&mut self, error: VmError) -> RuntimeError {
        let report = RuntimeError {
            error,
            trace: self.trace(),
        };

        tracing::error!(
            message = %report.error,
            depth = report.trace.len(),
            "runtime error"
        );
        if self.config.print_errors {
            eprintln!("{report}");
        }

        self.reset_stack();
        self.last_error = Some(report.clone());
        report
    }

    fn trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| self.trace_frame(frame.function, frame.ip))
            .collect()
    }

    fn trace_frame(&self, function: ObjectId, ip: usize) -> TraceFrame {
        let Some(Obj::Function(f)) = self.heap.try_get(function) else {
            return TraceFrame {
                function: "<unknown>".into(),
                module: String::new(),
                line: 0,
            };
        };
        let module = match self.heap.try_get(f.module) {
            Some(Obj::Module(m)) => self.heap.str(m.name).to_string(),
            _ => String::new(),
        };
        TraceFrame {
            function: f
                .name
                .map_or_else(|| "script".to_string(), |n| self.heap.str(n).to_string()),
            module,
            // ip already points past the failing op.
            line: f.line_at(ip.saturating_sub(1)),
        }
    }

    pub(crate) fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
        self.temp_roots.clear();
        self.native_error = None;
    }
}
