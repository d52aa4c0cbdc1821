//! Textual rendering of values and their type names.

use crate::core::{Obj, ObjectId, Value, ValueKind};
use crate::vm::Vm;

/// Containers nested deeper than this print as `...`.
const MAX_DEPTH: usize = 16;

pub(crate) fn format_number(n: f64, out: &mut String) {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        out.push_str(buf.format(n as i64));
        if n == 0.0 && n.is_sign_negative() {
            out.insert(out.len() - 1, '-');
        }
    } else {
        let mut buf = ryu::Buffer::new();
        out.push_str(buf.format(n));
    }
}

impl Vm {
    /// The user-facing text of `value`.
    pub fn display(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(value, &mut out, 0);
        out
    }

    fn write_value(&self, value: Value, out: &mut String, depth: usize) {
        match value.kind() {
            ValueKind::Nil => out.push_str("nil"),
            ValueKind::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            ValueKind::Empty => out.push_str("<empty>"),
            ValueKind::Number(n) => format_number(n, out),
            ValueKind::Object(id) => {
                let Some(obj) = self.heap.try_get(id) else {
                    out.push_str("<freed>");
                    return;
                };
                self.write_object(obj, out, depth);
            }
        }
    }

    fn write_function(&self, function: ObjectId, out: &mut String) {
        match self.heap.function(function).and_then(|f| f.name) {
            Some(name) => {
                out.push_str("<fn ");
                out.push_str(self.heap.str(name));
                out.push('>');
            }
            None => out.push_str("<script>"),
        }
    }

    fn write_object(&self, obj: &Obj, out: &mut String, depth: usize) {
        match obj {
            Obj::String(s) => out.push_str(&s.chars),
            Obj::Function(f) => match f.name {
                Some(name) => {
                    out.push_str("<fn ");
                    out.push_str(self.heap.str(name));
                    out.push('>');
                }
                None => out.push_str("<script>"),
            },
            Obj::Closure(c) => self.write_function(c.function, out),
            Obj::BoundMethod(b) => match self.heap.closure(b.method) {
                Some(c) => self.write_function(c.function, out),
                None => out.push_str("<native fn>"),
            },
            Obj::Upvalue(_) => out.push_str("upvalue"),
            Obj::Native(_) => out.push_str("<native fn>"),
            Obj::Class(c) => {
                out.push_str("<class ");
                out.push_str(self.heap.str(c.name));
                out.push('>');
            }
            Obj::Instance(i) => {
                out.push('<');
                if let Some(class) = self.heap.class(i.class) {
                    out.push_str(self.heap.str(class.name));
                }
                out.push_str(" instance>");
            }
            Obj::Module(m) => {
                out.push_str("<module ");
                out.push_str(self.heap.str(m.name));
                out.push('>');
            }
            Obj::Enum(e) => {
                out.push_str("<enum ");
                out.push_str(self.heap.str(e.name));
                out.push('>');
            }
            Obj::File(f) => {
                out.push_str("<file ");
                out.push_str(&f.path);
                out.push('>');
            }
            Obj::List(items) => {
                if depth >= MAX_DEPTH {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(*item, out, depth + 1);
                }
                out.push(']');
            }
            Obj::Map(table) => {
                if depth >= MAX_DEPTH {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (i, (key, value)) in table.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(key, out, depth + 1);
                    out.push_str(": ");
                    self.write_value(value, out, depth + 1);
                }
                out.push('}');
            }
        }
    }

    /// Name of `value`'s type as used in error messages. Instances report
    /// their class name.
    pub fn type_name(&self, value: Value) -> String {
        let name = match value.kind() {
            ValueKind::Nil => "nil",
            ValueKind::Bool(_) => "bool",
            ValueKind::Empty => "empty",
            ValueKind::Number(_) => "number",
            ValueKind::Object(id) => match self.heap.try_get(id) {
                Some(Obj::String(_)) => "string",
                Some(Obj::List(_)) => "list",
                Some(Obj::Map(_)) => "map",
                Some(Obj::Function(_)) | Some(Obj::Closure(_)) => "func",
                Some(Obj::BoundMethod(_)) => "method",
                Some(Obj::Native(_)) => "native",
                Some(Obj::Class(_)) => "class",
                Some(Obj::Enum(_)) => "enum",
                Some(Obj::Module(_)) => "module",
                Some(Obj::File(_)) => "file",
                Some(Obj::Upvalue(_)) => "upvalue",
                Some(Obj::Instance(i)) => {
                    return self
                        .heap
                        .class(i.class)
                        .map_or_else(|| "instance".to_string(), |c| self.heap.str(c.name).to_string());
                }
                None => "freed",
            },
        };
        name.to_string()
    }
}
