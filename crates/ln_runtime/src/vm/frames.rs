//! Call frames and upvalue capture.

use std::rc::Rc;

use ln_ir::Op;

use super::Vm;
use crate::core::{Obj, ObjectId, UpvalueState, Value};

/// One activation record.
#[derive(Clone, Debug)]
pub struct CallFrame {
    pub(crate) closure: ObjectId,
    pub(crate) function: ObjectId,
    pub(crate) code: Rc<[Op]>,
    pub(crate) ip: usize,
    /// Stack index of slot 0 (the callee or receiver).
    pub(crate) slots: usize,
    /// Returning from this frame yields its module instead of the result.
    pub(crate) is_import: bool,
}

impl Vm {
    fn open_upvalue(&self, id: ObjectId) -> Option<(Option<usize>, Option<ObjectId>)> {
        match self.heap.try_get(id)? {
            Obj::Upvalue(u) => match u.state {
                UpvalueState::Open(slot) => Some((Some(slot), u.next)),
                UpvalueState::Closed(_) => Some((None, u.next)),
            },
            _ => None,
        }
    }

    /// Returns the open upvalue for `slot`, creating and linking one if no
    /// closure has captured that slot yet.
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> ObjectId {
        let mut prev: Option<ObjectId> = None;
        let mut current = self.open_upvalues;
        while let Some(id) = current {
            match self.open_upvalue(id) {
                Some((Some(location), _)) if location == slot => return id,
                Some((Some(location), next)) if location > slot => {
                    prev = Some(id);
                    current = next;
                }
                _ => break,
            }
        }

        let created = self.new_upvalue(slot, current);
        match prev {
            None => self.open_upvalues = Some(created),
            Some(prev) => {
                if let Some(Obj::Upvalue(u)) = self.heap.try_get_mut(prev) {
                    u.next = Some(created);
                }
            }
        }
        created
    }

    /// Closes every open upvalue at or above stack index `last`, copying
    /// the slot's current value into the upvalue.
    pub(crate) fn close_upvalues(&mut self, last: usize) {
        while let Some(id) = self.open_upvalues {
            let Some(Obj::Upvalue(upvalue)) = self.heap.try_get_mut(id) else {
                self.open_upvalues = None;
                break;
            };
            if let UpvalueState::Open(slot) = upvalue.state {
                if slot < last {
                    break;
                }
                let value = self.stack.get(slot).copied().unwrap_or(Value::NIL);
                upvalue.state = UpvalueState::Closed(value);
            }
            self.open_upvalues = upvalue.next.take();
        }
    }

    pub(crate) fn upvalue_get(&self, id: ObjectId) -> Value {
        match self.heap.try_get(id) {
            Some(Obj::Upvalue(u)) => match u.state {
                UpvalueState::Open(slot) => self.stack.get(slot).copied().unwrap_or(Value::NIL),
                UpvalueState::Closed(value) => value,
            },
            _ => Value::NIL,
        }
    }

    pub(crate) fn upvalue_set(&mut self, id: ObjectId, value: Value) {
        let Some(Obj::Upvalue(u)) = self.heap.try_get_mut(id) else {
            return;
        };
        match u.state {
            UpvalueState::Open(slot) => {
                if let Some(cell) = self.stack.get_mut(slot) {
                    *cell = value;
                }
            }
            UpvalueState::Closed(_) => u.state = UpvalueState::Closed(value),
        }
    }

    /// Number of upvalues still aliasing stack slots.
    pub fn open_upvalue_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.open_upvalues;
        while let Some((_, next)) = current.and_then(|id| self.open_upvalue(id)) {
            count += 1;
            current = next;
        }
        count
    }
}
