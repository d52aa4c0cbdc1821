//! Object arena and collection bookkeeping.
//!
//! Objects live in slots addressed by [`ObjectId`]. A slot's generation is
//! bumped whenever its object is freed, so a stale handle to a reused slot
//! never resolves. A slot whose generation is exhausted is retired rather
//! than reused. Mark bits are kept apart from the slots so tracing can
//! read objects while marking others.

use ahash::RandomState;
use hashbrown::HashMap;

use super::object::{ClassObj, ClosureObj, FunctionObj, ModuleObj, Obj, ObjType, StringObj};
use super::table::ValueTable;
use super::value::Value;

pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

/// Generation bits that fit beside the 32-bit index in a value payload.
pub const GENERATION_BITS: u32 = 18;
pub const MAX_GENERATION: u32 = (1 << GENERATION_BITS) - 1;

/// Handle to a heap-allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) fn to_payload(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[inline]
    pub(crate) fn from_payload(payload: u64) -> Self {
        Self {
            index: payload as u32,
            generation: (payload >> 32) as u32 & MAX_GENERATION,
        }
    }
}

struct Slot {
    generation: u32,
    object: Option<Obj>,
}

/// Per-type object counts and byte totals.
#[derive(Debug, Default)]
pub struct HeapStats {
    pub objects: usize,
    pub bytes: usize,
    pub by_type: FastHashMap<ObjType, (usize, usize)>,
}

pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    marks: Vec<u64>,
    live: usize,
    bytes_allocated: usize,
    next_gc: usize,
}

impl Heap {
    pub fn new(initial_threshold: usize) -> Self {
        Self {
            slots: Vec::with_capacity(1024),
            free_list: Vec::new(),
            marks: Vec::new(),
            live: 0,
            bytes_allocated: 0,
            next_gc: initial_threshold,
        }
    }

    /// Stores `obj` and returns its handle. Never collects; the VM decides
    /// when to collect before calling this.
    pub fn alloc(&mut self, obj: Obj) -> ObjectId {
        let size = obj.size();
        self.bytes_allocated += size;
        self.live += 1;
        let ty = obj.obj_type();

        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(obj);
            ObjectId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(obj),
            });
            ObjectId::new(index, 0)
        };
        tracing::trace!(index = id.index, ?ty, size, "alloc");
        id
    }

    #[inline]
    pub fn try_get(&self, id: ObjectId) -> Option<&Obj> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutable access that bypasses size accounting. Only for changes that
    /// cannot alter [`Obj::size`]; everything else goes through
    /// [`Heap::update`].
    #[inline]
    pub(crate) fn try_get_mut(&mut self, id: ObjectId) -> Option<&mut Obj> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Runs `f` on the object behind `id` and charges any change in its
    /// size. Returns `f`'s result and whether the object grew, or `None`
    /// for a stale handle.
    pub fn update<R>(&mut self, id: ObjectId, f: impl FnOnce(&mut Obj) -> R) -> Option<(R, bool)> {
        let obj = self.try_get_mut(id)?;
        let before = obj.size();
        let result = f(obj);
        let after = obj.size();
        if after != before {
            self.bytes_allocated = (self.bytes_allocated + after).saturating_sub(before);
            tracing::trace!(index = id.index, before, after, "resize");
        }
        Some((result, after > before))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.try_get(id).is_some()
    }

    #[inline]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    #[inline]
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    pub(crate) fn set_next_gc(&mut self, bytes: usize) {
        self.next_gc = bytes;
    }

    /// Number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Obj)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.object
                .as_ref()
                .map(|obj| (ObjectId::new(i as u32, slot.generation), obj))
        })
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    pub fn string(&self, id: ObjectId) -> Option<&StringObj> {
        match self.try_get(id)? {
            Obj::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn function(&self, id: ObjectId) -> Option<&FunctionObj> {
        match self.try_get(id)? {
            Obj::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn closure(&self, id: ObjectId) -> Option<&ClosureObj> {
        match self.try_get(id)? {
            Obj::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn class(&self, id: ObjectId) -> Option<&ClassObj> {
        match self.try_get(id)? {
            Obj::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn module(&self, id: ObjectId) -> Option<&ModuleObj> {
        match self.try_get(id)? {
            Obj::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn list(&self, id: ObjectId) -> Option<&Vec<Value>> {
        match self.try_get(id)? {
            Obj::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn map(&self, id: ObjectId) -> Option<&ValueTable> {
        match self.try_get(id)? {
            Obj::Map(table) => Some(table),
            _ => None,
        }
    }

    pub fn str(&self, id: ObjectId) -> &str {
        self.string(id).map_or("", |s| &s.chars)
    }

    pub fn string_hash(&self, id: ObjectId) -> u32 {
        self.string(id).map_or(0, |s| s.hash)
    }

    pub fn obj_type(&self, value: Value) -> Option<ObjType> {
        value
            .as_obj_opt()
            .and_then(|id| self.try_get(id))
            .map(Obj::obj_type)
    }

    pub fn is_type(&self, value: Value, ty: ObjType) -> bool {
        self.obj_type(value) == Some(ty)
    }

    /// Hash used for value-keyed maps: a string's content hash, otherwise a
    /// mix of the raw bits.
    pub fn value_hash(&self, value: Value) -> u32 {
        if let Some(s) = value.as_obj_opt().and_then(|id| self.string(id)) {
            return s.hash;
        }
        value.mixed_hash()
    }

    // ------------------------------------------------------------------
    // Marking
    // ------------------------------------------------------------------

    pub fn is_marked(&self, id: ObjectId) -> bool {
        let index = id.index as usize;
        self.marks
            .get(index >> 6)
            .is_some_and(|w| (w & (1 << (index & 63))) != 0)
    }

    /// Marks `id`. Returns `true` if it was live and not yet marked.
    pub fn mark(&mut self, id: ObjectId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let index = id.index as usize;
        let word = index >> 6;
        if word >= self.marks.len() {
            self.marks.resize(word + 1, 0);
        }
        let bit = 1u64 << (index & 63);
        let w = &mut self.marks[word];
        if *w & bit != 0 {
            return false;
        }
        *w |= bit;
        true
    }

    /// Drains the gray worklist, blackening each object by marking what it
    /// references.
    pub fn trace_references(&mut self, gray: &mut Vec<ObjectId>) {
        let mut children = Vec::new();
        while let Some(id) = gray.pop() {
            children.clear();
            if let Some(obj) = self.try_get(id) {
                obj.trace(&mut children);
            }
            for &child in &children {
                if self.mark(child) {
                    gray.push(child);
                }
            }
        }
    }

    /// Frees every unmarked object and clears all marks. Returns how many
    /// objects were freed. Afterwards `bytes_allocated` is exactly the sum
    /// of the survivors' sizes.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut live_bytes = 0;
        for index in 0..self.slots.len() {
            let marked = self.is_marked(ObjectId::new(index as u32, 0));
            let slot = &mut self.slots[index];
            let Some(obj) = slot.object.as_ref() else {
                continue;
            };
            if marked {
                live_bytes += obj.size();
                continue;
            }
            if let Some(obj) = slot.object.take() {
                release(index as u32, obj);
            }
            freed += 1;
            if slot.generation == MAX_GENERATION {
                tracing::debug!(index, "retiring slot with exhausted generation");
                continue;
            }
            slot.generation += 1;
            self.free_list.push(index as u32);
        }
        self.marks.clear();
        self.live -= freed;
        self.bytes_allocated = live_bytes;
        freed
    }

    /// Unconditionally frees everything.
    pub fn free_all(&mut self) -> usize {
        self.marks.clear();
        self.sweep()
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            by_type: HashMap::with_hasher(RandomState::with_seeds(0, 0, 0, 0)),
            ..HeapStats::default()
        };
        for (_, obj) in self.iter() {
            let size = obj.size();
            stats.objects += 1;
            stats.bytes += size;
            let entry = stats.by_type.entry(obj.obj_type()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += size;
        }
        stats
    }
}

fn release(index: u32, obj: Obj) {
    if let Obj::File(file) = &obj {
        if file.handle.is_some() {
            tracing::debug!(path = %file.path, "closing file handle of collected file object");
        }
    }
    tracing::trace!(index, ty = ?obj.obj_type(), "free");
    drop(obj);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Obj {
        Obj::String(StringObj {
            chars: s.into(),
            hash: ln_ir::fnv1a_32(s.as_bytes()),
        })
    }

    #[test]
    fn stale_handle_does_not_resolve() {
        let mut heap = Heap::new(1024);
        let a = heap.alloc(string("a"));
        assert_eq!(heap.sweep(), 1);
        let b = heap.alloc(string("b"));
        assert_eq!(a.index(), b.index());
        assert!(heap.try_get(a).is_none());
        assert_eq!(heap.str(b), "b");
    }

    #[test]
    fn sweep_keeps_marked_and_recounts_bytes() {
        let mut heap = Heap::new(1024);
        let keep = heap.alloc(string("keep"));
        heap.alloc(string("drop"));
        heap.mark(keep);
        assert_eq!(heap.sweep(), 1);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.bytes_allocated(), heap.try_get(keep).map_or(0, Obj::size));
        assert!(!heap.is_marked(keep));
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let mut heap = Heap::new(1024);
        let a = heap.alloc(string("a"));
        heap.sweep();
        heap.slots[a.index() as usize].generation = MAX_GENERATION;

        let b = heap.alloc(string("b"));
        assert_eq!(b.index(), a.index());
        assert_eq!(b.generation(), MAX_GENERATION);
        assert_eq!(Value::object(b).as_obj(), b);

        heap.sweep();
        let c = heap.alloc(string("c"));
        assert_ne!(c.index(), b.index());
        assert!(heap.try_get(b).is_none());
        assert_eq!(heap.str(c), "c");
    }

    #[test]
    fn update_charges_growth_and_shrinkage() {
        let mut heap = Heap::new(1024);
        let list = heap.alloc(Obj::List(Vec::new()));
        let (_, grew) = heap
            .update(list, |obj| {
                if let Obj::List(items) = obj {
                    items.extend(std::iter::repeat_n(Value::NIL, 100));
                }
            })
            .unwrap();
        assert!(grew);
        assert_eq!(heap.bytes_allocated(), heap.stats().bytes);

        let (_, grew) = heap
            .update(list, |obj| {
                if let Obj::List(items) = obj {
                    items.clear();
                    items.shrink_to_fit();
                }
            })
            .unwrap();
        assert!(!grew);
        assert_eq!(heap.bytes_allocated(), heap.stats().bytes);
    }

    #[test]
    fn tracing_reaches_list_elements() {
        let mut heap = Heap::new(1024);
        let s = heap.alloc(string("x"));
        let list = heap.alloc(Obj::List(vec![Value::object(s)]));
        let mut gray = Vec::new();
        if heap.mark(list) {
            gray.push(list);
        }
        heap.trace_references(&mut gray);
        assert!(heap.is_marked(s));
    }

    #[test]
    fn stats_group_by_type() {
        let mut heap = Heap::new(1024);
        heap.alloc(string("a"));
        heap.alloc(string("b"));
        heap.alloc(Obj::List(Vec::new()));
        let stats = heap.stats();
        assert_eq!(stats.objects, 3);
        assert_eq!(stats.by_type[&ObjType::String].0, 2);
        assert_eq!(stats.bytes, heap.bytes_allocated());
    }
}
