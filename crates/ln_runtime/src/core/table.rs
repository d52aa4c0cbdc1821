//! Open-addressing hash table with Robin-Hood displacement.
//!
//! Capacity is always a power of two. Inserts swap with any occupant that
//! sits closer to its ideal slot than the entry being placed, which keeps
//! probe sequence lengths (PSL) short; lookups stop as soon as they meet an
//! occupant with a smaller PSL than the one probed so far. Deletion shifts
//! the following run backward, so there are no tombstones.
//!
//! Callers supply the hash with every operation. Entries remember it, so the
//! table never needs to look inside the heap to rehash.

use super::heap::{Heap, ObjectId};
use super::object::Obj;
use super::value::{Value, values_equal};

const MIN_CAPACITY: usize = 8;

/// Key types a [`RobinHoodTable`] can hold.
pub trait TableKey: Copy {
    /// Whether the table halves its capacity once it drops below a quarter
    /// full after a delete.
    const SHRINKS: bool;

    fn same(self, other: Self) -> bool;
}

/// Interned strings compare by identity.
impl TableKey for ObjectId {
    const SHRINKS: bool = false;

    #[inline]
    fn same(self, other: Self) -> bool {
        self == other
    }
}

/// Map keys compare by language equality.
impl TableKey for Value {
    const SHRINKS: bool = true;

    #[inline]
    fn same(self, other: Self) -> bool {
        values_equal(self, other)
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry<K> {
    key: K,
    hash: u32,
    psl: u32,
    value: Value,
}

#[derive(Clone, Debug)]
pub struct RobinHoodTable<K: TableKey> {
    count: usize,
    buckets: Vec<Option<Entry<K>>>,
}

/// String-keyed table: globals, module namespaces, fields, methods, interning.
pub type Table = RobinHoodTable<ObjectId>;

/// Value-keyed table backing user maps.
pub type ValueTable = RobinHoodTable<Value>;

#[inline]
fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY { MIN_CAPACITY } else { capacity * 2 }
}

#[inline]
fn shrink_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY * 2 { MIN_CAPACITY } else { capacity / 2 }
}

impl<K: TableKey> Default for RobinHoodTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TableKey> RobinHoodTable<K> {
    pub fn new() -> Self {
        Self {
            count: 0,
            buckets: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    /// Probes for an entry with `hash` whose key satisfies `matches`.
    fn probe(&self, hash: u32, mut matches: impl FnMut(K) -> bool) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let mask = self.mask();
        let mut index = hash as usize & mask;
        let mut psl = 0u32;
        loop {
            let entry = self.buckets[index].as_ref()?;
            if entry.psl < psl {
                return None;
            }
            if entry.hash == hash && matches(entry.key) {
                return Some(index);
            }
            psl += 1;
            index = (index + 1) & mask;
        }
    }

    #[inline]
    fn find_slot(&self, key: K, hash: u32) -> Option<usize> {
        self.probe(hash, |k| k.same(key))
    }

    pub fn get(&self, key: K, hash: u32) -> Option<Value> {
        let index = self.find_slot(key, hash)?;
        self.buckets[index].as_ref().map(|e| e.value)
    }

    pub fn contains(&self, key: K, hash: u32) -> bool {
        self.find_slot(key, hash).is_some()
    }

    /// Inserts or overwrites. Returns `true` when the key was not present.
    pub fn set(&mut self, key: K, hash: u32, value: Value) -> bool {
        if let Some(index) = self.find_slot(key, hash) {
            if let Some(entry) = self.buckets[index].as_mut() {
                entry.value = value;
            }
            return false;
        }
        if (self.count + 1) * 4 > self.capacity() * 3 {
            self.resize(grow_capacity(self.capacity()));
        }
        self.place(Entry {
            key,
            hash,
            psl: 0,
            value,
        });
        self.count += 1;
        true
    }

    fn place(&mut self, mut entry: Entry<K>) {
        let mask = self.mask();
        let mut index = entry.hash as usize & mask;
        loop {
            let slot = &mut self.buckets[index];
            match slot {
                None => {
                    *slot = Some(entry);
                    return;
                }
                Some(occupant) => {
                    if occupant.psl < entry.psl {
                        std::mem::swap(occupant, &mut entry);
                    }
                }
            }
            entry.psl += 1;
            index = (index + 1) & mask;
        }
    }

    pub fn delete(&mut self, key: K, hash: u32) -> bool {
        let Some(mut index) = self.find_slot(key, hash) else {
            return false;
        };
        self.buckets[index] = None;
        self.count -= 1;

        let mask = self.mask();
        loop {
            let next = (index + 1) & mask;
            match self.buckets[next].take() {
                Some(mut shifted) if shifted.psl > 0 => {
                    shifted.psl -= 1;
                    self.buckets[index] = Some(shifted);
                    index = next;
                }
                other => {
                    self.buckets[next] = other;
                    break;
                }
            }
        }

        if K::SHRINKS && self.capacity() > MIN_CAPACITY && self.count * 4 < self.capacity() {
            self.resize(shrink_capacity(self.capacity()));
        }
        true
    }

    fn resize(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![None; capacity]);
        for mut entry in old.into_iter().flatten() {
            entry.psl = 0;
            self.place(entry);
        }
    }

    /// Copies every entry of `from` into `self`, overwriting shared keys.
    pub fn add_all(&mut self, from: &Self) {
        for entry in from.buckets.iter().flatten() {
            self.set(entry.key, entry.hash, entry.value);
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, Value)> + '_ {
        self.buckets.iter().flatten().map(|e| (e.key, e.value))
    }

    /// Key equal to some probe target, found through `matches` instead of
    /// key identity.
    pub fn find_key(&self, hash: u32, matches: impl FnMut(K) -> bool) -> Option<K> {
        let index = self.probe(hash, matches)?;
        self.buckets[index].as_ref().map(|e| e.key)
    }

    /// Drops every entry for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(K, Value) -> bool) -> usize {
        let doomed: Vec<(K, u32)> = self
            .buckets
            .iter()
            .flatten()
            .filter(|e| !keep(e.key, e.value))
            .map(|e| (e.key, e.hash))
            .collect();
        for &(key, hash) in &doomed {
            self.delete(key, hash);
        }
        doomed.len()
    }

    /// Longest probe sequence currently in the table.
    pub fn max_psl(&self) -> u32 {
        self.buckets.iter().flatten().map(|e| e.psl).max().unwrap_or(0)
    }
}

impl Table {
    /// Looks up an interned string by content. This is the only lookup that
    /// compares characters; every other string-keyed access is by identity.
    pub fn find_string(&self, heap: &Heap, chars: &str, hash: u32) -> Option<ObjectId> {
        self.find_key(hash, |id| {
            matches!(heap.try_get(id), Some(Obj::String(s)) if &*s.chars == chars)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ObjectId {
        ObjectId::new(n, 0)
    }

    #[test]
    fn set_get_overwrite() {
        let mut t = Table::new();
        assert!(t.set(id(1), 11, Value::from_f64(1.0)));
        assert!(!t.set(id(1), 11, Value::from_f64(2.0)));
        assert_eq!(t.get(id(1), 11), Some(Value::from_f64(2.0)));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(id(2), 11), None);
    }

    #[test]
    fn grows_before_exceeding_three_quarters() {
        let mut t = Table::new();
        for n in 0..100 {
            t.set(id(n), n.wrapping_mul(2_654_435_761), Value::NIL);
            assert!(t.len() * 4 <= t.capacity() * 3);
            assert!(t.capacity().is_power_of_two());
        }
    }

    #[test]
    fn delete_shifts_colliding_run_back() {
        let mut t = Table::new();
        for n in 0..6 {
            t.set(id(n), 3, Value::from_f64(n as f64));
        }
        assert!(t.delete(id(0), 3));
        assert!(!t.delete(id(0), 3));
        for n in 1..6 {
            assert_eq!(t.get(id(n), 3), Some(Value::from_f64(n as f64)));
        }
        assert_eq!(t.max_psl(), 4);
    }

    #[test]
    fn value_table_shrinks() {
        let mut t = ValueTable::new();
        let keys: Vec<Value> = (0..64).map(|n| Value::from_f64(n as f64)).collect();
        for k in &keys {
            t.set(*k, k.mixed_hash(), Value::TRUE);
        }
        let grown = t.capacity();
        for k in &keys[..60] {
            t.delete(*k, k.mixed_hash());
        }
        assert!(t.capacity() < grown);
        for k in &keys[60..] {
            assert_eq!(t.get(*k, k.mixed_hash()), Some(Value::TRUE));
        }
    }

    #[test]
    fn retain_removes_rejected() {
        let mut t = Table::new();
        for n in 0..20 {
            t.set(id(n), n, Value::from_bool(n % 2 == 0));
        }
        let removed = t.retain(|_, v| v.as_bool());
        assert_eq!(removed, 10);
        assert_eq!(t.len(), 10);
        assert!(t.iter().all(|(_, v)| v.as_bool()));
    }

    #[test]
    fn add_all_copies_entries() {
        let mut a = Table::new();
        let mut b = Table::new();
        a.set(id(1), 1, Value::TRUE);
        a.set(id(2), 2, Value::TRUE);
        b.set(id(2), 2, Value::FALSE);
        b.add_all(&a);
        assert_eq!(b.len(), 2);
        assert_eq!(b.get(id(2), 2), Some(Value::TRUE));
    }
}
