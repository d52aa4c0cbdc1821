//! Runtime value representation.
//!
//! Every value is one NaN-boxed `u64`. Doubles are stored verbatim; the
//! singletons live in the payload of a quiet NaN, and any pattern with the
//! sign bit and quiet-NaN bits set is a heap reference whose payload is an
//! [`ObjectId`] (arena index plus slot generation).

use std::fmt;

use super::heap::ObjectId;

// ============================================================================
// NaN-boxing constants
// ============================================================================

pub const SIGN_BIT: u64 = 1 << 63;
pub const QNAN: u64 = 0x7ffc_0000_0000_0000;
pub const PAYLOAD_MASK: u64 = !(SIGN_BIT | QNAN);

pub const TAG_NIL: u64 = 1;
pub const TAG_FALSE: u64 = 2;
pub const TAG_TRUE: u64 = 3;
pub const TAG_EMPTY: u64 = 4;

/// The one NaN a number value may carry; other NaN payloads could alias
/// the tag space.
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Value(u64);

/// Decoded view of a [`Value`], for code that wants to `match`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ValueKind {
    Nil,
    Bool(bool),
    Empty,
    Number(f64),
    Object(ObjectId),
}

impl Default for Value {
    fn default() -> Self {
        Self::NIL
    }
}

impl Value {
    pub const NIL: Value = Value(QNAN | TAG_NIL);
    pub const FALSE: Value = Value(QNAN | TAG_FALSE);
    pub const TRUE: Value = Value(QNAN | TAG_TRUE);
    /// "No value produced": a failed native call or an absent map key.
    pub const EMPTY: Value = Value(QNAN | TAG_EMPTY);

    #[inline(always)]
    pub fn from_f64(f: f64) -> Self {
        if f.is_nan() {
            return Self(CANONICAL_NAN);
        }
        Self(f.to_bits())
    }

    #[inline(always)]
    pub fn from_bool(b: bool) -> Self {
        if b { Self::TRUE } else { Self::FALSE }
    }

    #[inline(always)]
    pub fn object(id: ObjectId) -> Self {
        Self(SIGN_BIT | QNAN | (id.to_payload() & PAYLOAD_MASK))
    }

    #[inline(always)]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reinterprets raw bits. Only patterns produced by [`Value::to_bits`]
    /// are meaningful.
    #[inline(always)]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline(always)]
    pub fn is_number(self) -> bool {
        (self.0 & QNAN) != QNAN
    }

    #[inline(always)]
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline(always)]
    pub fn is_bool(self) -> bool {
        (self.0 | 1) == Self::TRUE.0
    }

    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    #[inline(always)]
    pub fn is_obj(self) -> bool {
        (self.0 & (QNAN | SIGN_BIT)) == (QNAN | SIGN_BIT)
    }

    #[inline(always)]
    pub fn as_number(self) -> f64 {
        f64::from_bits(self.0)
    }

    #[inline(always)]
    pub fn as_bool(self) -> bool {
        self == Self::TRUE
    }

    #[inline(always)]
    pub fn as_obj(self) -> ObjectId {
        ObjectId::from_payload(self.0 & PAYLOAD_MASK)
    }

    pub fn as_number_opt(self) -> Option<f64> {
        self.is_number().then(|| self.as_number())
    }

    pub fn as_obj_opt(self) -> Option<ObjectId> {
        self.is_obj().then(|| self.as_obj())
    }

    pub fn kind(self) -> ValueKind {
        if self.is_number() {
            ValueKind::Number(self.as_number())
        } else if self.is_obj() {
            ValueKind::Object(self.as_obj())
        } else if self.is_bool() {
            ValueKind::Bool(self.as_bool())
        } else if self.is_empty() {
            ValueKind::Empty
        } else {
            ValueKind::Nil
        }
    }

    /// Hash for value-keyed maps. Strings are hashed by content elsewhere;
    /// this mixes the raw pattern, with `-0.0` folded onto `0.0` so that
    /// keys equal under [`values_equal`] hash alike.
    pub fn mixed_hash(self) -> u32 {
        let bits = if self.is_number() && self.as_number() == 0.0 {
            0
        } else {
            self.0
        };
        hash_bits(bits)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::from_f64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::object(id)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Empty => write!(f, "<empty>"),
            ValueKind::Number(n) => write!(f, "{n}"),
            ValueKind::Object(id) => write!(f, "<obj {}#{}>", id.index(), id.generation()),
        }
    }
}

/// Language-level equality: numbers compare numerically, everything else
/// by identity. Strings are interned, so identity is content equality.
#[inline]
pub fn values_equal(a: Value, b: Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.as_number() == b.as_number();
    }
    a.0 == b.0
}

#[inline]
fn hash_bits(mut hash: u64) -> u32 {
    hash = (!hash).wrapping_add(hash << 18);
    hash ^= hash >> 31;
    hash = hash.wrapping_mul(21);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 6);
    hash ^= hash >> 22;
    (hash & 0x3fff_ffff) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_distinct() {
        let all = [Value::NIL, Value::TRUE, Value::FALSE, Value::EMPTY];
        for (i, a) in all.iter().enumerate() {
            assert!(!a.is_number());
            assert!(!a.is_obj());
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn bools_decode() {
        assert!(Value::TRUE.is_bool() && Value::FALSE.is_bool());
        assert!(!Value::NIL.is_bool() && !Value::EMPTY.is_bool());
        assert!(Value::from_bool(true).as_bool());
        assert!(!Value::from_bool(false).as_bool());
    }

    #[test]
    fn object_round_trip() {
        let id = ObjectId::new(123_456, 77);
        let v = Value::object(id);
        assert!(v.is_obj());
        assert!(!v.is_number());
        assert_eq!(v.as_obj(), id);
        assert_eq!(v.kind(), ValueKind::Object(id));
    }

    #[test]
    fn nan_is_canonicalised() {
        let weird = f64::from_bits(0x7ffc_0000_0000_0001);
        let v = Value::from_f64(weird);
        assert!(v.is_number());
        assert!(v.as_number().is_nan());
    }

    #[test]
    fn zero_signs_are_equal_and_hash_alike() {
        let a = Value::from_f64(0.0);
        let b = Value::from_f64(-0.0);
        assert!(values_equal(a, b));
        assert_eq!(a.mixed_hash(), b.mixed_hash());
    }
}
