//! The structured value produced by the decoders and consumed by the encoders.

use std::fmt;
use std::ops::Index;

use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;

/// A decoded XML or XML-RPC value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Missing value: an empty element, `<ex:nil/>` or `<value/>`
    Null,
    /// `<boolean>`
    Boolean(bool),
    /// `<int>`, `<i4>` and the `ex:i*` extensions
    Integer(i64),
    /// `<double>`, `<ex:float>`
    Float(f64),
    /// Text, always held as UTF-8
    String(String),
    /// `<base64>`
    Binary(Vec<u8>),
    /// `<dateTime.iso8601>`, `<ex:dateTime>`
    DateTime(DateTime<FixedOffset>),
    /// Ordered string-keyed container
    Mapping(Mapping),
    /// Ordered list of values
    Sequence(Vec<Value>),
}

static NULL: Value = Value::Null;

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human readable name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::DateTime(_) => "date",
            Value::Mapping(_) => "mapping",
            Value::Sequence(_) => "sequence",
        }
    }

    /// The text of a [`Value::String`].
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number of a [`Value::Integer`].
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// The number of a [`Value::Float`].
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    /// The flag of a [`Value::Boolean`].
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// The bytes of a [`Value::Binary`].
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// The date of a [`Value::DateTime`].
    #[inline]
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(d) => Some(d),
            _ => None,
        }
    }

    /// The entries of a [`Value::Mapping`].
    #[inline]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// The entries of a [`Value::Mapping`], for modification.
    #[inline]
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// The items of a [`Value::Sequence`].
    #[inline]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Structural equality that ignores the key order of every nested mapping.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Mapping(a), Value::Mapping(b)) => a.same_entries(b),
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (a, b) => a == b,
        }
    }

    /// Turns the value into a sequence, wrapping a non-sequence value as the
    /// single element, and returns the sequence.
    pub(crate) fn make_sequence(&mut self) -> &mut Vec<Value> {
        if !matches!(self, Value::Sequence(_)) {
            let first = std::mem::replace(self, Value::Null);
            *self = Value::Sequence(vec![first]);
        }
        match self {
            Value::Sequence(seq) => seq,
            _ => unreachable!("value was just converted to a sequence"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Looks up a mapping key. Returns [`Value::Null`] for a missing key or a
    /// value that is not a mapping.
    fn index(&self, key: &str) -> &Value {
        match self {
            Value::Mapping(m) => m.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        match self {
            Value::Sequence(s) => s.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Self {
                    Value::Integer(v as i64)
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl From<Mapping> for Value {
    #[inline]
    fn from(v: Mapping) -> Self {
        Value::Mapping(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    #[inline]
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    #[inline]
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A string-keyed map that remembers insertion order.
///
/// Inserting an existing key replaces its value in place, so the key keeps its
/// original position.
#[derive(Clone, Default)]
pub struct Mapping {
    entries: IndexMap<String, Value>,
}

impl Mapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mapping has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the mapping has an entry for `key`.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The value stored under `key`, for modification in place.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Inserts a value, returning the previous value of the key, if any.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Removes a key, shifting all later entries one position to the front.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// The key of the last entry.
    #[inline]
    pub fn last_key(&self) -> Option<&str> {
        self.entries.last().map(|(k, _)| k.as_str())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Compares the entries of both mappings ignoring the key order, recursively.
    pub fn same_entries(&self, other: &Mapping) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |o| v.equivalent(o)))
    }
}

/// Two mappings are equal when they hold equal entries in the same order,
/// see [`Mapping::same_entries`] for an order independent comparison.
impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = Mapping::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(feature = "serde-types")]
mod serde_impl {
    use super::{Mapping, Value};
    use serde::ser::{Serialize, SerializeMap, Serializer};

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Boolean(b) => serializer.serialize_bool(*b),
                Value::Integer(i) => serializer.serialize_i64(*i),
                Value::Float(f) => serializer.serialize_f64(*f),
                Value::String(s) => serializer.serialize_str(s),
                Value::Binary(b) => serializer.serialize_bytes(b),
                Value::DateTime(d) => serializer.serialize_str(&d.to_rfc3339()),
                Value::Mapping(m) => m.serialize(serializer),
                Value::Sequence(s) => s.serialize(serializer),
            }
        }
    }

    impl Serialize for Mapping {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.len()))?;
            for (k, v) in self.iter() {
                map.serialize_entry(k, v)?;
            }
            map.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_keeps_position() {
        let mut m = Mapping::new();
        m.insert("a", 1.into());
        m.insert("b", 2.into());
        assert_eq!(m.insert("a", 3.into()), Some(Value::Integer(1)));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(m.last_key(), Some("b"));
        assert_eq!(m.get("a"), Some(&Value::Integer(3)));
    }

    #[test]
    fn remove_keeps_order() {
        let mut m: Mapping = vec![("a", Value::Null), ("b", 1.into()), ("c", 2.into())]
            .into_iter()
            .collect();
        assert_eq!(m.remove("a"), Some(Value::Null));
        assert_eq!(m.get("c"), Some(&Value::Integer(2)));
        m.insert("a", true.into());
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let ab: Mapping = vec![("a", Value::from(1)), ("b", Value::from(true))]
            .into_iter()
            .collect();
        let ba: Mapping = vec![("b", Value::from(true)), ("a", Value::from(1))]
            .into_iter()
            .collect();
        assert!(ab != ba);
        assert!(ab.same_entries(&ba));
        assert!(Value::from(vec![Value::from(ab)]).equivalent(&Value::from(vec![Value::from(ba)])));
    }

    #[test]
    fn make_sequence_wraps_scalar() {
        let mut v = Value::from("x");
        v.make_sequence().push("y".into());
        assert_eq!(v, Value::Sequence(vec!["x".into(), "y".into()]));
    }

    #[test]
    fn index_missing_is_null() {
        let v = Value::Mapping(vec![("a", Value::from(1))].into_iter().collect());
        assert_eq!(v["a"], Value::Integer(1));
        assert!(v["b"].is_null());
        assert!(v["a"]["c"].is_null());
        assert!(v[0].is_null());
    }
}
