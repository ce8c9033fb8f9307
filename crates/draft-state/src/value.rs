//! Persistent value tree and the container capability layer.
//!
//! [`Value`] is the immutable data the engine drafts over: scalars plus four
//! container kinds (record, array, map, set) held behind `Arc` so that
//! unchanged subtrees are shared by pointer between versions. Containers carry
//! a freeze flag the finalizer sets in place; freezing never rebuilds a node,
//! so pointer identity survives it.

use crate::Seg;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Closed classification of container kinds.
///
/// All shared algorithms (drafting, finalize, diff, apply) dispatch on this
/// enum rather than open-ended inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// String-keyed record (plain object).
    Record,
    /// Index-addressed array.
    Array,
    /// Value-keyed associative map.
    Map,
    /// Membership set.
    Set,
}

impl Kind {
    /// Lowercase name for error messages.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Kind::Record => "record",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::Set => "set",
        }
    }
}

/// String-keyed, insertion-ordered record payload.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Record {
    entries: IndexMap<String, Value>,
    #[serde(skip)]
    frozen: AtomicBool,
}

/// Array payload.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Array {
    entries: Vec<Value>,
    #[serde(skip)]
    frozen: AtomicBool,
}

/// Value-keyed, insertion-ordered map payload.
///
/// Entries serialize as a pair list; map keys are arbitrary values, which a
/// JSON map could not represent.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ValueMap {
    #[serde(with = "map_entries")]
    entries: IndexMap<Value, Value>,
    #[serde(skip)]
    frozen: AtomicBool,
}

mod map_entries {
    use super::Value;
    use indexmap::IndexMap;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        entries: &IndexMap<Value, Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for pair in entries.iter() {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<Value, Value>, D::Error> {
        let pairs = Vec::<(Value, Value)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Insertion-ordered set payload.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ValueSet {
    entries: IndexSet<Value>,
    #[serde(skip)]
    frozen: AtomicBool,
}

macro_rules! payload_common {
    ($ty:ident) => {
        impl $ty {
            /// Number of entries.
            #[inline]
            pub fn len(&self) -> usize {
                self.entries.len()
            }

            /// True when empty.
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.entries.is_empty()
            }

            #[inline]
            pub(crate) fn is_frozen(&self) -> bool {
                self.frozen.load(Ordering::Relaxed)
            }

            #[inline]
            pub(crate) fn freeze(&self) {
                self.frozen.store(true, Ordering::Relaxed);
            }
        }

        // Clones are thawed: a shallow copy is a fresh mutable node.
        impl Clone for $ty {
            fn clone(&self) -> Self {
                Self {
                    entries: self.entries.clone(),
                    frozen: AtomicBool::new(false),
                }
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.entries == other.entries
            }
        }

        impl Eq for $ty {}
    };
}

payload_common!(Record);
payload_common!(Array);
payload_common!(ValueMap);
payload_common!(ValueSet);

impl Record {
    pub(crate) fn from_entries(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries,
            frozen: AtomicBool::new(false),
        }
    }

    /// Look up a value by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// True when the key is present.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate entries in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }
}

impl Array {
    pub(crate) fn from_entries(entries: Vec<Value>) -> Self {
        Self {
            entries,
            frozen: AtomicBool::new(false),
        }
    }

    /// Look up a value by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index)
    }

    /// Iterate values in order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.entries.get_mut(index)
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.entries.push(value);
    }

    pub(crate) fn insert(&mut self, index: usize, value: Value) {
        self.entries.insert(index, value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Value {
        self.entries.remove(index)
    }

    /// Resize in place; growth pads with `Null`.
    pub(crate) fn resize(&mut self, new_len: usize) {
        self.entries.resize_with(new_len, || Value::Null);
    }
}

impl ValueMap {
    pub(crate) fn from_entries(entries: IndexMap<Value, Value>) -> Self {
        Self {
            entries,
            frozen: AtomicBool::new(false),
        }
    }

    /// Look up a value by key.
    #[inline]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// True when the key is present.
    #[inline]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate entries in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    pub(crate) fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub(crate) fn insert(&mut self, key: Value, value: Value) {
        self.entries.insert(key, value);
    }

    pub(crate) fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.shift_remove(key)
    }
}

impl ValueSet {
    pub(crate) fn from_entries(entries: IndexSet<Value>) -> Self {
        Self {
            entries,
            frozen: AtomicBool::new(false),
        }
    }

    /// True when the member is present.
    #[inline]
    pub fn contains(&self, member: &Value) -> bool {
        self.entries.contains(member)
    }

    /// Iterate members in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }

    /// Insert a member; false when it was already present.
    pub(crate) fn insert(&mut self, member: Value) -> bool {
        self.entries.insert(member)
    }

    pub(crate) fn remove(&mut self, member: &Value) -> bool {
        self.entries.shift_remove(member)
    }
}

/// A persistent tree value.
///
/// Cloning is cheap (containers are `Arc`-shared). Equality is structural;
/// the engine's identity rule lives in [`Value::same`].
///
/// # Examples
///
/// ```
/// use draft_state::{value, Value};
///
/// let v = value!({"a": 1, "b": [true, null]});
/// assert_eq!(v.get_key(&"a".into()), Some(Value::Int(1)));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// Absent/null value.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    String(String),
    /// Record container.
    Record(Arc<Record>),
    /// Array container.
    Array(Arc<Array>),
    /// Map container.
    Map(Arc<ValueMap>),
    /// Set container.
    Set(Arc<ValueSet>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    // ===== Constructors =====

    /// Build a record value from key/value pairs.
    pub fn record<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(Arc::new(Record::from_entries(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Build an array value.
    pub fn array(entries: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(Arc::new(Array::from_entries(
            entries.into_iter().collect(),
        )))
    }

    /// Build a map value from key/value pairs.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Map(Arc::new(ValueMap::from_entries(
            entries.into_iter().collect(),
        )))
    }

    /// Build a set value; structurally equal members are deduplicated.
    pub fn set(entries: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(Arc::new(ValueSet::from_entries(
            entries.into_iter().collect(),
        )))
    }

    // ===== Capability layer =====

    /// Classify this value's container kind, if it is a container.
    #[inline]
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Record(_) => Some(Kind::Record),
            Value::Array(_) => Some(Kind::Array),
            Value::Map(_) => Some(Kind::Map),
            Value::Set(_) => Some(Kind::Set),
            _ => None,
        }
    }

    /// True iff the value is a container and can back a draft.
    #[inline]
    pub fn is_draftable(&self) -> bool {
        self.kind().is_some()
    }

    /// Lowercase type name for error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }

    /// True when this node has been frozen by a finished session.
    ///
    /// Scalars are inherently immutable and report `true`.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        match self {
            Value::Record(r) => r.is_frozen(),
            Value::Array(a) => a.is_frozen(),
            Value::Map(m) => m.is_frozen(),
            Value::Set(s) => s.is_frozen(),
            _ => true,
        }
    }

    /// Freeze this node only, leaving children untouched.
    pub(crate) fn freeze_shallow(&self) {
        match self {
            Value::Record(r) => r.freeze(),
            Value::Array(a) => a.freeze(),
            Value::Map(m) => m.freeze(),
            Value::Set(s) => s.freeze(),
            _ => {}
        }
    }

    /// Freeze this node and every draftable descendant in place.
    ///
    /// Freezing is monotonic; an already-frozen subtree is skipped.
    pub fn deep_freeze(&self) {
        if self.is_frozen() {
            return;
        }
        self.freeze_shallow();
        for (_, child) in self.entries() {
            child.deep_freeze();
        }
    }

    /// Produce a fresh, thawed container with the same own entries.
    ///
    /// Children are shared (Arc clones); prototype-free structural data only.
    pub fn shallow_clone(&self) -> Value {
        match self {
            Value::Record(r) => Value::Record(Arc::new(Record::clone(r))),
            Value::Array(a) => Value::Array(Arc::new(Array::clone(a))),
            Value::Map(m) => Value::Map(Arc::new(ValueMap::clone(m))),
            Value::Set(s) => Value::Set(Arc::new(ValueSet::clone(s))),
            other => other.clone(),
        }
    }

    /// Polymorphic keyed lookup; `None` for absent keys or kind mismatches.
    ///
    /// Map lookups coerce `Key`/`Index` segments via [`Seg::to_map_key`].
    pub fn get_key(&self, seg: &Seg) -> Option<Value> {
        match (self, seg) {
            (Value::Record(r), Seg::Key(k)) => r.get(k).cloned(),
            (Value::Array(a), Seg::Index(i)) => a.get(*i).cloned(),
            (Value::Map(m), seg) => m.get(&seg.to_map_key()).cloned(),
            _ => None,
        }
    }

    /// Polymorphic keyed membership test.
    pub fn has_key(&self, seg: &Seg) -> bool {
        match (self, seg) {
            (Value::Record(r), Seg::Key(k)) => r.contains_key(k),
            (Value::Array(a), Seg::Index(i)) => *i < a.len(),
            (Value::Map(m), seg) => m.contains_key(&seg.to_map_key()),
            _ => false,
        }
    }

    /// Number of entries, for containers.
    #[inline]
    pub fn container_len(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(r.len()),
            Value::Array(a) => Some(a.len()),
            Value::Map(m) => Some(m.len()),
            Value::Set(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Enumerate entries container-appropriately (insertion order).
    ///
    /// Set members are keyed by their iteration position, matching the
    /// pseudo-index carried in set patches. Scalars enumerate nothing.
    pub fn entries(&self) -> Vec<(Seg, Value)> {
        match self {
            Value::Record(r) => r
                .iter()
                .map(|(k, v)| (Seg::Key(k.clone()), v.clone()))
                .collect(),
            Value::Array(a) => a
                .iter()
                .enumerate()
                .map(|(i, v)| (Seg::Index(i), v.clone()))
                .collect(),
            Value::Map(m) => m
                .iter()
                .map(|(k, v)| (Seg::MapKey(k.clone()), v.clone()))
                .collect(),
            Value::Set(s) => s
                .iter()
                .enumerate()
                .map(|(i, v)| (Seg::Index(i), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The engine's identity rule.
    ///
    /// Scalars compare by value (all NaNs are identical to each other);
    /// containers compare by pointer. This is what the write trap uses for
    /// no-op detection, never structural equality.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => {
                x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Record(x), Value::Record(y)) => Arc::ptr_eq(x, y),
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y),
            (Value::Map(x), Value::Map(y)) => Arc::ptr_eq(x, y),
            (Value::Set(x), Value::Set(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    // ===== Typed accessors =====

    /// Get the record payload, if this is a record.
    #[inline]
    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get the array payload, if this is an array.
    #[inline]
    pub fn as_array(&self) -> Option<&Arc<Array>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get the map payload, if this is a map.
    #[inline]
    pub fn as_map(&self) -> Option<&Arc<ValueMap>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get the set payload, if this is a set.
    #[inline]
    pub fn as_set(&self) -> Option<&Arc<ValueSet>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy conversion into `serde_json::Value`, for debugging and interop.
    ///
    /// Maps become objects (non-string keys are rendered via `Display`),
    /// sets become arrays, non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Value::String(s) => J::String(s.clone()),
            Value::Record(r) => J::Object(
                r.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Array(a) => J::Array(a.iter().map(Value::to_json).collect()),
            Value::Map(m) => J::Object(
                m.iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect(),
            ),
            Value::Set(s) => J::Array(s.iter().map(Value::to_json).collect()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => {
                x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Record(x), Value::Record(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Map(x), Value::Map(y)) => Arc::ptr_eq(x, y) || x == y,
            (Value::Set(x), Value::Set(y)) => Arc::ptr_eq(x, y) || x == y,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Order-insensitive combination, consistent with `IndexMap`/`IndexSet`
/// equality which ignores insertion order.
fn hash_unordered<T: Hash>(items: impl Iterator<Item = T>, state: &mut impl Hasher) {
    let mut acc: u64 = 0;
    for item in items {
        let mut h = DefaultHasher::new();
        item.hash(&mut h);
        acc = acc.wrapping_add(h.finish());
    }
    state.write_u64(acc);
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                let bits = if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Record(r) => hash_unordered(r.iter(), state),
            Value::Array(a) => {
                for v in a.iter() {
                    v.hash(state);
                }
            }
            Value::Map(m) => hash_unordered(m.iter(), state),
            Value::Set(s) => hash_unordered(s.iter(), state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Record(r) => {
                write!(f, "{{")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "map{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "set{{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ===== Scalar conversions =====

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Value::String(s),
            J::Array(items) => Value::array(items.into_iter().map(Value::from)),
            J::Object(entries) => {
                Value::record(entries.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/// Construct a [`Value`] with `serde_json::json!` syntax.
///
/// JSON objects become records and JSON arrays become arrays; use
/// [`Value::map`] and [`Value::set`] for the associative kinds.
///
/// # Examples
///
/// ```
/// use draft_state::value;
///
/// let v = value!({"name": "ada", "tags": [1, 2]});
/// assert!(v.is_draftable());
/// ```
#[macro_export]
macro_rules! value {
    ($($json:tt)+) => {
        $crate::Value::from(::serde_json::json!($($json)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_macro_shapes() {
        let v = value!({"a": 1, "b": [true, null], "c": 1.5});
        assert_eq!(v.kind(), Some(Kind::Record));
        assert_eq!(v.get_key(&"a".into()), Some(Value::Int(1)));
        let b = v.get_key(&"b".into()).unwrap();
        assert_eq!(b.kind(), Some(Kind::Array));
        assert_eq!(b.get_key(&0.into()), Some(Value::Bool(true)));
    }

    #[test]
    fn test_same_is_pointer_identity_for_containers() {
        let a = value!({"x": 1});
        let b = a.clone();
        let c = value!({"x": 1});
        assert!(Value::same(&a, &b));
        assert!(!Value::same(&a, &c));
        assert_eq!(a, c); // structurally equal all the same
    }

    #[test]
    fn test_same_nan() {
        assert!(Value::same(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
        assert!(!Value::same(&Value::Float(0.0), &Value::Float(-0.0)));
    }

    #[test]
    fn test_shallow_clone_shares_children() {
        let base = value!({"child": {"x": 1}});
        let copy = base.shallow_clone();
        assert!(!Value::same(&base, &copy));
        let a = base.get_key(&"child".into()).unwrap();
        let b = copy.get_key(&"child".into()).unwrap();
        assert!(Value::same(&a, &b));
    }

    #[test]
    fn test_freeze_in_place_preserves_identity() {
        let v = value!({"child": {"x": 1}});
        let child_before = v.get_key(&"child".into()).unwrap();
        assert!(!v.is_frozen());
        v.deep_freeze();
        assert!(v.is_frozen());
        let child_after = v.get_key(&"child".into()).unwrap();
        assert!(child_after.is_frozen());
        assert!(Value::same(&child_before, &child_after));
    }

    #[test]
    fn test_thawed_clone_of_frozen() {
        let v = value!([1, 2]);
        v.deep_freeze();
        assert!(!v.shallow_clone().is_frozen());
    }

    #[test]
    fn test_map_and_set_lookup() {
        let m = Value::map([(Value::Int(1), value!("one"))]);
        assert_eq!(m.get_key(&Seg::map_key(Value::Int(1))), Some(value!("one")));
        // Index segments coerce to integer map keys.
        assert_eq!(m.get_key(&1.into()), Some(value!("one")));

        let s = Value::set([Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(s.container_len(), Some(2));
        assert!(s.as_set().unwrap().contains(&Value::Int(2)));
    }

    #[test]
    fn test_value_as_map_key() {
        let key = value!({"compound": true});
        let m = Value::map([(key.clone(), Value::Int(9))]);
        assert_eq!(m.get_key(&Seg::MapKey(value!({"compound": true}))), Some(Value::Int(9)));
        assert_eq!(m.get_key(&Seg::MapKey(key)), Some(Value::Int(9)));
    }

    #[test]
    fn test_entries_order() {
        let v = value!({"b": 1, "a": 2});
        let keys: Vec<_> = v.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Seg::key("b"), Seg::key("a")]);
    }

    #[test]
    fn test_json_round_trip() {
        let v = value!({"a": [1, 2], "b": "x"});
        assert_eq!(Value::from(v.to_json()), v);
    }
}
