//! Paths into drafted value trees.
//!
//! A path is a sequence of segments describing a location relative to the
//! session root. Segments address record keys, array indices, or map keys.
//! Patches carry paths so they can be replayed against compatible values.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment in a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Record key access: `{"key": value}`.
    Key(String),
    /// Array index access: `[index]`.
    Index(usize),
    /// Map key access; map keys are arbitrary values.
    MapKey(Value),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Create a map-key segment.
    #[inline]
    pub fn map_key(k: impl Into<Value>) -> Self {
        Seg::MapKey(k.into())
    }

    /// Get the key if this is a key segment.
    #[inline]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Seg::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Interpret this segment as a map key value.
    ///
    /// `Key` and `Index` segments coerce (to string and integer keys) so that
    /// patches recorded against one container shape replay against another.
    #[inline]
    pub fn to_map_key(&self) -> Value {
        match self {
            Seg::Key(k) => Value::String(k.clone()),
            Seg::Index(i) => Value::Int(*i as i64),
            Seg::MapKey(v) => v.clone(),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
            Seg::MapKey(v) => write!(f, "{{{}}}", v),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

impl From<Value> for Seg {
    fn from(v: Value) -> Self {
        Seg::MapKey(v)
    }
}

/// A complete path from the session root to a location.
///
/// # Examples
///
/// ```
/// use draft_state::Path;
///
/// let path = Path::root().key("users").index(0).key("name");
/// assert_eq!(path.len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Append a map-key segment and return self (builder pattern).
    #[inline]
    pub fn map_key(mut self, k: impl Into<Value>) -> Self {
        self.0.push(Seg::MapKey(k.into()));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty (root).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Append a segment and return a new path (non-mutating builder).
    #[inline]
    pub fn with_segment(&self, seg: Seg) -> Path {
        let mut result = self.clone();
        result.0.push(seg);
        result
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// Check if this path is a prefix of another path.
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Seg;
    type IntoIter = std::vec::IntoIter<Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Construct a [`Path`] from a sequence of segments.
///
/// String literals become key segments, numbers become index segments.
///
/// # Examples
///
/// ```
/// use draft_state::path;
///
/// let p = path!("users", 0, "name");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let path = Path::root().key("users").index(0).key("name");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], Seg::Key("users".into()));
        assert_eq!(path[1], Seg::Index(0));
        assert_eq!(path[2], Seg::Key("name".into()));
    }

    #[test]
    fn test_path_macro() {
        let path = path!("a", 1, "b");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path!(), Path::root());
    }

    #[test]
    fn test_path_display() {
        let path = path!("users", 0, "name");
        assert_eq!(path.to_string(), "$.users[0].name");
        assert_eq!(Path::root().to_string(), "$");
    }

    #[test]
    fn test_path_prefix() {
        let parent = path!("user");
        let child = path!("user", "name");
        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
        assert!(parent.is_prefix_of(&parent));
    }

    #[test]
    fn test_map_key_coercion() {
        assert_eq!(Seg::key("a").to_map_key(), Value::String("a".into()));
        assert_eq!(Seg::index(3).to_map_key(), Value::Int(3));
    }

    #[test]
    fn test_path_serde() {
        let path = path!("list", 2);
        let json = serde_json::to_string(&path).unwrap();
        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(path, parsed);
    }
}
