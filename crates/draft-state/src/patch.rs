//! Patch operations and the patch container.
//!
//! A patch is an ordered edit log produced by a drafting session. Every
//! forward patch has a corresponding inverse computed alongside it; applying
//! the forward list and then the inverse list round-trips the value.

use crate::{Path, Value};
use serde::{Deserialize, Serialize};

/// A single recorded edit operation.
///
/// `Remove` carries the removed value only for set members, which have no
/// positional addressing and must be deleted by value on replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Insert a value at a location that did not exist on the base.
    Add {
        /// Target location.
        path: Path,
        /// Value to insert.
        value: Value,
    },
    /// Remove the value at a location.
    Remove {
        /// Target location.
        path: Path,
        /// Removed member, carried for set replay only.
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    /// Replace the value at a location.
    Replace {
        /// Target location.
        path: Path,
        /// Replacement value.
        value: Value,
    },
}

impl PatchOp {
    /// Create an add operation.
    #[inline]
    pub fn add(path: Path, value: impl Into<Value>) -> Self {
        PatchOp::Add {
            path,
            value: value.into(),
        }
    }

    /// Create a remove operation.
    #[inline]
    pub fn remove(path: Path) -> Self {
        PatchOp::Remove { path, value: None }
    }

    /// Create a remove operation carrying the removed set member.
    #[inline]
    pub fn remove_member(path: Path, value: impl Into<Value>) -> Self {
        PatchOp::Remove {
            path,
            value: Some(value.into()),
        }
    }

    /// Create a replace operation.
    #[inline]
    pub fn replace(path: Path, value: impl Into<Value>) -> Self {
        PatchOp::Replace {
            path,
            value: value.into(),
        }
    }

    /// The location this operation targets.
    #[inline]
    pub fn path(&self) -> &Path {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path, .. }
            | PatchOp::Replace { path, .. } => path,
        }
    }

    /// The payload value, when the operation carries one.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        match self {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => Some(value),
            PatchOp::Remove { value, .. } => value.as_ref(),
        }
    }
}

/// An ordered list of operations recorded by one session.
///
/// # Examples
///
/// ```
/// use draft_state::{path, Patch, PatchOp, Value};
///
/// let patch = Patch::new()
///     .with_op(PatchOp::replace(path!("count"), Value::Int(2)))
///     .with_op(PatchOp::remove(path!("stale")));
/// assert_eq!(patch.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// The operations in this patch, in application order.
    ops: Vec<PatchOp>,
}

impl Patch {
    /// Create an empty patch.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a patch with the given operations.
    #[inline]
    pub fn with_ops(ops: Vec<PatchOp>) -> Self {
        Self { ops }
    }

    /// Add an operation to this patch (builder pattern).
    #[inline]
    pub fn with_op(mut self, op: PatchOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Push an operation onto this patch.
    #[inline]
    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    /// Prepend an operation to this patch.
    ///
    /// Set diffs prepend inverse operations so that replay undoes removals and
    /// additions in reverse discovery order.
    #[inline]
    pub fn push_front(&mut self, op: PatchOp) {
        self.ops.insert(0, op);
    }

    /// Get the operations in this patch.
    #[inline]
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    /// Consume this patch and return the operations.
    #[inline]
    pub fn into_ops(self) -> Vec<PatchOp> {
        self.ops
    }

    /// Check if this patch is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Get the number of operations in this patch.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Extend this patch with operations from another patch.
    #[inline]
    pub fn extend(&mut self, other: Patch) {
        self.ops.extend(other.ops);
    }

    /// Iterate over the operations.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PatchOp> {
        self.ops.iter()
    }
}

impl FromIterator<PatchOp> for Patch {
    fn from_iter<I: IntoIterator<Item = PatchOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, value};

    #[test]
    fn test_patch_builder() {
        let patch = Patch::new()
            .with_op(PatchOp::add(path!("a"), value!(1)))
            .with_op(PatchOp::replace(path!("b"), value!(2)));
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.ops()[0].path(), &path!("a"));
    }

    #[test]
    fn test_push_front_order() {
        let mut patch = Patch::new().with_op(PatchOp::remove(path!("x")));
        patch.push_front(PatchOp::add(path!("y"), value!(true)));
        assert!(matches!(patch.ops()[0], PatchOp::Add { .. }));
    }

    #[test]
    fn test_patch_serde_shape() {
        let patch = Patch::new().with_op(PatchOp::replace(path!("a"), value!(2)));
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["ops"][0]["op"], "replace");
        // Remove without a carried value omits the value field entirely.
        let rm = serde_json::to_value(PatchOp::remove(path!("a"))).unwrap();
        assert!(rm.get("value").is_none());
        let parsed: Patch = serde_json::from_value(json).unwrap();
        assert_eq!(patch, parsed);
    }
}
