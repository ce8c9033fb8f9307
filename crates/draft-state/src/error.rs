//! Error types for draft-state operations.
//!
//! Every variant is a programming-contract violation, not a recoverable
//! runtime condition. The enclosing scope is always torn down before one of
//! these propagates, so a failed session never leaves usable drafts behind.

use crate::Path;
use thiserror::Error;

/// Result type alias for draft-state operations.
pub type DraftResult<T> = Result<T, DraftError>;

/// Errors that can occur during draft-state operations.
#[derive(Debug, Error)]
pub enum DraftError {
    /// A draft was used after its owning scope was torn down.
    #[error("draft used after its scope was revoked")]
    Revoked,

    /// A draft was mutated (or finished) after finalization.
    #[error("draft already finalized")]
    AlreadyFinalized,

    /// The recipe both mutated the draft and returned a replacement value.
    #[error("recipe returned a new value and modified the draft; do one or the other")]
    ReplacedAndModified,

    /// `finish_draft` was called on a draft not created by `create_draft`.
    #[error("finish_draft requires a draft created by create_draft")]
    NotManual,

    /// The value cannot back a draft.
    #[error("value of type {found} is not draftable")]
    NotDraftable {
        /// Type name of the offending value.
        found: &'static str,
    },

    /// A container operation was used on the wrong container kind.
    #[error("operation {operation} requires {expected}, found {found}")]
    KindMismatch {
        /// The operation that was attempted.
        operation: &'static str,
        /// The container kind the operation requires.
        expected: &'static str,
        /// The kind actually present.
        found: &'static str,
    },

    /// Array index is out of bounds.
    #[error("index {index} out of bounds (len: {len})")]
    IndexOutOfBounds {
        /// The index that was accessed.
        index: usize,
        /// The actual length of the array.
        len: usize,
    },

    /// A key segment is invalid for the container it addresses.
    #[error("invalid key {key} for {kind} container")]
    InvalidKey {
        /// Display form of the offending segment.
        key: String,
        /// The container kind being addressed.
        kind: &'static str,
    },

    /// A patch path walked through a missing or non-container value.
    #[error("patch path not found: {path}")]
    PathNotFound {
        /// The path that could not be resolved.
        path: Path,
    },

    /// A patch path segment used a reserved key.
    ///
    /// Mirrors the prototype-pollution replay guard of the reference design;
    /// always fatal, never silently skipped.
    #[error("reserved key {key:?} in patch path")]
    ReservedKey {
        /// The rejected key.
        key: String,
    },

    /// A `replace` patch targeted a set; sets have no positional replace.
    #[error("replace is not supported on set containers (at {path})")]
    SetReplace {
        /// The path of the offending patch.
        path: Path,
    },

    /// Catch-all for malformed operations.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of what went wrong.
        message: String,
    },
}

impl DraftError {
    /// Create a kind mismatch error.
    #[inline]
    pub fn kind_mismatch(
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        DraftError::KindMismatch {
            operation,
            expected,
            found,
        }
    }

    /// Create a not-draftable error.
    #[inline]
    pub fn not_draftable(found: &'static str) -> Self {
        DraftError::NotDraftable { found }
    }

    /// Create an index out of bounds error.
    #[inline]
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        DraftError::IndexOutOfBounds { index, len }
    }

    /// Create an invalid key error.
    #[inline]
    pub fn invalid_key(key: impl Into<String>, kind: &'static str) -> Self {
        DraftError::InvalidKey {
            key: key.into(),
            kind,
        }
    }

    /// Create a path not found error.
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        DraftError::PathNotFound { path }
    }

    /// Create a reserved key error.
    #[inline]
    pub fn reserved_key(key: impl Into<String>) -> Self {
        DraftError::ReservedKey { key: key.into() }
    }

    /// Create a set-replace error.
    #[inline]
    pub fn set_replace(path: Path) -> Self {
        DraftError::SetReplace { path }
    }

    /// Create an invalid operation error.
    #[inline]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        DraftError::InvalidOperation {
            message: message.into(),
        }
    }
}
