//! Structural-sharing drafts with reversible patches.
//!
//! `draft-state` lets a recipe mutate a *draft* of an immutable [`Value`]
//! in place; finalizing the draft yields the next immutable value, sharing
//! every untouched subtree with the base by pointer. Sessions can also record
//! the change as a pair of reversible [`Patch`]es, replayable on any
//! compatible base with [`apply_patches`].
//!
//! # Core Concepts
//!
//! - **Value**: Persistent tree of scalars plus four container kinds
//!   (record, array, map, set), `Arc`-shared between versions
//! - **Draft**: Copy-on-write mutable facade over a value; children are
//!   drafted lazily on read
//! - **produce**: Run a recipe against a draft and collapse it into the next
//!   value
//! - **Patch**: Ordered add/remove/replace operations with paths; every
//!   production can emit a forward patch and its inverse
//! - **apply_patches**: Pure replay of a patch against a base
//!
//! # Quick Start
//!
//! ```
//! use draft_state::{apply_patches, produce_with_patches, value, Value};
//!
//! let base = value!({"todos": [{"title": "draft it", "done": false}]});
//!
//! let (next, forward, inverse) = produce_with_patches(&base, |d| {
//!     let todos = d.draft("todos")?;
//!     todos.draft(0usize)?.set("done", true)?;
//!     todos.push(value!({"title": "ship it", "done": false}))?;
//!     Ok(())
//! }).unwrap();
//!
//! // The base never changed; the next value shares what the recipe ignored.
//! assert_eq!(base.get_key(&"todos".into()).unwrap().container_len(), Some(1));
//! assert_eq!(next.get_key(&"todos".into()).unwrap().container_len(), Some(2));
//!
//! // Patches replay forward and backward.
//! assert_eq!(apply_patches(&base, &forward).unwrap(), next);
//! assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
//! ```
//!
//! # Manual Sessions
//!
//! [`create_draft`] opens a draft that survives until [`finish_draft`],
//! which suits workflows where the mutation spans multiple call sites.
//! [`current`] snapshots an in-progress draft without ending the session.

mod adapters;
mod apply;
mod diff;
mod draft;
mod error;
mod finalize;
mod patch;
mod path;
mod produce;
mod scope;
mod value;

pub use apply::apply_patches;
pub use draft::{Draft, DraftRead};
pub use error::{DraftError, DraftResult};
pub use patch::{Patch, PatchOp};
pub use path::{Path, Seg};
pub use produce::{
    create_draft, current, finish_draft, finish_draft_with_patches, produce,
    produce_with_patches, Producer, RecipeReturn,
};
pub use value::{Array, Kind, Record, Value, ValueMap, ValueSet};
