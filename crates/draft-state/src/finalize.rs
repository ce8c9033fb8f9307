//! Finalization: collapsing a draft tree back into an immutable value.
//!
//! Unmodified drafts resolve to their base by reference, which is where
//! structural sharing comes from. Modified drafts rebuild one container from
//! their copy, resolving child drafts depth-first, and diff themselves
//! against their base when patch recording is on. Results are memoized per
//! draft so shared handles agree.

use crate::diff::{generate_patches, generate_replacement_patches};
use crate::draft::{snapshot_state, CopyStore, DraftRc, Node};
use crate::produce::RecipeReturn;
use crate::scope::Scope;
use crate::{DraftError, DraftResult, Path, Seg, Value};
use std::rc::Rc;

/// Resolve the recipe's return value against the root draft and produce the
/// final immutable value.
///
/// Returning a replacement (or nothing) while the draft was also modified is
/// ambiguous and rejected. Freezing happens only at the outermost scope, and
/// only when the producer has auto-freeze on.
pub(crate) fn process_result(
    scope: &Rc<Scope>,
    root: &DraftRc,
    returned: RecipeReturn,
) -> DraftResult<Value> {
    let replaced = !matches!(returned, RecipeReturn::Keep);
    let result = if replaced {
        if root.borrow().modified {
            return Err(DraftError::ReplacedAndModified);
        }
        let replacement = match returned {
            RecipeReturn::Replace(value) => value,
            _ => Value::Null,
        };
        if scope.patches_enabled() {
            let base = root.borrow().base.clone();
            scope.with_patches(|forward, inverse| {
                generate_replacement_patches(&base, &replacement, forward, inverse);
            });
        }
        replacement
    } else {
        finalize_draft(scope, root, Some(&Path::root()))?
    };
    if scope.is_outermost() && scope.auto_freeze() {
        result.deep_freeze();
    }
    Ok(result)
}

/// Finalize one draft, depth-first.
///
/// `path` is the location of this draft in the final document; `None` means
/// the subtree's patches are already covered by an ancestor's whole-value
/// operation and nothing should be emitted for it.
pub(crate) fn finalize_draft(
    scope: &Rc<Scope>,
    rc: &DraftRc,
    path: Option<&Path>,
) -> DraftResult<Value> {
    let (kind, store, base) = {
        let state = rc.borrow();
        if let Some(result) = &state.result {
            return Ok(result.clone());
        }
        // A draft belonging to some other session is treated as plain data.
        let owner = state.scope.upgrade();
        if !owner.map_or(false, |s| Rc::ptr_eq(&s, scope)) {
            return Ok(snapshot_state(rc));
        }
        if !state.modified {
            return Ok(state.base.clone());
        }
        let kind = state.kind.expect("modified draft is a container");
        let store = state.copy.clone().expect("modified draft has a copy");
        (kind, store, state.base.clone())
    };
    rc.borrow_mut().finalized = true;

    let assigned = rc.borrow().assigned.clone();
    let result = match store {
        CopyStore::Record(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, node) in entries {
                let seg = Seg::Key(key.clone());
                let value = finalize_node(scope, node, path, &seg, &assigned, false)?;
                out.push((key, value));
            }
            Value::record(out)
        }
        CopyStore::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, node) in items.into_iter().enumerate() {
                let seg = Seg::Index(i);
                out.push(finalize_node(scope, node, path, &seg, &assigned, false)?);
            }
            Value::array(out)
        }
        CopyStore::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, node) in entries {
                let seg = Seg::MapKey(key.clone());
                let value = finalize_node(scope, node, path, &seg, &assigned, false)?;
                out.push((key, value));
            }
            Value::map(out)
        }
        CopyStore::Set { members, .. } => {
            let mut out = Vec::with_capacity(members.len());
            for node in members {
                out.push(finalize_node(scope, node, path, &Seg::Index(0), &assigned, true)?);
            }
            Value::set(out)
        }
    };

    if let Some(base_path) = path {
        if scope.patches_enabled() {
            scope.with_patches(|forward, inverse| {
                generate_patches(kind, &base, &result, &assigned, base_path, forward, inverse);
            });
        }
    }
    rc.borrow_mut().result = Some(result.clone());
    Ok(result)
}

/// Resolve one copy entry to its final value.
///
/// A child draft's patches nest under the parent only when the slot was never
/// explicitly assigned; an assigned slot is already covered by the parent's
/// own replace/add for that key. Set members never extend the path because
/// set patches operate on whole members.
fn finalize_node(
    scope: &Rc<Scope>,
    node: Node,
    parent_path: Option<&Path>,
    seg: &Seg,
    assigned: &indexmap::IndexMap<Seg, bool>,
    in_set: bool,
) -> DraftResult<Value> {
    match node {
        Node::Value(value) => Ok(value),
        Node::Child(child) => {
            let child_path = match parent_path {
                Some(p) if !in_set && !assigned.contains_key(seg) => {
                    Some(p.with_segment(seg.clone()))
                }
                _ => None,
            };
            finalize_draft(scope, &child, child_path.as_ref())
        }
    }
}
