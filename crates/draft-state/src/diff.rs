//! Patch generation.
//!
//! Runs as part of finalization, after a draft's children have already been
//! resolved to plain values, so every diff compares the original base against
//! the finalized result. Emission order follows assignment order, which keeps
//! patch streams deterministic.

use crate::{Kind, Patch, PatchOp, Path, Seg, Value};
use indexmap::IndexMap;

/// Diff one finalized draft against its base and append the resulting
/// forward and inverse operations.
pub(crate) fn generate_patches(
    kind: Kind,
    base: &Value,
    result: &Value,
    assigned: &IndexMap<Seg, bool>,
    base_path: &Path,
    forward: &mut Patch,
    inverse: &mut Patch,
) {
    match kind {
        Kind::Record | Kind::Map => {
            generate_keyed_patches(base, result, assigned, base_path, forward, inverse)
        }
        Kind::Array => generate_array_patches(base, result, assigned, base_path, forward, inverse),
        Kind::Set => generate_set_patches(base, result, base_path, forward, inverse),
    }
}

/// Records and maps diff by the assignment log: each key that was set or
/// deleted becomes one add, remove, or replace. A replace whose value ended
/// up identical to the original is elided.
fn generate_keyed_patches(
    base: &Value,
    result: &Value,
    assigned: &IndexMap<Seg, bool>,
    base_path: &Path,
    forward: &mut Patch,
    inverse: &mut Patch,
) {
    for (seg, &was_set) in assigned {
        let original = base.get_key(seg);
        let path = base_path.with_segment(seg.clone());
        if !was_set {
            forward.push(PatchOp::remove(path.clone()));
            if let Some(original) = original {
                inverse.push(PatchOp::add(path, original));
            }
            continue;
        }
        let value = result.get_key(seg).unwrap_or(Value::Null);
        match original {
            Some(original) => {
                if Value::same(&original, &value) {
                    continue;
                }
                forward.push(PatchOp::replace(path.clone(), value));
                inverse.push(PatchOp::replace(path, original));
            }
            None => {
                forward.push(PatchOp::add(path.clone(), value));
                inverse.push(PatchOp::remove(path));
            }
        }
    }
}

/// Arrays diff positionally. When the array shrank, the comparison runs
/// against the shorter side with the forward and inverse roles swapped; the
/// grown region becomes adds, undone by a single truncating length replace.
fn generate_array_patches(
    base: &Value,
    result: &Value,
    assigned: &IndexMap<Seg, bool>,
    base_path: &Path,
    forward: &mut Patch,
    inverse: &mut Patch,
) {
    let empty = Vec::new();
    let base_items: Vec<Value> = base
        .as_array()
        .map(|a| a.iter().cloned().collect())
        .unwrap_or(empty.clone());
    let result_items: Vec<Value> = result
        .as_array()
        .map(|a| a.iter().cloned().collect())
        .unwrap_or(empty);

    let shrank = result_items.len() < base_items.len();
    let (from, to) = if shrank {
        (&result_items, &base_items)
    } else {
        (&base_items, &result_items)
    };
    let mut fwd_ops = Vec::new();
    let mut inv_ops = Vec::new();

    for i in 0..from.len() {
        let touched = assigned.get(&Seg::Index(i)).copied().unwrap_or(false);
        if touched && !Value::same(&from[i], &to[i]) {
            let path = base_path.with_segment(Seg::Index(i));
            fwd_ops.push(PatchOp::replace(path.clone(), to[i].clone()));
            inv_ops.push(PatchOp::replace(path, from[i].clone()));
        }
    }
    for (i, value) in to.iter().enumerate().skip(from.len()) {
        let path = base_path.with_segment(Seg::Index(i));
        fwd_ops.push(PatchOp::add(path, value.clone()));
    }
    if from.len() < to.len() {
        inv_ops.push(PatchOp::replace(
            base_path.with_segment(Seg::key("length")),
            Value::Int(from.len() as i64),
        ));
    }

    if shrank {
        inverse.extend(Patch::with_ops(fwd_ops));
        forward.extend(Patch::with_ops(inv_ops));
    } else {
        forward.extend(Patch::with_ops(fwd_ops));
        inverse.extend(Patch::with_ops(inv_ops));
    }
}

/// Sets diff by membership. Paths carry the member's position as a pseudo
/// index; the appliers match set members by value, not position. Inverse
/// operations are prepended so that removals undo before re-additions when
/// the inverse patch replays front to back.
fn generate_set_patches(
    base: &Value,
    result: &Value,
    base_path: &Path,
    forward: &mut Patch,
    inverse: &mut Patch,
) {
    let Some(base_set) = base.as_set() else {
        return;
    };
    let Some(result_set) = result.as_set() else {
        return;
    };
    for (i, member) in base_set.iter().enumerate() {
        if !result_set.contains(member) {
            let path = base_path.with_segment(Seg::Index(i));
            forward.push(PatchOp::remove_member(path.clone(), member.clone()));
            inverse.push_front(PatchOp::add(path, member.clone()));
        }
    }
    for (i, member) in result_set.iter().enumerate() {
        if !base_set.contains(member) {
            let path = base_path.with_segment(Seg::Index(i));
            forward.push(PatchOp::add(path.clone(), member.clone()));
            inverse.push_front(PatchOp::remove_member(path, member.clone()));
        }
    }
}

/// The whole-document pair emitted when a recipe replaces the root outright.
pub(crate) fn generate_replacement_patches(
    base: &Value,
    replacement: &Value,
    forward: &mut Patch,
    inverse: &mut Patch,
) {
    forward.push(PatchOp::replace(Path::root(), replacement.clone()));
    inverse.push(PatchOp::replace(Path::root(), base.clone()));
}
