//! Patch application.
//!
//! Replays a recorded patch against an arbitrary base, producing a new value
//! without touching the input. Containers along each op's path are rewritten
//! copy-on-write; untouched subtrees stay shared with the base.

use crate::{DraftError, DraftResult, Patch, PatchOp, Path, Seg, Value};
use std::sync::Arc;

/// Prototype-pollution style keys are rejected outright, matching the
/// reference engine's hardening even though this value model has no
/// prototype chain to pollute.
const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Apply a patch to `base` and return the resulting value.
///
/// A whole-document replace (empty path) fast-forwards application: only the
/// last such op and everything after it are replayed.
///
/// # Examples
///
/// ```
/// use draft_state::{apply_patches, produce_with_patches, value, Value};
///
/// let base = value!({"n": 1});
/// let (next, forward, inverse) = produce_with_patches(&base, |d| d.set("n", 2)).unwrap();
/// assert_eq!(apply_patches(&base, &forward).unwrap(), next);
/// assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
/// ```
pub fn apply_patches(base: &Value, patch: &Patch) -> DraftResult<Value> {
    let ops = patch.ops();
    let start = ops
        .iter()
        .rposition(|op| matches!(op, PatchOp::Replace { path, .. } if path.is_empty()));
    let (mut doc, rest) = match start {
        Some(i) => match &ops[i] {
            PatchOp::Replace { value, .. } => (value.clone(), &ops[i + 1..]),
            _ => unreachable!("rposition matched a replace"),
        },
        None => (base.clone(), ops),
    };
    for op in rest {
        apply_op(&mut doc, op)?;
    }
    Ok(doc)
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> DraftResult<()> {
    let path = op.path();
    for seg in path.iter() {
        if let Seg::Key(k) = seg {
            if RESERVED_KEYS.contains(&k.as_str()) {
                return Err(DraftError::reserved_key(k.clone()));
            }
        }
    }
    let segments = path.segments();
    let Some((leaf, parents)) = segments.split_last() else {
        // Root replaces were consumed by the fast-forward scan.
        return Err(DraftError::invalid_operation(format!(
            "cannot apply {} at the document root",
            op_name(op)
        )));
    };
    let mut target = doc;
    for seg in parents {
        target = child_mut(target, seg, path)?;
    }
    apply_leaf(target, leaf, op)
}

fn op_name(op: &PatchOp) -> &'static str {
    match op {
        PatchOp::Add { .. } => "add",
        PatchOp::Remove { .. } => "remove",
        PatchOp::Replace { .. } => "replace",
    }
}

/// Descend one level, copy-on-write.
fn child_mut<'a>(parent: &'a mut Value, seg: &Seg, full: &Path) -> DraftResult<&'a mut Value> {
    match parent {
        Value::Record(rec) => match seg {
            Seg::Key(k) => Arc::make_mut(rec)
                .get_mut(k)
                .ok_or_else(|| DraftError::path_not_found(full.clone())),
            _ => Err(DraftError::path_not_found(full.clone())),
        },
        Value::Array(arr) => match seg {
            Seg::Index(i) => Arc::make_mut(arr)
                .get_mut(*i)
                .ok_or_else(|| DraftError::path_not_found(full.clone())),
            _ => Err(DraftError::path_not_found(full.clone())),
        },
        Value::Map(map) => {
            let key = seg.to_map_key();
            Arc::make_mut(map)
                .get_mut(&key)
                .ok_or_else(|| DraftError::path_not_found(full.clone()))
        }
        // Set patches address whole members; there is no stable index to
        // descend through.
        Value::Set(_) => Err(DraftError::invalid_operation(format!(
            "cannot traverse into set members at {full}"
        ))),
        _ => Err(DraftError::path_not_found(full.clone())),
    }
}

fn apply_leaf(target: &mut Value, seg: &Seg, op: &PatchOp) -> DraftResult<()> {
    let path = op.path();
    match target {
        Value::Record(rec) => {
            let Seg::Key(key) = seg else {
                return Err(DraftError::path_not_found(path.clone()));
            };
            let rec = Arc::make_mut(rec);
            match op {
                PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                    rec.insert(key.clone(), value.clone());
                }
                PatchOp::Remove { .. } => {
                    rec.remove(key);
                }
            }
            Ok(())
        }
        Value::Array(arr) => {
            let arr = Arc::make_mut(arr);
            match (op, seg) {
                // "-" appends, mirroring the JSON-patch convention.
                (PatchOp::Add { value, .. }, Seg::Key(k)) if k == "-" => {
                    arr.push(value.clone());
                    Ok(())
                }
                (PatchOp::Add { value, .. }, Seg::Index(i)) => {
                    if *i > arr.len() {
                        return Err(DraftError::index_out_of_bounds(*i, arr.len()));
                    }
                    arr.insert(*i, value.clone());
                    Ok(())
                }
                (PatchOp::Replace { value, .. }, Seg::Key(k)) if k == "length" => {
                    let new_len = match value {
                        Value::Int(n) if *n >= 0 => *n as usize,
                        _ => {
                            return Err(DraftError::invalid_operation(format!(
                                "length replace at {path} requires a non-negative integer"
                            )))
                        }
                    };
                    arr.resize(new_len);
                    Ok(())
                }
                (PatchOp::Replace { value, .. }, Seg::Index(i)) => {
                    match arr.get_mut(*i) {
                        Some(slot) => {
                            *slot = value.clone();
                            Ok(())
                        }
                        None => Err(DraftError::index_out_of_bounds(*i, arr.len())),
                    }
                }
                (PatchOp::Remove { .. }, Seg::Index(i)) => {
                    if *i >= arr.len() {
                        return Err(DraftError::index_out_of_bounds(*i, arr.len()));
                    }
                    arr.remove(*i);
                    Ok(())
                }
                _ => Err(DraftError::path_not_found(path.clone())),
            }
        }
        Value::Map(map) => {
            let key = seg.to_map_key();
            let map = Arc::make_mut(map);
            match op {
                PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                    map.insert(key, value.clone());
                }
                PatchOp::Remove { .. } => {
                    map.remove(&key);
                }
            }
            Ok(())
        }
        Value::Set(set) => {
            let set = Arc::make_mut(set);
            match op {
                PatchOp::Add { value, .. } => {
                    set.insert(value.clone());
                    Ok(())
                }
                // Set removals carry the member; the pseudo index in the
                // path is informational only.
                PatchOp::Remove { value: Some(member), .. } => {
                    set.remove(member);
                    Ok(())
                }
                PatchOp::Remove { value: None, .. } => Err(DraftError::invalid_operation(
                    format!("remove at {path} targets a set but carries no member value"),
                )),
                PatchOp::Replace { .. } => Err(DraftError::set_replace(path.clone())),
            }
        }
        _ => Err(DraftError::path_not_found(path.clone())),
    }
}
