//! Patch recording and replay round-trips.

use draft_state::{
    apply_patches, path, produce_with_patches, value, DraftError, PatchOp, RecipeReturn, Value,
};

fn roundtrip(base: &Value, next: &Value, forward: &draft_state::Patch, inverse: &draft_state::Patch) {
    assert_eq!(&apply_patches(base, forward).unwrap(), next);
    assert_eq!(&apply_patches(next, inverse).unwrap(), base);
}

// ============================================================================
// Record edits
// ============================================================================

#[test]
fn test_single_field_replace() {
    let base = value!({"a": 1, "b": {"c": 2}});
    let (next, forward, inverse) = produce_with_patches(&base, |d| d.set("a", 2)).unwrap();

    assert_eq!(next, value!({"a": 2, "b": {"c": 2}}));
    let b_next = next.get_key(&"b".into()).unwrap();
    assert!(Value::same(&base.get_key(&"b".into()).unwrap(), &b_next));

    assert_eq!(forward.ops(), &[PatchOp::replace(path!("a"), Value::Int(2))]);
    assert_eq!(inverse.ops(), &[PatchOp::replace(path!("a"), Value::Int(1))]);
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_add_and_remove_fields() {
    let base = value!({"keep": 1, "drop": 2});
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        d.set("fresh", true)?;
        d.delete("drop")?;
        Ok(())
    })
    .unwrap();
    assert_eq!(next, value!({"keep": 1, "fresh": true}));
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_nested_child_patch_path() {
    let base = value!({"outer": {"inner": {"n": 1}}});
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        d.draft("outer")?.draft("inner")?.set("n", 2)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(
        forward.ops(),
        &[PatchOp::replace(path!("outer", "inner", "n"), Value::Int(2))]
    );
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_assigned_child_collapses_to_parent_op() {
    // A slot that was explicitly set is covered by the parent's own patch;
    // edits made through a draft of that slot do not emit separately.
    let base = value!({"slot": {"n": 1}});
    let (next, forward, _inverse) = produce_with_patches(&base, |d| {
        d.set("slot", value!({"n": 5}))?;
        d.draft("slot")?.set("n", 6)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(forward.len(), 1);
    assert_eq!(
        next.get_key(&"slot".into()).unwrap().get_key(&"n".into()),
        Some(Value::Int(6))
    );
}

#[test]
fn test_reverted_slot_emits_nothing_when_sibling_changes() {
    // Drafting a child and writing its original value back nets out to no
    // change for that slot, even when a later edit makes the session dirty.
    let base = value!({"child": {"x": 1}, "n": 1});
    let original_child = base.get_key(&"child".into()).unwrap();
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let _ = d.draft("child")?;
        d.set("child", original_child.clone())?;
        d.set("n", 2)?;
        Ok(())
    })
    .unwrap();

    assert_eq!(next, value!({"child": {"x": 1}, "n": 2}));
    assert_eq!(forward.ops(), &[PatchOp::replace(path!("n"), Value::Int(2))]);
    assert_eq!(inverse.ops(), &[PatchOp::replace(path!("n"), Value::Int(1))]);
    roundtrip(&base, &next, &forward, &inverse);
}

// ============================================================================
// Array edits
// ============================================================================

#[test]
fn test_array_push() {
    let base = value!({"list": [1, 2, 3]});
    let (next, forward, inverse) = produce_with_patches(&base, |d| d.draft("list")?.push(4)).unwrap();

    assert_eq!(next, value!({"list": [1, 2, 3, 4]}));
    assert!(forward
        .ops()
        .contains(&PatchOp::add(path!("list", 3), Value::Int(4))));
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_array_truncation_inverse_restores_elements() {
    let base = value!({"list": [1, 2, 3]});
    let (next, forward, inverse) =
        produce_with_patches(&base, |d| d.draft("list")?.set_len(1)).unwrap();

    assert_eq!(next, value!({"list": [1]}));
    assert_eq!(
        forward.ops(),
        &[PatchOp::replace(path!("list", "length"), Value::Int(1))]
    );
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_array_element_replace() {
    let base = value!({"list": [10, 20, 30]});
    let (next, forward, inverse) =
        produce_with_patches(&base, |d| d.draft("list")?.set(1usize, 21)).unwrap();
    assert_eq!(next, value!({"list": [10, 21, 30]}));
    assert_eq!(
        forward.ops(),
        &[PatchOp::replace(path!("list", 1), Value::Int(21))]
    );
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_array_insert_and_remove_roundtrip() {
    let base = value!({"list": ["a", "b", "c"]});
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let list = d.draft("list")?;
        list.remove(0)?;
        list.insert(1, "x")?;
        Ok(())
    })
    .unwrap();
    assert_eq!(next, value!({"list": ["b", "x", "c"]}));
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_array_pop_roundtrip() {
    let base = value!({"list": [1, 2]});
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let popped = d.draft("list")?.pop()?;
        assert_eq!(popped, Some(Value::Int(2)));
        Ok(())
    })
    .unwrap();
    assert_eq!(next, value!({"list": [1]}));
    roundtrip(&base, &next, &forward, &inverse);
}

// ============================================================================
// Set edits
// ============================================================================

#[test]
fn test_set_remove_and_add_roundtrip() {
    let base = Value::record([(
        "tags".to_string(),
        Value::set([Value::from("a"), Value::from("b")]),
    )]);
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let tags = d.draft("tags")?;
        tags.remove_member(&Value::from("a"))?;
        tags.add("c")?;
        Ok(())
    })
    .unwrap();

    let tags = next.get_key(&"tags".into()).unwrap();
    let tags = tags.as_set().unwrap();
    assert!(tags.contains(&Value::from("b")));
    assert!(tags.contains(&Value::from("c")));
    assert!(!tags.contains(&Value::from("a")));

    let removes = forward
        .ops()
        .iter()
        .filter(|op| matches!(op, PatchOp::Remove { .. }))
        .count();
    let adds = forward
        .ops()
        .iter()
        .filter(|op| matches!(op, PatchOp::Add { .. }))
        .count();
    assert_eq!((removes, adds), (1, 1));
    roundtrip(&base, &next, &forward, &inverse);
}

// ============================================================================
// Replacement results
// ============================================================================

#[test]
fn test_replacement_emits_whole_value_patch() {
    let base = value!({"x": 1});
    let (next, forward, inverse) =
        produce_with_patches(&base, |_| Ok(value!({"replaced": true}))).unwrap();

    assert_eq!(next, value!({"replaced": true}));
    assert_eq!(
        forward.ops(),
        &[PatchOp::replace(path!(), value!({"replaced": true}))]
    );
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_modify_then_replace_is_rejected() {
    let base = value!({"x": 1});
    let err = produce_with_patches(&base, |d| {
        d.set("x", 2)?;
        Ok(value!({"replaced": true}))
    })
    .unwrap_err();
    assert!(matches!(err, DraftError::ReplacedAndModified));
}

#[test]
fn test_nothing_result_roundtrip() {
    let base = value!({"x": 1});
    let (next, forward, inverse) =
        produce_with_patches(&base, |_| Ok(RecipeReturn::Nothing)).unwrap();
    assert_eq!(next, Value::Null);
    roundtrip(&base, &next, &forward, &inverse);
}

#[test]
fn test_scalar_base_patch_pair() {
    let (next, forward, inverse) =
        produce_with_patches(&Value::Int(1), |_| Ok(Value::Int(2))).unwrap();
    assert_eq!(next, Value::Int(2));
    roundtrip(&Value::Int(1), &next, &forward, &inverse);
}

// ============================================================================
// Mixed sessions
// ============================================================================

#[test]
fn test_many_edits_roundtrip() {
    let base = value!({
        "users": [{"name": "ada", "active": true}, {"name": "bob", "active": false}],
        "meta": {"version": 1, "flags": {"beta": false}},
        "count": 2
    });
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        d.set("count", 3)?;
        d.draft("users")?.push(value!({"name": "eve", "active": true}))?;
        d.draft("users")?.draft(1usize)?.set("active", true)?;
        let meta = d.draft("meta")?;
        meta.set("version", 2)?;
        meta.draft("flags")?.set("beta", true)?;
        meta.delete("flags")?;
        Ok(())
    })
    .unwrap();
    roundtrip(&base, &next, &forward, &inverse);
}
