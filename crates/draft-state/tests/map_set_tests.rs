//! Map and set container drafting end to end.

use draft_state::{
    apply_patches, produce, produce_with_patches, value, DraftRead, Seg, Value,
};

fn map_base() -> Value {
    Value::record([(
        "index".to_string(),
        Value::map([
            (Value::Int(1), value!({"name": "one"})),
            (Value::from("key"), Value::Bool(true)),
        ]),
    )])
}

// ============================================================================
// Maps
// ============================================================================

#[test]
fn test_map_value_keys() {
    let base = map_base();
    let next = produce(&base, |d| {
        let index = d.draft("index")?;
        index.set(Value::Int(2), value!({"name": "two"}))?;
        index.delete(Value::from("key"))?;
        Ok(())
    })
    .unwrap();
    let index = next.get_key(&"index".into()).unwrap();
    assert_eq!(index.container_len(), Some(2));
    assert!(index.has_key(&Seg::MapKey(Value::Int(2))));
    assert!(!index.has_key(&Seg::MapKey(Value::from("key"))));
}

#[test]
fn test_map_nested_value_drafting() {
    let base = map_base();
    let next = produce(&base, |d| {
        d.draft("index")?.draft(Value::Int(1))?.set("name", "uno")?;
        Ok(())
    })
    .unwrap();
    let entry = next
        .get_key(&"index".into())
        .unwrap()
        .get_key(&Seg::MapKey(Value::Int(1)))
        .unwrap();
    assert_eq!(entry.get_key(&"name".into()), Some(Value::from("uno")));
}

#[test]
fn test_map_patch_roundtrip() {
    let base = map_base();
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let index = d.draft("index")?;
        index.set(Value::Int(1), value!({"name": "replaced"}))?;
        index.set(Value::Int(9), "added")?;
        index.delete(Value::from("key"))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(apply_patches(&base, &forward).unwrap(), next);
    assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
}

#[test]
fn test_map_clear_roundtrip() {
    let base = map_base();
    let (next, forward, inverse) = produce_with_patches(&base, |d| d.draft("index")?.clear()).unwrap();
    assert_eq!(
        next.get_key(&"index".into()).unwrap().container_len(),
        Some(0)
    );
    assert_eq!(apply_patches(&base, &forward).unwrap(), next);
    assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
}

#[test]
fn test_untouched_map_entry_shares_reference() {
    let base = map_base();
    let next = produce(&base, |d| {
        d.draft("index")?.set(Value::Int(9), "fresh")?;
        Ok(())
    })
    .unwrap();
    let entry_base = base
        .get_key(&"index".into())
        .unwrap()
        .get_key(&Seg::MapKey(Value::Int(1)))
        .unwrap();
    let entry_next = next
        .get_key(&"index".into())
        .unwrap()
        .get_key(&Seg::MapKey(Value::Int(1)))
        .unwrap();
    assert!(Value::same(&entry_base, &entry_next));
}

// ============================================================================
// Sets
// ============================================================================

#[test]
fn test_set_basic_membership_edits() {
    let base = Value::set([Value::from("a"), Value::from("b")]);
    let next = produce(&base, |d| {
        d.add("c")?;
        d.remove_member(&Value::from("a"))?;
        assert_eq!(d.len()?, 2);
        Ok(())
    })
    .unwrap();
    let set = next.as_set().unwrap();
    assert!(set.contains(&Value::from("b")));
    assert!(set.contains(&Value::from("c")));
    assert!(!set.contains(&Value::from("a")));
}

#[test]
fn test_set_member_mutation_through_draft() {
    let member = value!({"id": 1, "done": false});
    let base = Value::set([member.clone(), Value::Int(5)]);
    let next = produce(&base, |d| {
        for read in d.members()? {
            if let DraftRead::Draft(m) = read {
                m.set("done", true)?;
            }
        }
        Ok(())
    })
    .unwrap();
    let set = next.as_set().unwrap();
    assert!(set.contains(&Value::Int(5)));
    let rebuilt = set
        .iter()
        .find(|m| m.kind().is_some())
        .expect("container member present");
    assert_eq!(rebuilt.get_key(&"done".into()), Some(Value::Bool(true)));
}

#[test]
fn test_set_patch_roundtrip_with_container_members() {
    let member = value!({"id": 1});
    let base = Value::record([("tags".to_string(), Value::set([member, Value::Int(3)]))]);
    let (next, forward, inverse) = produce_with_patches(&base, |d| {
        let tags = d.draft("tags")?;
        tags.remove_member(&Value::Int(3))?;
        tags.add(value!({"id": 2}))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(apply_patches(&base, &forward).unwrap(), next);
    assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
}

#[test]
fn test_set_clear() {
    let base = Value::set([Value::Int(1), Value::Int(2)]);
    let next = produce(&base, |d| d.clear()).unwrap();
    assert_eq!(next.container_len(), Some(0));
}
