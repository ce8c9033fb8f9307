//! Map and set draft adapters.
//!
//! Maps key by arbitrary values and sets key by membership, so their traps
//! differ from the record/array ones: map deletes track base presence the
//! same way record deletes do, and set drafts eagerly wrap every draftable
//! member on first copy so that membership against the original values keeps
//! working while drafts occupy the slots.

use crate::draft::{mark_modified, prepare_copy, slot, CopyStore, Draft, DraftRead, Node, Slot};
use crate::{DraftError, DraftResult, Kind, Seg, Value};
use std::rc::Rc;

impl Draft {
    /// Map write trap: no-op when the key already holds an identical value.
    pub(crate) fn map_set(&self, seg: Seg, value: Value) -> DraftResult<()> {
        {
            let state = self.state().borrow();
            state.check_mutable()?;
            if let Slot::Plain(existing) = slot(&state, &seg) {
                if Value::same(&existing, &value) {
                    return Ok(());
                }
            }
        }
        prepare_copy(self.state())?;
        mark_modified(self.state());
        let mut state = self.state().borrow_mut();
        let store = state.copy.as_mut().expect("copy prepared above");
        store.insert(seg.clone(), Node::Value(value));
        state.assigned.insert(seg, true);
        Ok(())
    }

    /// Map delete trap.
    pub(crate) fn map_delete(&self, seg: Seg) -> DraftResult<bool> {
        {
            let state = self.state().borrow();
            state.check_mutable()?;
            if matches!(slot(&state, &seg), Slot::Missing) {
                return Ok(false);
            }
        }
        prepare_copy(self.state())?;
        mark_modified(self.state());
        let mut state = self.state().borrow_mut();
        if state.base.has_key(&seg) {
            state.assigned.insert(seg.clone(), false);
        } else {
            state.assigned.shift_remove(&seg);
        }
        let store = state.copy.as_mut().expect("copy prepared above");
        store.remove(&seg);
        Ok(true)
    }

    /// Remove every entry from a map or set draft.
    ///
    /// For maps, every base key is recorded as explicitly removed so the diff
    /// emits one removal per original entry.
    pub fn clear(&self) -> DraftResult<()> {
        let kind = self.expect_clear_kind()?;
        {
            let state = self.state().borrow();
            state.check_mutable()?;
            if kind == Kind::Map && state.latest_len() == 0 {
                return Ok(());
            }
        }
        prepare_copy(self.state())?;
        mark_modified(self.state());
        let mut guard = self.state().borrow_mut();
        let state = &mut *guard;
        match state.copy.as_mut().expect("copy prepared above") {
            CopyStore::Map(entries) => {
                entries.clear();
                let base_keys: Vec<Value> = state
                    .base
                    .as_map()
                    .map(|m| m.iter().map(|(k, _)| k.clone()).collect())
                    .unwrap_or_default();
                state.assigned.clear();
                for key in base_keys {
                    state.assigned.insert(Seg::MapKey(key), false);
                }
            }
            CopyStore::Set { members, .. } => members.clear(),
            _ => unreachable!("clear is gated to map and set"),
        }
        Ok(())
    }

    fn expect_clear_kind(&self) -> DraftResult<Kind> {
        let kind = self.kind()?;
        match kind {
            Kind::Map | Kind::Set => Ok(kind),
            other => Err(DraftError::kind_mismatch("clear", "map or set", other.name())),
        }
    }

    // ===== Set operations =====

    /// Membership test against the latest state of a set draft.
    ///
    /// Members that were wrapped in child drafts still answer to their
    /// original value via the draft registry.
    pub fn contains(&self, value: &Value) -> DraftResult<bool> {
        let kind = self.kind()?;
        if kind != Kind::Set {
            return Err(DraftError::kind_mismatch("contains", "set", kind.name()));
        }
        let state = self.state().borrow();
        state.check_alive()?;
        match &state.copy {
            None => Ok(state.base.as_set().map_or(false, |s| s.contains(value))),
            Some(CopyStore::Set { members, drafts }) => {
                for member in members {
                    match member {
                        Node::Value(v) if v == value => return Ok(true),
                        Node::Child(rc) => {
                            if let Some(registered) = drafts.get(value) {
                                if Rc::ptr_eq(rc, registered) {
                                    return Ok(true);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(false)
            }
            Some(_) => unreachable!("set draft has set copy"),
        }
    }

    /// Add a member to a set draft; no-op when already present.
    pub fn add(&self, value: impl Into<Value>) -> DraftResult<()> {
        let value = value.into();
        self.state().borrow().check_mutable()?;
        if self.contains(&value)? {
            return Ok(());
        }
        prepare_copy(self.state())?;
        mark_modified(self.state());
        let mut state = self.state().borrow_mut();
        let CopyStore::Set { members, .. } = state.copy.as_mut().expect("copy prepared above")
        else {
            unreachable!("set draft has set copy");
        };
        members.push(Node::Value(value));
        Ok(())
    }

    /// Remove a member from a set draft; returns whether it was present.
    ///
    /// Passing the original value of a drafted member removes that draft.
    pub fn remove_member(&self, value: &Value) -> DraftResult<bool> {
        self.state().borrow().check_mutable()?;
        if !self.contains(value)? {
            return Ok(false);
        }
        prepare_copy(self.state())?;
        mark_modified(self.state());
        let mut state = self.state().borrow_mut();
        let CopyStore::Set { members, drafts } = state.copy.as_mut().expect("copy prepared above")
        else {
            unreachable!("set draft has set copy");
        };
        let position = members.iter().position(|member| match member {
            Node::Value(v) => v == value,
            Node::Child(rc) => drafts
                .get(value)
                .map_or(false, |registered| Rc::ptr_eq(rc, registered)),
        });
        match position {
            Some(i) => {
                members.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Enumerate set members in insertion order, forcing copy-on-write so
    /// draftable members come back as child drafts.
    pub fn members(&self) -> DraftResult<Vec<DraftRead>> {
        let kind = self.kind()?;
        if kind != Kind::Set {
            return Err(DraftError::kind_mismatch("members", "set", kind.name()));
        }
        let finalized = {
            let state = self.state().borrow();
            state.check_alive()?;
            state.finalized
        };
        if !finalized {
            prepare_copy(self.state())?;
        }
        let state = self.state().borrow();
        match &state.copy {
            Some(CopyStore::Set { members, .. }) => Ok(members
                .iter()
                .map(|member| match member {
                    Node::Value(v) => DraftRead::Value(v.clone()),
                    Node::Child(rc) => DraftRead::Draft(Draft::from_rc(Rc::clone(rc))),
                })
                .collect()),
            _ => Ok(state
                .base
                .as_set()
                .map(|s| s.iter().map(|v| DraftRead::Value(v.clone())).collect())
                .unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{produce, value};

    #[test]
    fn test_map_set_and_delete() {
        let base = Value::map([
            (Value::Int(1), Value::from("one")),
            (Value::from("k"), Value::Bool(true)),
        ]);
        let result = produce(&base, |d| {
            d.set(Value::Int(1), "uno")?;
            assert!(d.delete(Value::from("k"))?);
            assert!(!d.delete(Value::from("missing"))?);
            d.set(Value::Int(2), "two")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            result.get_key(&Seg::MapKey(Value::Int(1))),
            Some(Value::from("uno"))
        );
        assert!(!result.has_key(&Seg::MapKey(Value::from("k"))));
        assert_eq!(
            result.get_key(&Seg::MapKey(Value::Int(2))),
            Some(Value::from("two"))
        );
    }

    #[test]
    fn test_map_noop_write_preserves_base() {
        let base = Value::map([(Value::from("k"), Value::Int(1))]);
        let result = produce(&base, |d| d.set(Value::from("k"), 1)).unwrap();
        assert!(Value::same(&result, &base));
    }

    #[test]
    fn test_map_clear_records_removals() {
        let base = Value::map([
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2)),
        ]);
        let result = produce(&base, |d| d.clear()).unwrap();
        assert_eq!(result.container_len(), Some(0));
    }

    #[test]
    fn test_set_add_remove_contains() {
        let base = Value::set([Value::Int(1), Value::Int(2)]);
        let result = produce(&base, |d| {
            assert!(d.contains(&Value::Int(1))?);
            d.add(3)?;
            d.add(3)?; // duplicate is a no-op
            assert!(d.remove_member(&Value::Int(2))?);
            assert!(!d.remove_member(&Value::Int(2))?);
            Ok(())
        })
        .unwrap();
        assert_eq!(result.container_len(), Some(2));
        let set = result.as_set().unwrap();
        assert!(set.contains(&Value::Int(1)));
        assert!(set.contains(&Value::Int(3)));
        assert!(!set.contains(&Value::Int(2)));
    }

    #[test]
    fn test_set_member_drafting_keeps_membership() {
        let inner = value!({"x": 1});
        let base = Value::set([inner.clone()]);
        let result = produce(&base, |d| {
            // Iterating forces members into drafts; mutate through one.
            assert!(d.contains(&inner)?);
            for member in d.members()? {
                if let DraftRead::Draft(m) = member {
                    m.set("x", 2)?;
                }
            }
            assert!(d.contains(&inner)?);
            Ok(())
        })
        .unwrap();
        let members = result.as_set().unwrap();
        assert_eq!(members.len(), 1);
        let rebuilt = members.iter().next().unwrap();
        assert_eq!(rebuilt.get_key(&"x".into()), Some(Value::Int(2)));
    }

    #[test]
    fn test_untouched_set_members_share_structure() {
        let a = value!({"id": 1});
        let b = value!({"id": 2});
        let base = Value::set([a.clone(), b.clone(), Value::Int(9)]);
        let result = produce(&base, |d| {
            d.add(10)?;
            Ok(())
        })
        .unwrap();
        let set = result.as_set().unwrap();
        let shared_a = set.iter().find(|m| Value::same(m, &a));
        let shared_b = set.iter().find(|m| Value::same(m, &b));
        assert!(shared_a.is_some());
        assert!(shared_b.is_some());
        assert_eq!(set.len(), 4);
    }
}
