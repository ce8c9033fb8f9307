//! The draft state machine.
//!
//! A draft is the mutable facade a recipe manipulates in place of the real,
//! immutable value. Reads lazily wrap nested containers in child drafts;
//! writes lazily allocate a shallow copy of the base and propagate the
//! modified flag up the parent chain. Rust has no transparent property
//! interception, so drafts expose explicit accessor methods instead of
//! property syntax; mutation goes through `&self` with interior mutability.

use crate::scope::Scope;
use crate::{DraftError, DraftResult, Kind, Seg, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) type DraftRc = Rc<RefCell<DraftState>>;

/// One entry of a draft's backing copy: either a plain value or a live
/// child draft occupying that slot.
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Value(Value),
    Child(DraftRc),
}

impl Node {
    /// Detached snapshot of this entry's current value.
    pub(crate) fn snapshot(&self) -> Value {
        match self {
            Node::Value(v) => v.clone(),
            Node::Child(rc) => snapshot_state(rc),
        }
    }
}

/// Lazily-allocated mutable backing storage, one shape per container kind.
///
/// Set copies also carry the original-member-to-draft registry: drafting a
/// set member changes its identity, and membership queries must keep working
/// against the original value.
#[derive(Clone, Debug)]
pub(crate) enum CopyStore {
    Record(IndexMap<String, Node>),
    Array(Vec<Node>),
    Map(IndexMap<Value, Node>),
    Set {
        members: Vec<Node>,
        drafts: IndexMap<Value, DraftRc>,
    },
}

impl CopyStore {
    pub(crate) fn get(&self, seg: &Seg) -> Option<&Node> {
        match (self, seg) {
            (CopyStore::Record(m), Seg::Key(k)) => m.get(k),
            (CopyStore::Array(v), Seg::Index(i)) => v.get(*i),
            (CopyStore::Map(m), Seg::MapKey(k)) => m.get(k),
            _ => None,
        }
    }

    /// Store a node; array inserts at `len` append.
    pub(crate) fn insert(&mut self, seg: Seg, node: Node) {
        match (self, seg) {
            (CopyStore::Record(m), Seg::Key(k)) => {
                m.insert(k, node);
            }
            (CopyStore::Array(v), Seg::Index(i)) => {
                if i == v.len() {
                    v.push(node);
                } else {
                    v[i] = node;
                }
            }
            (CopyStore::Map(m), Seg::MapKey(k)) => {
                m.insert(k, node);
            }
            _ => {}
        }
    }

    pub(crate) fn remove(&mut self, seg: &Seg) -> Option<Node> {
        match (self, seg) {
            (CopyStore::Record(m), Seg::Key(k)) => m.shift_remove(k),
            (CopyStore::Map(m), Seg::MapKey(k)) => m.shift_remove(k),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            CopyStore::Record(m) => m.len(),
            CopyStore::Array(v) => v.len(),
            CopyStore::Map(m) => m.len(),
            CopyStore::Set { members, .. } => members.len(),
        }
    }

    pub(crate) fn keys(&self) -> Vec<Seg> {
        match self {
            CopyStore::Record(m) => m.keys().map(|k| Seg::Key(k.clone())).collect(),
            CopyStore::Array(v) => (0..v.len()).map(Seg::Index).collect(),
            CopyStore::Map(m) => m.keys().map(|k| Seg::MapKey(k.clone())).collect(),
            CopyStore::Set { members, .. } => (0..members.len()).map(Seg::Index).collect(),
        }
    }
}

/// Per-value mutable bookkeeping record.
#[derive(Debug)]
pub(crate) struct DraftState {
    /// Container kind; `None` only for the degenerate non-draftable root.
    pub(crate) kind: Option<Kind>,
    /// The original value this draft mirrors; never mutated.
    pub(crate) base: Value,
    /// Mutable backing copy, `None` until first write or child materialization.
    pub(crate) copy: Option<CopyStore>,
    /// Monotonic: set on first real mutation, propagated to ancestors.
    pub(crate) modified: bool,
    /// Guards re-entrant finalization and post-finalize writes.
    pub(crate) finalized: bool,
    /// Set when the owning scope is torn down.
    pub(crate) revoked: bool,
    /// True only for drafts created via `create_draft`.
    pub(crate) manual: bool,
    /// Key -> true (explicitly set) or false (explicitly deleted).
    pub(crate) assigned: IndexMap<Seg, bool>,
    /// Owning draft, for upward modified propagation.
    pub(crate) parent: Option<Weak<RefCell<DraftState>>>,
    /// Owning scope, fixed at creation.
    pub(crate) scope: Weak<Scope>,
    /// Finalized value, memoized by the finalizer.
    pub(crate) result: Option<Value>,
}

impl DraftState {
    pub(crate) fn check_alive(&self) -> DraftResult<()> {
        if self.revoked {
            Err(DraftError::Revoked)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_mutable(&self) -> DraftResult<()> {
        self.check_alive()?;
        if self.finalized {
            Err(DraftError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    pub(crate) fn latest_len(&self) -> usize {
        match &self.copy {
            Some(store) => store.len(),
            None => self.base.container_len().unwrap_or(0),
        }
    }

    pub(crate) fn latest_keys(&self) -> Vec<Seg> {
        match &self.copy {
            Some(store) => store.keys(),
            None => self.base.entries().into_iter().map(|(k, _)| k).collect(),
        }
    }
}

/// What a slot currently holds, cloned out of the state.
pub(crate) enum Slot {
    Missing,
    Plain(Value),
    Child(DraftRc),
}

pub(crate) fn slot(state: &DraftState, seg: &Seg) -> Slot {
    match &state.copy {
        Some(store) => match store.get(seg) {
            Some(Node::Value(v)) => Slot::Plain(v.clone()),
            Some(Node::Child(rc)) => Slot::Child(Rc::clone(rc)),
            None => Slot::Missing,
        },
        None => match state.base.get_key(seg) {
            Some(v) => Slot::Plain(v),
            None => Slot::Missing,
        },
    }
}

/// Allocate the shallow backing copy if it does not exist yet.
///
/// Set copies eagerly wrap every draftable member in a child draft and record
/// the original-to-draft mapping.
pub(crate) fn prepare_copy(rc: &DraftRc) -> DraftResult<()> {
    let (kind, base) = {
        let state = rc.borrow();
        if state.copy.is_some() {
            return Ok(());
        }
        let kind = state
            .kind
            .ok_or_else(|| DraftError::not_draftable(state.base.type_name()))?;
        (kind, state.base.clone())
    };
    let store = match kind {
        Kind::Record => CopyStore::Record(
            base.as_record()
                .expect("kind matches payload")
                .iter()
                .map(|(k, v)| (k.clone(), Node::Value(v.clone())))
                .collect(),
        ),
        Kind::Array => CopyStore::Array(
            base.as_array()
                .expect("kind matches payload")
                .iter()
                .map(|v| Node::Value(v.clone()))
                .collect(),
        ),
        Kind::Map => CopyStore::Map(
            base.as_map()
                .expect("kind matches payload")
                .iter()
                .map(|(k, v)| (k.clone(), Node::Value(v.clone())))
                .collect(),
        ),
        Kind::Set => {
            let mut members = Vec::new();
            let mut drafts = IndexMap::new();
            for member in base.as_set().expect("kind matches payload").iter() {
                if member.is_draftable() {
                    let child = make_child(rc, member.clone())?;
                    drafts.insert(member.clone(), Rc::clone(&child));
                    members.push(Node::Child(child));
                } else {
                    members.push(Node::Value(member.clone()));
                }
            }
            CopyStore::Set { members, drafts }
        }
    };
    rc.borrow_mut().copy = Some(store);
    Ok(())
}

/// Create a child draft over `base`, owned by the same scope as `parent`.
pub(crate) fn make_child(parent: &DraftRc, base: Value) -> DraftResult<DraftRc> {
    let scope_weak = parent.borrow().scope.clone();
    let scope = scope_weak.upgrade().ok_or(DraftError::Revoked)?;
    if scope.is_revoked() {
        return Err(DraftError::Revoked);
    }
    let kind = base.kind();
    debug_assert!(kind.is_some(), "child drafts wrap containers only");
    let child = Rc::new(RefCell::new(DraftState {
        kind,
        base,
        copy: None,
        modified: false,
        finalized: false,
        revoked: false,
        manual: false,
        assigned: IndexMap::new(),
        parent: Some(Rc::downgrade(parent)),
        scope: scope_weak,
        result: None,
    }));
    scope.register_draft(Rc::clone(&child));
    Ok(child)
}

/// Dirty propagates upward, never downward; stops at the first already-dirty
/// ancestor.
pub(crate) fn mark_modified(rc: &DraftRc) {
    let mut current = Rc::clone(rc);
    loop {
        let parent = {
            let mut state = current.borrow_mut();
            if state.modified {
                return;
            }
            state.modified = true;
            state.parent.clone()
        };
        match parent.and_then(|weak| weak.upgrade()) {
            Some(next) => current = next,
            None => return,
        }
    }
}

/// Detached snapshot of a draft's current (possibly partially modified)
/// state. Unmodified drafts return their base by reference; modified drafts
/// get a fresh shallow copy with children resolved recursively.
pub(crate) fn snapshot_state(rc: &DraftRc) -> Value {
    let state = rc.borrow();
    if let Some(result) = &state.result {
        return result.clone();
    }
    if !state.modified {
        return state.base.clone();
    }
    let Some(store) = &state.copy else {
        return state.base.clone();
    };
    match store {
        CopyStore::Record(m) => {
            Value::record(m.iter().map(|(k, n)| (k.clone(), n.snapshot())))
        }
        CopyStore::Array(v) => Value::array(v.iter().map(Node::snapshot)),
        CopyStore::Map(m) => Value::map(m.iter().map(|(k, n)| (k.clone(), n.snapshot()))),
        CopyStore::Set { members, .. } => Value::set(members.iter().map(Node::snapshot)),
    }
}

/// The result of reading one slot of a draft.
#[derive(Clone)]
pub enum DraftRead {
    /// A plain value (scalar, finalized, or already-diverged slot).
    Value(Value),
    /// A live child draft; mutations through it propagate to the parent.
    Draft(Draft),
}

impl DraftRead {
    /// The plain value, if this read did not produce a draft.
    #[inline]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DraftRead::Value(v) => Some(v),
            DraftRead::Draft(_) => None,
        }
    }

    /// The child draft, if one was produced.
    #[inline]
    pub fn into_draft(self) -> Option<Draft> {
        match self {
            DraftRead::Draft(d) => Some(d),
            DraftRead::Value(_) => None,
        }
    }

    /// True when this read produced a child draft.
    #[inline]
    pub fn is_draft(&self) -> bool {
        matches!(self, DraftRead::Draft(_))
    }

    /// Detached snapshot of whatever this read produced.
    pub fn snapshot(&self) -> DraftResult<Value> {
        match self {
            DraftRead::Value(v) => Ok(v.clone()),
            DraftRead::Draft(d) => d.snapshot(),
        }
    }
}

/// The mutable facade over an immutable value.
///
/// Handles are cheap to clone and share one underlying draft state. All
/// operations fail fast once the owning session has ended.
///
/// # Examples
///
/// ```
/// use draft_state::{produce, value};
///
/// let base = value!({"count": 1, "nested": {"x": true}});
/// let next = produce(&base, |d| {
///     d.set("count", 2)?;
///     Ok(())
/// }).unwrap();
/// assert_eq!(next.get_key(&"count".into()), Some(draft_state::Value::Int(2)));
/// ```
#[derive(Clone, Debug)]
pub struct Draft {
    state: DraftRc,
    /// Keeps a manually-created draft's scope alive until `finish_draft`.
    keepalive: Option<Rc<Scope>>,
}

enum ReadStep {
    Done(Option<DraftRead>),
    Lazy(Value),
}

impl Draft {
    pub(crate) fn from_rc(state: DraftRc) -> Draft {
        Draft {
            state,
            keepalive: None,
        }
    }

    pub(crate) fn new_root(base: Value, scope: &Rc<Scope>, manual: bool) -> Draft {
        let state = Rc::new(RefCell::new(DraftState {
            kind: base.kind(),
            base,
            copy: None,
            modified: false,
            finalized: false,
            revoked: false,
            manual,
            assigned: IndexMap::new(),
            parent: None,
            scope: Rc::downgrade(scope),
            result: None,
        }));
        scope.register_draft(Rc::clone(&state));
        Draft {
            state,
            keepalive: None,
        }
    }

    /// Degenerate root for a non-draftable base; holds the scalar, rejects
    /// every container operation.
    pub(crate) fn detached(base: Value) -> Draft {
        Draft {
            state: Rc::new(RefCell::new(DraftState {
                kind: None,
                base,
                copy: None,
                modified: false,
                finalized: false,
                revoked: false,
                manual: false,
                assigned: IndexMap::new(),
                parent: None,
                scope: Weak::new(),
                result: None,
            })),
            keepalive: None,
        }
    }

    pub(crate) fn with_keepalive(mut self, scope: Rc<Scope>) -> Draft {
        self.keepalive = Some(scope);
        self
    }

    pub(crate) fn state(&self) -> &DraftRc {
        &self.state
    }

    /// Container kind of the drafted value.
    pub fn kind(&self) -> DraftResult<Kind> {
        let state = self.state.borrow();
        state.check_alive()?;
        state
            .kind
            .ok_or_else(|| DraftError::not_draftable(state.base.type_name()))
    }

    fn expect_kind(&self, operation: &'static str, kinds: &[Kind]) -> DraftResult<Kind> {
        let kind = self.kind().map_err(|err| match err {
            DraftError::NotDraftable { found } => DraftError::kind_mismatch(
                operation,
                if kinds.len() == 1 {
                    kinds[0].name()
                } else {
                    "a container"
                },
                found,
            ),
            other => other,
        })?;
        if kinds.contains(&kind) {
            Ok(kind)
        } else {
            Err(DraftError::kind_mismatch(
                operation,
                if kinds.len() == 1 {
                    kinds[0].name()
                } else {
                    "a keyed container"
                },
                kind.name(),
            ))
        }
    }

    /// Validate and normalize a segment for this draft's container kind.
    fn normalize_seg(&self, operation: &'static str, seg: Seg) -> DraftResult<Seg> {
        match self.expect_kind(operation, &[Kind::Record, Kind::Array, Kind::Map])? {
            Kind::Record => match seg {
                Seg::Key(_) => Ok(seg),
                other => Err(DraftError::invalid_key(other.to_string(), "record")),
            },
            Kind::Array => match seg {
                Seg::Index(_) => Ok(seg),
                other => Err(DraftError::invalid_key(other.to_string(), "array")),
            },
            Kind::Map => Ok(Seg::MapKey(seg.to_map_key())),
            Kind::Set => unreachable!("set excluded above"),
        }
    }

    /// True once this draft (or any descendant) has been written to.
    pub fn is_modified(&self) -> bool {
        self.state.borrow().modified
    }

    /// The untouched original value this draft mirrors.
    pub fn base(&self) -> Value {
        self.state.borrow().base.clone()
    }

    /// Detached, repeatable snapshot of the draft's current state.
    ///
    /// Unmodified subtrees come back reference-identical to the base; this is
    /// the same structural-sharing rule the finalizer applies, but
    /// non-destructive.
    pub fn snapshot(&self) -> DraftResult<Value> {
        self.state.borrow().check_alive()?;
        Ok(snapshot_state(&self.state))
    }

    /// Number of entries in the latest state of this container.
    pub fn len(&self) -> DraftResult<usize> {
        let state = self.state.borrow();
        state.check_alive()?;
        state
            .kind
            .ok_or_else(|| DraftError::not_draftable(state.base.type_name()))?;
        Ok(state.latest_len())
    }

    /// True when the container has no entries.
    pub fn is_empty(&self) -> DraftResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Keyed membership test against the latest state.
    pub fn has(&self, seg: impl Into<Seg>) -> DraftResult<bool> {
        let seg = self.normalize_seg("has", seg.into())?;
        let state = self.state.borrow();
        state.check_alive()?;
        Ok(match slot(&state, &seg) {
            Slot::Missing => false,
            _ => true,
        })
    }

    /// Read one slot, lazily wrapping nested containers in child drafts.
    ///
    /// A container slot is virtualized into a child draft on first visit
    /// (materializing this draft's copy so the child has a concrete home);
    /// this covers values assigned during the session too, since they are as
    /// immutable as the base. Scalars come back verbatim. Reads never mark
    /// anything modified.
    pub fn get(&self, seg: impl Into<Seg>) -> DraftResult<Option<DraftRead>> {
        let seg = self.normalize_seg("get", seg.into())?;
        let step = {
            let state = self.state.borrow();
            state.check_alive()?;
            match slot(&state, &seg) {
                Slot::Missing => ReadStep::Done(None),
                Slot::Child(rc) => ReadStep::Done(Some(DraftRead::Draft(Draft::from_rc(rc)))),
                Slot::Plain(v) => {
                    if state.finalized || !v.is_draftable() {
                        ReadStep::Done(Some(DraftRead::Value(v)))
                    } else {
                        ReadStep::Lazy(v)
                    }
                }
            }
        };
        match step {
            ReadStep::Done(read) => Ok(read),
            ReadStep::Lazy(value) => {
                prepare_copy(&self.state)?;
                let child = make_child(&self.state, value)?;
                self.state
                    .borrow_mut()
                    .copy
                    .as_mut()
                    .expect("copy just materialized")
                    .insert(seg, Node::Child(Rc::clone(&child)));
                Ok(Some(DraftRead::Draft(Draft::from_rc(child))))
            }
        }
    }

    /// Read a slot as a plain value; absent keys yield `Null`.
    pub fn get_value(&self, seg: impl Into<Seg>) -> DraftResult<Value> {
        match self.get(seg)? {
            Some(read) => read.snapshot(),
            None => Ok(Value::Null),
        }
    }

    /// Read a slot that must hold a nested container, as a child draft.
    pub fn draft(&self, seg: impl Into<Seg>) -> DraftResult<Draft> {
        let seg = seg.into();
        match self.get(seg.clone())? {
            Some(DraftRead::Draft(d)) => Ok(d),
            Some(DraftRead::Value(v)) => Err(DraftError::not_draftable(v.type_name())),
            None => Err(DraftError::path_not_found(
                crate::Path::from_segments(vec![seg]),
            )),
        }
    }

    /// Write one slot.
    ///
    /// Writing a value identical (by the engine's identity rule) to the
    /// current one is a no-op; writing a child draft's original base value
    /// back reverts the slot without counting as a change for patches. Array
    /// indices must be in bounds (writing at `len` appends).
    pub fn set(&self, seg: impl Into<Seg>, value: impl Into<Value>) -> DraftResult<()> {
        let seg = self.normalize_seg("set", seg.into())?;
        let value = value.into();
        let kind = {
            let state = self.state.borrow();
            state.check_mutable()?;
            if state.kind == Some(Kind::Array) {
                let len = state.latest_len();
                let index = seg.as_index().expect("normalized array segment");
                if index > len {
                    return Err(DraftError::index_out_of_bounds(index, len));
                }
            }
            state.kind.expect("normalized draft has a kind")
        };
        if kind == Kind::Map {
            return self.map_set(seg, value);
        }

        let (was_modified, current) = {
            let state = self.state.borrow();
            (state.modified, slot(&state, &seg))
        };
        if !was_modified {
            // Reverting a drafted slot to its original value nets out to no
            // change: the slot leaves the assignment log entirely, matching
            // how an added-then-deleted key is treated.
            if let Slot::Child(child) = &current {
                if Value::same(&child.borrow().base, &value) {
                    let mut state = self.state.borrow_mut();
                    let store = state.copy.as_mut().expect("child slot implies copy");
                    store.insert(seg.clone(), Node::Value(value));
                    state.assigned.shift_remove(&seg);
                    return Ok(());
                }
            }
            if let Slot::Plain(existing) = &current {
                if Value::same(existing, &value) {
                    return Ok(());
                }
            }
            prepare_copy(&self.state)?;
            mark_modified(&self.state);
        } else if let Slot::Plain(existing) = &current {
            if Value::same(existing, &value) {
                return Ok(());
            }
        }
        prepare_copy(&self.state)?;
        let mut state = self.state.borrow_mut();
        let store = state.copy.as_mut().expect("copy prepared above");
        store.insert(seg.clone(), Node::Value(value));
        state.assigned.insert(seg, true);
        Ok(())
    }

    /// Delete a key from a record or map; returns whether anything existed.
    ///
    /// A key present on the base is recorded as explicitly removed; a key
    /// added and deleted within the same session nets out to untouched.
    pub fn delete(&self, seg: impl Into<Seg>) -> DraftResult<bool> {
        let seg = self.normalize_seg("delete", seg.into())?;
        let kind = self.expect_kind("delete", &[Kind::Record, Kind::Map])?;
        if kind == Kind::Map {
            return self.map_delete(seg);
        }
        {
            let state = self.state.borrow();
            state.check_mutable()?;
        }
        let (existed_base, existed_latest) = {
            let state = self.state.borrow();
            (
                state.base.has_key(&seg),
                !matches!(slot(&state, &seg), Slot::Missing),
            )
        };
        if existed_base {
            {
                let mut state = self.state.borrow_mut();
                state.assigned.insert(seg.clone(), false);
            }
            prepare_copy(&self.state)?;
            mark_modified(&self.state);
        } else {
            self.state.borrow_mut().assigned.shift_remove(&seg);
        }
        if let Some(store) = self.state.borrow_mut().copy.as_mut() {
            store.remove(&seg);
        }
        Ok(existed_latest)
    }

    /// Keys of the latest state, in container order.
    pub fn keys(&self) -> DraftResult<Vec<Seg>> {
        let state = self.state.borrow();
        state.check_alive()?;
        state
            .kind
            .ok_or_else(|| DraftError::not_draftable(state.base.type_name()))?;
        Ok(state.latest_keys())
    }

    /// Enumerate entries, routing every value through the read trap so that
    /// iterating and mutating nested values in the same pass works.
    pub fn entries(&self) -> DraftResult<Vec<(Seg, DraftRead)>> {
        if self.kind()? == Kind::Set {
            return Ok(self
                .members()?
                .into_iter()
                .enumerate()
                .map(|(i, read)| (Seg::Index(i), read))
                .collect());
        }
        let keys = self.keys()?;
        let mut out = Vec::with_capacity(keys.len());
        for seg in keys {
            if let Some(read) = self.get(seg.clone())? {
                out.push((seg, read));
            }
        }
        Ok(out)
    }

    // ===== Array conveniences =====

    /// Append a value to an array draft.
    pub fn push(&self, value: impl Into<Value>) -> DraftResult<()> {
        self.expect_kind("push", &[Kind::Array])?;
        let len = self.len()?;
        self.set(Seg::Index(len), value)
    }

    /// Remove and return the last element of an array draft.
    pub fn pop(&self) -> DraftResult<Option<Value>> {
        self.expect_kind("pop", &[Kind::Array])?;
        {
            let state = self.state.borrow();
            state.check_mutable()?;
            if state.latest_len() == 0 {
                return Ok(None);
            }
        }
        prepare_copy(&self.state)?;
        mark_modified(&self.state);
        let mut state = self.state.borrow_mut();
        let CopyStore::Array(items) = state.copy.as_mut().expect("copy prepared above") else {
            unreachable!("array draft has array copy");
        };
        let node = items.pop();
        let new_len = items.len();
        state.assigned.shift_remove(&Seg::Index(new_len));
        Ok(node.map(|n| n.snapshot()))
    }

    /// Insert a value at `index`, shifting later elements right.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> DraftResult<()> {
        self.expect_kind("insert", &[Kind::Array])?;
        {
            let state = self.state.borrow();
            state.check_mutable()?;
            let len = state.latest_len();
            if index > len {
                return Err(DraftError::index_out_of_bounds(index, len));
            }
        }
        prepare_copy(&self.state)?;
        mark_modified(&self.state);
        let mut state = self.state.borrow_mut();
        let CopyStore::Array(items) = state.copy.as_mut().expect("copy prepared above") else {
            unreachable!("array draft has array copy");
        };
        items.insert(index, Node::Value(value.into()));
        let len = items.len();
        // Every shifted slot counts as assigned for diffing purposes.
        for i in index..len {
            state.assigned.insert(Seg::Index(i), true);
        }
        Ok(())
    }

    /// Remove and return the element at `index`, shifting later elements left.
    pub fn remove(&self, index: usize) -> DraftResult<Value> {
        self.expect_kind("remove", &[Kind::Array])?;
        {
            let state = self.state.borrow();
            state.check_mutable()?;
            let len = state.latest_len();
            if index >= len {
                return Err(DraftError::index_out_of_bounds(index, len));
            }
        }
        prepare_copy(&self.state)?;
        mark_modified(&self.state);
        let mut state = self.state.borrow_mut();
        let CopyStore::Array(items) = state.copy.as_mut().expect("copy prepared above") else {
            unreachable!("array draft has array copy");
        };
        let node = items.remove(index);
        let len = items.len();
        for i in index..len {
            state.assigned.insert(Seg::Index(i), true);
        }
        state.assigned.shift_remove(&Seg::Index(len));
        Ok(node.snapshot())
    }

    /// Resize an array draft; growing pads with `Null`, shrinking truncates.
    ///
    /// This is the `length = n` write of the reference design.
    pub fn set_len(&self, new_len: usize) -> DraftResult<()> {
        self.expect_kind("set_len", &[Kind::Array])?;
        {
            let state = self.state.borrow();
            state.check_mutable()?;
            if state.latest_len() == new_len {
                return Ok(());
            }
        }
        prepare_copy(&self.state)?;
        mark_modified(&self.state);
        let mut state = self.state.borrow_mut();
        let CopyStore::Array(items) = state.copy.as_mut().expect("copy prepared above") else {
            unreachable!("array draft has array copy");
        };
        if new_len < items.len() {
            items.truncate(new_len);
        } else {
            items.resize_with(new_len, || Node::Value(Value::Null));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{produce, value};

    #[test]
    fn test_lazy_child_creation_does_not_modify() {
        let base = value!({"a": {"b": {"c": 1}}});
        let result = produce(&base, |d| {
            let a = d.draft("a")?;
            let b = a.draft("b")?;
            assert!(!d.is_modified());
            assert!(!a.is_modified());
            assert_eq!(b.get_value("c")?, Value::Int(1));
            Ok(())
        })
        .unwrap();
        assert!(Value::same(&result, &base));
    }

    #[test]
    fn test_modified_propagates_upward() {
        let base = value!({"a": {"b": 1}, "c": 2});
        produce(&base, |d| {
            let a = d.draft("a")?;
            a.set("b", 5)?;
            assert!(a.is_modified());
            assert!(d.is_modified());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_noop_write_is_skipped() {
        let base = value!({"x": 1});
        let result = produce(&base, |d| {
            d.set("x", 1)?;
            assert!(!d.is_modified());
            Ok(())
        })
        .unwrap();
        assert!(Value::same(&result, &base));
    }

    #[test]
    fn test_revert_to_original_value() {
        let base = value!({"child": {"x": 1}});
        let original_child = base.get_key(&"child".into()).unwrap();
        let result = produce(&base, |d| {
            // Draft the child, then put the original back.
            let _ = d.draft("child")?;
            d.set("child", original_child.clone())?;
            Ok(())
        })
        .unwrap();
        let child = result.get_key(&"child".into()).unwrap();
        assert!(Value::same(&child, &base.get_key(&"child".into()).unwrap()));
    }

    #[test]
    fn test_array_index_validation() {
        let base = value!({"list": [1, 2]});
        let err = produce(&base, |d| {
            let list = d.draft("list")?;
            list.set(5usize, 9)
        })
        .unwrap_err();
        assert!(matches!(err, DraftError::IndexOutOfBounds { index: 5, len: 2 }));

        let err = produce(&base, |d| {
            let list = d.draft("list")?;
            list.set("not-an-index", 9)
        })
        .unwrap_err();
        assert!(matches!(err, DraftError::InvalidKey { .. }));
    }

    #[test]
    fn test_delete_semantics() {
        let base = value!({"keep": 1, "drop": 2});
        let result = produce(&base, |d| {
            assert!(d.delete("drop")?);
            assert!(!d.delete("never-there")?);
            // Added then deleted nets out to untouched.
            d.set("ephemeral", true)?;
            assert!(d.delete("ephemeral")?);
            Ok(())
        })
        .unwrap();
        assert!(!result.has_key(&"drop".into()));
        assert!(!result.has_key(&"ephemeral".into()));
        assert!(result.has_key(&"keep".into()));
    }

    #[test]
    fn test_draft_use_after_session_fails() {
        let base = value!({"a": {"b": 1}});
        let mut escaped = None;
        produce(&base, |d| {
            escaped = Some(d.draft("a")?);
            Ok(())
        })
        .unwrap();
        let err = escaped.unwrap().get_value("b").unwrap_err();
        assert!(matches!(err, DraftError::Revoked));
    }

    #[test]
    fn test_entries_route_through_read_trap() {
        let base = value!({"a": {"n": 1}, "b": 2});
        let result = produce(&base, |d| {
            for (_, read) in d.entries()? {
                if let DraftRead::Draft(child) = read {
                    let n = child.get_value("n")?;
                    child.set("n", Value::Int(n.to_json().as_i64().unwrap_or(0) + 10))?;
                }
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(
            result.get_key(&"a".into()).unwrap().get_key(&"n".into()),
            Some(Value::Int(11))
        );
        assert_eq!(result.get_key(&"b".into()), Some(Value::Int(2)));
    }
}
