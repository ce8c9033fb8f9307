//! Session scopes.
//!
//! A scope owns every draft created during one edit session and tears them
//! all down when the session ends, successfully or not. Scopes nest: a recipe
//! may itself start another session, which pushes a child scope onto a
//! thread-local stack and pops it on the way out.

use crate::draft::DraftRc;
use crate::Patch;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Rc<Scope>>> = const { RefCell::new(Vec::new()) };
}

/// Forward/inverse accumulators for a patch-recording session.
#[derive(Debug, Default)]
pub(crate) struct PatchAccumulator {
    pub(crate) forward: Patch,
    pub(crate) inverse: Patch,
}

/// Bookkeeping for one drafting session.
#[derive(Debug)]
pub(crate) struct Scope {
    parent: Option<Rc<Scope>>,
    auto_freeze: bool,
    drafts: RefCell<Vec<DraftRc>>,
    patches: RefCell<Option<PatchAccumulator>>,
    revoked: Cell<bool>,
}

impl Scope {
    /// Push a new scope; its parent is whatever scope was current.
    pub(crate) fn enter(auto_freeze: bool) -> Rc<Scope> {
        SCOPE_STACK.with(|stack| {
            let parent = stack.borrow().last().cloned();
            let scope = Rc::new(Scope {
                parent,
                auto_freeze,
                drafts: RefCell::new(Vec::new()),
                patches: RefCell::new(None),
                revoked: Cell::new(false),
            });
            stack.borrow_mut().push(Rc::clone(&scope));
            scope
        })
    }

    /// Pop this scope, but only if it is actually current.
    ///
    /// Out-of-order teardown (an error unwinding through nested sessions)
    /// must not pop someone else's scope.
    pub(crate) fn leave(self: &Rc<Scope>) {
        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.last().is_some_and(|top| Rc::ptr_eq(top, self)) {
                stack.pop();
            }
        });
    }

    /// Leave, then revoke every draft owned by this scope. Idempotent.
    pub(crate) fn revoke(self: &Rc<Scope>) {
        if self.revoked.get() {
            return;
        }
        self.revoked.set(true);
        self.leave();
        for draft in self.drafts.take() {
            draft.borrow_mut().revoked = true;
        }
    }

    /// True once this scope has been revoked.
    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.get()
    }

    /// True for a top-level session (no enclosing scope at creation time).
    ///
    /// Only outermost sessions freeze their results.
    pub(crate) fn is_outermost(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether finished values of this session should be frozen.
    pub(crate) fn auto_freeze(&self) -> bool {
        self.auto_freeze
    }

    /// Record a draft as owned by this scope.
    pub(crate) fn register_draft(&self, draft: DraftRc) {
        self.drafts.borrow_mut().push(draft);
    }

    /// Lazily allocate the forward/inverse patch accumulators.
    pub(crate) fn enable_patches(&self) {
        let mut patches = self.patches.borrow_mut();
        if patches.is_none() {
            *patches = Some(PatchAccumulator::default());
        }
    }

    /// True when this session records patches.
    pub(crate) fn patches_enabled(&self) -> bool {
        self.patches.borrow().is_some()
    }

    /// Run `f` against the accumulators when patch recording is on.
    pub(crate) fn with_patches(&self, f: impl FnOnce(&mut Patch, &mut Patch)) {
        if let Some(acc) = self.patches.borrow_mut().as_mut() {
            f(&mut acc.forward, &mut acc.inverse);
        }
    }

    /// Take the accumulated patch lists, if recording was on.
    pub(crate) fn take_patches(&self) -> Option<(Patch, Patch)> {
        self.patches
            .borrow_mut()
            .take()
            .map(|acc| (acc.forward, acc.inverse))
    }
}

/// Revokes the scope on drop.
///
/// Keeps the guarantee that a failed session never leaves usable drafts,
/// whatever path the error takes out of the facade.
pub(crate) struct ScopeGuard(pub(crate) Rc<Scope>);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top() -> Option<Rc<Scope>> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    #[test]
    fn test_nested_enter_leave() {
        let outer = Scope::enter(true);
        assert!(outer.is_outermost());
        let inner = Scope::enter(true);
        assert!(!inner.is_outermost());
        assert!(Rc::ptr_eq(&top().unwrap(), &inner));
        inner.leave();
        assert!(Rc::ptr_eq(&top().unwrap(), &outer));
        outer.leave();
        assert!(top().is_none());
    }

    #[test]
    fn test_leave_is_order_safe() {
        let outer = Scope::enter(true);
        let inner = Scope::enter(true);
        // Leaving the outer scope first must not pop the inner one.
        outer.leave();
        assert!(Rc::ptr_eq(&top().unwrap(), &inner));
        inner.leave();
        outer.leave();
        assert!(top().is_none());
    }

    #[test]
    fn test_revoke_idempotent() {
        let scope = Scope::enter(true);
        scope.revoke();
        scope.revoke();
        assert!(scope.is_revoked());
        assert!(top().is_none());
    }

    #[test]
    fn test_patch_accumulators() {
        let scope = Scope::enter(true);
        assert!(!scope.patches_enabled());
        scope.enable_patches();
        scope.with_patches(|fwd, inv| {
            fwd.push(crate::PatchOp::remove(crate::path!("x")));
            inv.push(crate::PatchOp::add(crate::path!("x"), crate::Value::Int(1)));
        });
        let (fwd, inv) = scope.take_patches().unwrap();
        assert_eq!(fwd.len(), 1);
        assert_eq!(inv.len(), 1);
        scope.revoke();
    }
}
