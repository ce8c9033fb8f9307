//! The producer facade: run a recipe against a draft of a base value and
//! collapse the outcome into the next immutable value.

use crate::draft::{Draft, DraftRc};
use crate::finalize::process_result;
use crate::scope::{Scope, ScopeGuard};
use crate::{diff, DraftError, DraftResult, Patch, Value};
use std::future::Future;
use std::rc::Rc;

/// What a recipe hands back.
///
/// Most recipes mutate the draft and return `()`, which maps to [`Keep`].
/// Returning a [`Value`] replaces the document wholesale; [`Nothing`] clears
/// it to `Null`. Replacing while the draft was also modified is rejected at
/// finalization.
///
/// [`Keep`]: RecipeReturn::Keep
/// [`Nothing`]: RecipeReturn::Nothing
#[derive(Clone, Debug)]
pub enum RecipeReturn {
    /// Use the (possibly modified) draft as the result.
    Keep,
    /// Discard the draft and use this value instead.
    Replace(Value),
    /// Discard the draft and produce `Null`.
    Nothing,
}

impl From<()> for RecipeReturn {
    fn from(_: ()) -> Self {
        RecipeReturn::Keep
    }
}

impl From<Value> for RecipeReturn {
    fn from(value: Value) -> Self {
        RecipeReturn::Replace(value)
    }
}

/// Entry point carrying session configuration.
///
/// # Examples
///
/// ```
/// use draft_state::{Producer, value};
///
/// let producer = Producer::new().auto_freeze(false);
/// let base = value!({"n": 1});
/// let next = producer.produce(&base, |d| d.set("n", 2)).unwrap();
/// assert!(!next.is_frozen());
/// ```
#[derive(Clone, Debug)]
pub struct Producer {
    auto_freeze: bool,
}

impl Default for Producer {
    fn default() -> Self {
        Self::new()
    }
}

impl Producer {
    /// Producer with default configuration: results are deep-frozen.
    pub fn new() -> Self {
        Producer { auto_freeze: true }
    }

    /// Toggle deep-freezing of produced results.
    pub fn auto_freeze(mut self, on: bool) -> Self {
        self.auto_freeze = on;
        self
    }

    /// Run `recipe` against a draft of `base` and return the next value.
    ///
    /// The base is never mutated. If the recipe touches nothing, the result
    /// is the base itself, identity included.
    pub fn produce<R>(
        &self,
        base: &Value,
        recipe: impl FnOnce(&Draft) -> DraftResult<R>,
    ) -> DraftResult<Value>
    where
        R: Into<RecipeReturn>,
    {
        self.run(base, false, recipe).map(|(value, _)| value)
    }

    /// Like [`produce`](Self::produce), also returning the forward and
    /// inverse patches describing the change.
    pub fn produce_with_patches<R>(
        &self,
        base: &Value,
        recipe: impl FnOnce(&Draft) -> DraftResult<R>,
    ) -> DraftResult<(Value, Patch, Patch)>
    where
        R: Into<RecipeReturn>,
    {
        let (value, patches) = self.run(base, true, recipe)?;
        let (forward, inverse) = patches.unwrap_or_default();
        Ok((value, forward, inverse))
    }

    /// Async variant of [`produce`](Self::produce): the recipe owns the root
    /// draft handle across await points. The session is torn down when the
    /// future completes or is dropped, so cancelled recipes cannot leak live
    /// drafts.
    pub async fn produce_async<R, Fut>(
        &self,
        base: &Value,
        recipe: impl FnOnce(Draft) -> Fut,
    ) -> DraftResult<Value>
    where
        R: Into<RecipeReturn>,
        Fut: Future<Output = DraftResult<R>>,
    {
        if !base.is_draftable() {
            let draft = Draft::detached(base.clone());
            let returned = recipe(draft).await?.into();
            return Ok(self.scalar_result(base, returned, false).0);
        }
        let scope = Scope::enter(self.auto_freeze);
        let _guard = ScopeGuard(Rc::clone(&scope));
        let draft = Draft::new_root(base.clone(), &scope, false);
        let root: DraftRc = Rc::clone(draft.state());
        let returned = recipe(draft).await?.into();
        process_result(&scope, &root, returned)
    }

    /// Like [`produce_async`](Self::produce_async), also returning the
    /// forward and inverse patches describing the change.
    pub async fn produce_async_with_patches<R, Fut>(
        &self,
        base: &Value,
        recipe: impl FnOnce(Draft) -> Fut,
    ) -> DraftResult<(Value, Patch, Patch)>
    where
        R: Into<RecipeReturn>,
        Fut: Future<Output = DraftResult<R>>,
    {
        if !base.is_draftable() {
            let draft = Draft::detached(base.clone());
            let returned = recipe(draft).await?.into();
            let (value, patches) = self.scalar_result(base, returned, true);
            let (forward, inverse) = patches.unwrap_or_default();
            return Ok((value, forward, inverse));
        }
        let scope = Scope::enter(self.auto_freeze);
        let _guard = ScopeGuard(Rc::clone(&scope));
        scope.enable_patches();
        let draft = Draft::new_root(base.clone(), &scope, false);
        let root: DraftRc = Rc::clone(draft.state());
        let returned = recipe(draft).await?.into();
        let result = process_result(&scope, &root, returned)?;
        let (forward, inverse) = scope.take_patches().unwrap_or_default();
        Ok((result, forward, inverse))
    }

    /// Start a manual session: a draft that stays alive until explicitly
    /// finished with [`finish_draft`](Self::finish_draft).
    pub fn create_draft(&self, base: &Value) -> DraftResult<Draft> {
        if !base.is_draftable() {
            return Err(DraftError::not_draftable(base.type_name()));
        }
        let scope = Scope::enter(self.auto_freeze);
        let draft = Draft::new_root(base.clone(), &scope, true);
        scope.leave();
        Ok(draft.with_keepalive(scope))
    }

    /// Finalize a manual draft into the next immutable value and end its
    /// session. The handle (and any clones) are unusable afterwards.
    pub fn finish_draft(&self, draft: Draft) -> DraftResult<Value> {
        self.finish(draft, false).map(|(value, _)| value)
    }

    /// Like [`finish_draft`](Self::finish_draft), also returning patches.
    pub fn finish_draft_with_patches(&self, draft: Draft) -> DraftResult<(Value, Patch, Patch)> {
        let (value, patches) = self.finish(draft, true)?;
        let (forward, inverse) = patches.unwrap_or_default();
        Ok((value, forward, inverse))
    }

    fn run<R>(
        &self,
        base: &Value,
        with_patches: bool,
        recipe: impl FnOnce(&Draft) -> DraftResult<R>,
    ) -> DraftResult<(Value, Option<(Patch, Patch)>)>
    where
        R: Into<RecipeReturn>,
    {
        if !base.is_draftable() {
            let draft = Draft::detached(base.clone());
            let returned = recipe(&draft)?.into();
            return Ok(self.scalar_result(base, returned, with_patches));
        }
        let scope = Scope::enter(self.auto_freeze);
        let _guard = ScopeGuard(Rc::clone(&scope));
        if with_patches {
            scope.enable_patches();
        }
        let draft = Draft::new_root(base.clone(), &scope, false);
        let returned = recipe(&draft)?.into();
        let result = process_result(&scope, draft.state(), returned)?;
        let patches = scope.take_patches();
        Ok((result, patches))
    }

    /// A non-draftable base cannot be edited in place, only replaced; patch
    /// output is always a whole-document replacement pair.
    fn scalar_result(
        &self,
        base: &Value,
        returned: RecipeReturn,
        with_patches: bool,
    ) -> (Value, Option<(Patch, Patch)>) {
        let result = match returned {
            RecipeReturn::Keep => base.clone(),
            RecipeReturn::Replace(value) => value,
            RecipeReturn::Nothing => Value::Null,
        };
        if self.auto_freeze {
            result.deep_freeze();
        }
        let patches = with_patches.then(|| {
            let mut forward = Patch::new();
            let mut inverse = Patch::new();
            diff::generate_replacement_patches(base, &result, &mut forward, &mut inverse);
            (forward, inverse)
        });
        (result, patches)
    }

    fn finish(
        &self,
        draft: Draft,
        with_patches: bool,
    ) -> DraftResult<(Value, Option<(Patch, Patch)>)> {
        let scope = {
            let state = draft.state().borrow();
            state.check_alive()?;
            if !state.manual {
                return Err(DraftError::NotManual);
            }
            state.scope.upgrade().ok_or(DraftError::Revoked)?
        };
        if with_patches {
            scope.enable_patches();
        }
        let result = process_result(&scope, draft.state(), RecipeReturn::Keep);
        let patches = scope.take_patches();
        scope.revoke();
        Ok((result?, patches))
    }
}

/// Produce the next value from `base` by running `recipe` against a draft.
///
/// # Examples
///
/// ```
/// use draft_state::{produce, value, Value};
///
/// let base = value!({"todos": [{"done": false}]});
/// let next = produce(&base, |d| {
///     d.draft("todos")?.draft(0usize)?.set("done", true)?;
///     Ok(())
/// }).unwrap();
/// assert!(Value::same(&base, &base)); // base untouched
/// ```
pub fn produce<R>(
    base: &Value,
    recipe: impl FnOnce(&Draft) -> DraftResult<R>,
) -> DraftResult<Value>
where
    R: Into<RecipeReturn>,
{
    Producer::new().produce(base, recipe)
}

/// [`produce`] with forward and inverse patch recording.
pub fn produce_with_patches<R>(
    base: &Value,
    recipe: impl FnOnce(&Draft) -> DraftResult<R>,
) -> DraftResult<(Value, Patch, Patch)>
where
    R: Into<RecipeReturn>,
{
    Producer::new().produce_with_patches(base, recipe)
}

/// Start a manual draft session with default configuration.
pub fn create_draft(base: &Value) -> DraftResult<Draft> {
    Producer::new().create_draft(base)
}

/// Finish a manual draft session.
pub fn finish_draft(draft: Draft) -> DraftResult<Value> {
    Producer::new().finish_draft(draft)
}

/// Finish a manual draft session, also returning patches.
pub fn finish_draft_with_patches(draft: Draft) -> DraftResult<(Value, Patch, Patch)> {
    Producer::new().finish_draft_with_patches(draft)
}

/// Detached snapshot of a draft's in-progress state; the draft stays live.
pub fn current(draft: &Draft) -> DraftResult<Value> {
    draft.snapshot()
}
