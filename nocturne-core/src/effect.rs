//! # Effect Module
//!
//! Side effects described as data. Reducers return an [`Effect`] and never
//! perform I/O themselves; the [`Store`](crate::store::Store) interprets the
//! description by launching or cancelling tokio tasks.
//!
//! ## Variants
//! - `None` - nothing to do
//! - `Task` - run an async operation once, optionally producing a follow-up action
//! - `Stream` - run a long-lived operation that emits actions through an [`ActionSender`]
//! - `Merge` - interpret several effects independently
//! - `Cancel` - stop whatever is registered under an id
//!
//! Every task and stream carries an [`EffectId`]. Registering work under an id
//! that is already in use cancels the previous registration first, which is how
//! both debouncing and "only one engine session at a time" are expressed.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

static NEXT_ANONYMOUS_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a task or stream, the unit of cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectId {
    /// A stable, feature-defined id such as `"metronome.engine"`.
    Named(&'static str),
    /// A fresh id for fire-and-forget work nobody will cancel by name.
    Anonymous(u64),
}

impl EffectId {
    /// Allocates an id that is distinct from every other anonymous id.
    pub fn unique() -> Self {
        EffectId::Anonymous(NEXT_ANONYMOUS_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, EffectId::Anonymous(_))
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectId::Named(name) => write!(f, "{}", name),
            EffectId::Anonymous(n) => write!(f, "#{}", n),
        }
    }
}

/// Operation run once by a `Task` effect.
pub type TaskOperation<A> = Box<dyn FnOnce() -> BoxFuture<'static, Option<A>> + Send>;

/// Operation run by a `Stream` effect. It may emit any number of actions.
pub type StreamOperation<A> = Box<dyn FnOnce(ActionSender<A>) -> BoxFuture<'static, ()> + Send>;

/// A description of a side effect.
pub enum Effect<A> {
    None,
    Task { id: EffectId, operation: TaskOperation<A> },
    Stream { id: EffectId, operation: StreamOperation<A> },
    Merge(Vec<Effect<A>>),
    Cancel(EffectId),
}

/// The observable shape of an effect, used to assert on reducer output
/// without running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectShape {
    Task(EffectId),
    Stream(EffectId),
    Cancel(EffectId),
}

impl<A: Send + 'static> Effect<A> {
    /// Runs `operation` once under a fresh anonymous id.
    pub fn run<F, Fut>(operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<A>> + Send + 'static,
    {
        Effect::run_with_id(EffectId::unique(), operation)
    }

    /// Runs `operation` once under `id`, replacing anything registered there.
    pub fn run_with_id<F, Fut>(id: EffectId, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<A>> + Send + 'static,
    {
        Effect::Task {
            id,
            operation: Box::new(move || Box::pin(operation())),
        }
    }

    /// Runs `operation` for its side effect only.
    pub fn fire_and_forget<F, Fut>(operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Effect::fire_and_forget_with_id(EffectId::unique(), operation)
    }

    pub fn fire_and_forget_with_id<F, Fut>(id: EffectId, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Effect::run_with_id(id, move || async move {
            operation().await;
            None
        })
    }

    /// Starts a long-lived operation under `id`.
    pub fn stream<F, Fut>(id: EffectId, operation: F) -> Self
    where
        F: FnOnce(ActionSender<A>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Effect::Stream {
            id,
            operation: Box::new(move |sender| Box::pin(operation(sender))),
        }
    }

    /// Combines effects, flattening nested merges and dropping `None`s.
    pub fn merge(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let mut flat = Vec::new();
        for effect in effects {
            match effect {
                Effect::None => {}
                Effect::Merge(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Effect::None,
            1 => flat.pop().unwrap_or(Effect::None),
            _ => Effect::Merge(flat),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// Flattens the effect into the list of ids it would touch, in
    /// interpretation order.
    pub fn shape(&self) -> Vec<EffectShape> {
        let mut shapes = Vec::new();
        self.collect_shape(&mut shapes);
        shapes
    }

    fn collect_shape(&self, shapes: &mut Vec<EffectShape>) {
        match self {
            Effect::None => {}
            Effect::Task { id, .. } => shapes.push(EffectShape::Task(*id)),
            Effect::Stream { id, .. } => shapes.push(EffectShape::Stream(*id)),
            Effect::Merge(effects) => {
                for effect in effects {
                    effect.collect_shape(shapes);
                }
            }
            Effect::Cancel(id) => shapes.push(EffectShape::Cancel(*id)),
        }
    }

    /// True if the effect touches `id` in any way.
    pub fn touches(&self, id: EffectId) -> bool {
        self.shape().iter().any(|shape| match shape {
            EffectShape::Task(i) | EffectShape::Stream(i) | EffectShape::Cancel(i) => *i == id,
        })
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::None => write!(f, "None"),
            Effect::Task { id, .. } => write!(f, "Task({})", id),
            Effect::Stream { id, .. } => write!(f, "Stream({})", id),
            Effect::Merge(effects) => f.debug_list().entries(effects).finish(),
            Effect::Cancel(id) => write!(f, "Cancel({})", id),
        }
    }
}

/// Receiving side of the store, as seen from a running stream.
pub(crate) trait Dispatch<A>: Send + Sync {
    /// Sends `action` on behalf of the unit registered under `id` with the
    /// given generation. Returns false if that registration is gone.
    fn dispatch_from(&self, id: EffectId, generation: u64, action: A) -> bool;
}

/// Handle given to a `Stream` operation for emitting actions.
///
/// Holds only a weak reference to the store, so a stream never keeps its
/// store alive. Once the stream has been cancelled or replaced, every send is
/// discarded.
pub struct ActionSender<A> {
    target: Weak<dyn Dispatch<A>>,
    id: EffectId,
    generation: u64,
}

impl<A> ActionSender<A> {
    pub(crate) fn new(target: Weak<dyn Dispatch<A>>, id: EffectId, generation: u64) -> Self {
        Self { target, id, generation }
    }

    /// Submits an action to the store. Returns false if the stream was
    /// cancelled or the store is gone, in which case the action was dropped.
    pub fn send(&self, action: A) -> bool {
        match self.target.upgrade() {
            Some(target) => target.dispatch_from(self.id, self.generation, action),
            None => false,
        }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }
}

impl<A> Clone for ActionSender<A> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            id: self.id,
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE: EffectId = EffectId::Named("test.engine");

    #[test]
    fn merge_flattens_and_drops_none() {
        let effect: Effect<u8> = Effect::merge([
            Effect::None,
            Effect::merge([Effect::Cancel(ENGINE), Effect::run_with_id(ENGINE, || async { None })]),
            Effect::None,
        ]);
        assert_eq!(
            effect.shape(),
            vec![EffectShape::Cancel(ENGINE), EffectShape::Task(ENGINE)]
        );
    }

    #[test]
    fn merge_of_nothing_is_none() {
        let effect: Effect<u8> = Effect::merge([Effect::None, Effect::None]);
        assert!(effect.is_none());
    }

    #[test]
    fn anonymous_ids_are_distinct() {
        let a = EffectId::unique();
        let b = EffectId::unique();
        assert_ne!(a, b);
        assert!(a.is_anonymous());
        assert!(!ENGINE.is_anonymous());
    }
}
