//! # Store Module
//!
//! The single authoritative owner of one feature's state.
//!
//! [`Store::send`] is the only way to mutate state. It runs the feature's
//! [`Reducer`] under the store lock, publishes the new state to observers and
//! interprets the returned [`Effect`] by spawning or aborting tokio tasks.
//! Actions produced by those tasks come back through the same serialized path,
//! so two reducer calls never interleave even though the tasks they start run
//! concurrently.
//!
//! ## Task registry
//! Every running task or stream is registered under its [`EffectId`] together
//! with a generation number. Replacing or cancelling a registration aborts the
//! old task, and any action it still tries to submit is discarded because its
//! generation no longer matches.

use crate::effect::{ActionSender, Dispatch, Effect, EffectId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// A pure state transition for one feature.
///
/// Implementations hold their capability handles (engines, settings) and only
/// describe I/O through the returned effect.
pub trait Reducer: Send + Sync + 'static {
    type State: Clone + PartialEq + Send + Sync + 'static;
    type Action: fmt::Debug + Send + 'static;

    /// Short name used in log lines.
    const NAME: &'static str;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Effect<Self::Action>;
}

struct Registration {
    generation: u64,
    handle: AbortHandle,
}

struct Core<S> {
    state: S,
    tasks: HashMap<EffectId, Registration>,
    next_generation: u64,
}

impl<S> Core<S> {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn is_current(&self, id: EffectId, generation: u64) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|registration| registration.generation == generation)
    }
}

struct StoreInner<R: Reducer> {
    reducer: R,
    core: Mutex<Core<R::State>>,
    runtime: Handle,
    snapshots: watch::Sender<R::State>,
    self_ref: Weak<StoreInner<R>>,
}

/// Cloneable handle to a feature store.
pub struct Store<R: Reducer> {
    inner: Arc<StoreInner<R>>,
}

impl<R: Reducer> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Reducer> Store<R> {
    /// Creates a store that spawns its effects on the current tokio runtime.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn new(initial: R::State, reducer: R) -> Self {
        Self::with_runtime(Handle::current(), initial, reducer)
    }

    /// Creates a store that spawns its effects on `runtime`.
    pub fn with_runtime(runtime: Handle, initial: R::State, reducer: R) -> Self {
        let (snapshots, _) = watch::channel(initial.clone());
        let inner = Arc::new_cyclic(|self_ref| StoreInner {
            reducer,
            core: Mutex::new(Core {
                state: initial,
                tasks: HashMap::new(),
                next_generation: 0,
            }),
            runtime,
            snapshots,
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// Reduces `action` into the state and interprets the resulting effect.
    pub fn send(&self, action: R::Action) {
        let mut core = self.inner.core.lock();
        self.inner.apply(&mut core, action);
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> R::State {
        self.inner.core.lock().state.clone()
    }

    /// Runs `f` against the current state without cloning it.
    pub fn with_state<T>(&self, f: impl FnOnce(&R::State) -> T) -> T {
        f(&self.inner.core.lock().state)
    }

    /// Observes state changes. The receiver always holds the latest state.
    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.inner.snapshots.subscribe()
    }

    /// True while a task or stream is registered under `id`.
    pub fn is_running(&self, id: EffectId) -> bool {
        self.inner.core.lock().tasks.contains_key(&id)
    }

    /// Number of registered tasks and streams.
    pub fn running_effects(&self) -> usize {
        self.inner.core.lock().tasks.len()
    }

    pub fn reducer(&self) -> &R {
        &self.inner.reducer
    }
}

impl<R: Reducer> StoreInner<R> {
    fn apply(&self, core: &mut Core<R::State>, action: R::Action) {
        log::trace!("[{}] action {:?}", R::NAME, action);
        let effect = self.reducer.reduce(&mut core.state, action);
        let state = &core.state;
        self.snapshots.send_if_modified(|snapshot| {
            if snapshot != state {
                *snapshot = state.clone();
                true
            } else {
                false
            }
        });
        self.interpret(core, effect);
    }

    fn interpret(&self, core: &mut Core<R::State>, effect: Effect<R::Action>) {
        match effect {
            Effect::None => {}
            Effect::Task { id, operation } => {
                self.cancel(core, id);
                let generation = core.next_generation();
                let store = self.self_ref.clone();
                let handle = self.runtime.spawn(async move {
                    let result = operation().await;
                    if let Some(store) = store.upgrade() {
                        store.complete_task(id, generation, result);
                    }
                });
                log::debug!("[{}] started task {}", R::NAME, id);
                core.tasks.insert(
                    id,
                    Registration {
                        generation,
                        handle: handle.abort_handle(),
                    },
                );
            }
            Effect::Stream { id, operation } => {
                self.cancel(core, id);
                let generation = core.next_generation();
                let target: Weak<dyn Dispatch<R::Action>> = self.self_ref.clone();
                let sender = ActionSender::new(target, id, generation);
                let store = self.self_ref.clone();
                let handle = self.runtime.spawn(async move {
                    operation(sender).await;
                    if let Some(store) = store.upgrade() {
                        store.finish_stream(id, generation);
                    }
                });
                log::debug!("[{}] started stream {}", R::NAME, id);
                core.tasks.insert(
                    id,
                    Registration {
                        generation,
                        handle: handle.abort_handle(),
                    },
                );
            }
            Effect::Merge(effects) => {
                for effect in effects {
                    self.interpret(core, effect);
                }
            }
            Effect::Cancel(id) => self.cancel(core, id),
        }
    }

    fn cancel(&self, core: &mut Core<R::State>, id: EffectId) {
        if let Some(registration) = core.tasks.remove(&id) {
            log::debug!("[{}] cancelled {}", R::NAME, id);
            registration.handle.abort();
        }
    }

    fn complete_task(&self, id: EffectId, generation: u64, result: Option<R::Action>) {
        let mut core = self.core.lock();
        if !core.is_current(id, generation) {
            if result.is_some() {
                log::debug!("[{}] dropped result of cancelled task {}", R::NAME, id);
            }
            return;
        }
        core.tasks.remove(&id);
        if let Some(action) = result {
            self.apply(&mut core, action);
        }
    }

    fn finish_stream(&self, id: EffectId, generation: u64) {
        let mut core = self.core.lock();
        if core.is_current(id, generation) {
            core.tasks.remove(&id);
            log::debug!("[{}] stream {} finished", R::NAME, id);
        }
    }
}

impl<R: Reducer> Dispatch<R::Action> for StoreInner<R> {
    fn dispatch_from(&self, id: EffectId, generation: u64, action: R::Action) -> bool {
        let mut core = self.core.lock();
        if !core.is_current(id, generation) {
            log::debug!("[{}] dropped {:?} from cancelled stream {}", R::NAME, action, id);
            return false;
        }
        self.apply(&mut core, action);
        true
    }
}

impl<R: Reducer> Drop for StoreInner<R> {
    fn drop(&mut self) {
        for (_, registration) in self.core.get_mut().tasks.drain() {
            registration.handle.abort();
        }
    }
}
