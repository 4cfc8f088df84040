#![forbid(unsafe_code)]

//! Runtime state of one binding.
//!
//! A [`Binding`] owns the adapter handle, the current context and a
//! [`Region`] with every internal subscription. It runs the guarded
//! get/set/remove pipeline and reports each outcome to its sinks.
//!
//! # Data flow
//!
//! ```text
//! source ──trigger──▶ propose ──(differs from cell)──▶ handle.set ──▶ cell
//! push/pickup/bind ──▶ handle.get ──▶ validate ──▶ cell ──▶ target
//! cell (written by a sibling) ──▶ validate ──▶ target
//! ```
//!
//! # Invariants
//!
//! 1. A value equal to the cell is never written back to storage.
//! 2. `None` never reaches a target.
//! 3. After [`Binding::dispose`], no callback, push or settled future has an
//!    effect on this binding.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::task::{LocalSpawn, LocalSpawnExt};
use tether_reactive::{Event, Observable, Region};

use crate::Value;
use crate::adapter::{PushTarget, Raw, StorageAdapter, StorageHandle, Updater};
use crate::area::KeyArea;
use crate::config::{ContextSource, Source, Target};
use crate::error::StorageError;
use crate::pending::Pending;
use crate::record::{Done, Fail, Operation, Sinks};
use crate::validate::{Contract, validate};

/// Channel an explicit caller waits on.
pub(crate) type Reply<R, T> = oneshot::Sender<Result<R, Fail<T>>>;

/// Everything needed to open a binding.
pub(crate) struct Setup<T, C> {
    pub(crate) adapter: Rc<dyn StorageAdapter<T, C>>,
    pub(crate) area: KeyArea,
    pub(crate) key: String,
    pub(crate) key_prefix: String,
    pub(crate) cell: Observable<Option<T>>,
    pub(crate) context: Option<C>,
    pub(crate) target: Option<Target<T>>,
    /// Store whose value fills an empty cell when the backend has nothing.
    pub(crate) seed: Option<Observable<T>>,
    pub(crate) contract: Option<Contract<T>>,
    pub(crate) sinks: Sinks<T>,
    pub(crate) spawner: Option<Rc<dyn LocalSpawn>>,
}

/// Reactive inputs wired into a binding.
pub(crate) struct Triggers<T, C> {
    pub(crate) source: Option<Source<T>>,
    pub(crate) clock: Option<Event<()>>,
    pub(crate) context: Option<ContextSource<C>>,
    pub(crate) pickup: Option<Event<C>>,
    pub(crate) initial_get: bool,
}

pub(crate) struct Binding<T: Value, C: Value> {
    key: String,
    key_prefix: String,
    storage_key: String,
    area: KeyArea,
    handle: Box<dyn StorageHandle<T, C>>,
    cell: Observable<Option<T>>,
    context: RefCell<Option<C>>,
    target: Option<Target<T>>,
    seed: Option<Observable<T>>,
    contract: Option<Contract<T>>,
    sinks: Sinks<T>,
    spawner: Option<Rc<dyn LocalSpawn>>,
    active: Cell<bool>,
    /// Set while this binding writes a retrieved value into the cell.
    absorbing: Cell<bool>,
    region: RefCell<Region>,
}

impl<T: Value, C: Value> Binding<T, C> {
    pub(crate) fn open(setup: Setup<T, C>) -> Rc<Self> {
        let Setup {
            adapter,
            area,
            key,
            key_prefix,
            cell,
            context,
            target,
            seed,
            contract,
            sinks,
            spawner,
        } = setup;
        let storage_key = format!("{key_prefix}{key}");
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let push: Weak<dyn PushTarget<T>> = weak.clone();
            let handle = adapter.open(&storage_key, Updater::new(push));
            Self {
                key,
                key_prefix,
                storage_key,
                area,
                handle,
                cell,
                context: RefCell::new(context),
                target,
                seed,
                contract,
                sinks,
                spawner,
                active: Cell::new(true),
                absorbing: Cell::new(false),
                region: RefCell::new(Region::new()),
            }
        })
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub(crate) fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub(crate) fn area(&self) -> &KeyArea {
        &self.area
    }

    pub(crate) fn cached(&self) -> Option<T> {
        self.cell.get()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn set_context(&self, context: C) {
        *self.context.borrow_mut() = Some(context);
    }

    /// Connect the reactive inputs and run the initial get if requested.
    pub(crate) fn wire(self: &Rc<Self>, triggers: Triggers<T, C>) {
        let Triggers {
            source,
            clock,
            context,
            pickup,
            initial_get,
        } = triggers;
        {
            let mut region = self.region.borrow_mut();

            if self.target.is_some() {
                region.subscribe(
                    &self.cell,
                    self.hook(|binding, value: &Option<T>| {
                        if binding.absorbing.get() {
                            return;
                        }
                        if let Some(value) = value {
                            binding.deliver(value.clone());
                        }
                    }),
                );
            }

            match context {
                Some(ContextSource::Store(store)) => {
                    region.subscribe(&store, self.hook(|binding, ctx: &C| binding.set_context(ctx.clone())));
                }
                Some(ContextSource::Event(event)) => {
                    region.watch(&event, self.hook(|binding, ctx: &C| binding.set_context(ctx.clone())));
                }
                None => {}
            }

            match (source, clock) {
                (Some(Source::Store(store)), None) => {
                    region.subscribe(&store, self.hook(|binding, value: &T| binding.propose(value.clone())));
                }
                (Some(Source::Event(event)), None) => {
                    region.watch(&event, self.hook(|binding, value: &T| binding.propose(value.clone())));
                }
                (Some(Source::Store(store)), Some(clock)) => {
                    region.watch(
                        &clock,
                        self.hook(move |binding, _: &()| binding.propose(store.get())),
                    );
                }
                (Some(Source::Event(event)), Some(clock)) => {
                    let latest = Rc::new(RefCell::new(None::<T>));
                    let last = Rc::clone(&latest);
                    region.watch(&event, move |value: &T| *last.borrow_mut() = Some(value.clone()));
                    region.watch(
                        &clock,
                        self.hook(move |binding, _: &()| {
                            let value = latest.borrow().clone();
                            if let Some(value) = value {
                                binding.propose(value);
                            }
                        }),
                    );
                }
                (None, _) => {}
            }

            if let Some(pickup) = &pickup {
                region.watch(
                    pickup,
                    self.hook(|binding, ctx: &C| {
                        binding.set_context(ctx.clone());
                        binding.get(None, None);
                    }),
                );
            }
        }

        tracing::debug!(
            key = %self.storage_key,
            area = %self.area,
            pickup = pickup.is_some(),
            "binding active"
        );

        if initial_get && pickup.is_none() {
            self.get(None, None);
        }
    }

    /// Wrap a callback so it only runs while the binding is alive and active.
    fn hook<A: ?Sized + 'static>(
        self: &Rc<Self>,
        f: impl Fn(&Rc<Self>, &A) + 'static,
    ) -> impl Fn(&A) + 'static {
        let weak = Rc::downgrade(self);
        move |arg: &A| {
            if let Some(binding) = weak.upgrade() {
                if binding.is_active() {
                    f(&binding, arg);
                }
            }
        }
    }

    /// Run `then` with the settled result, now or on the executor.
    fn settle<R: 'static>(
        self: &Rc<Self>,
        pending: Pending<R>,
        then: impl FnOnce(&Rc<Self>, Result<R, StorageError>) + 'static,
    ) {
        let future = match pending {
            Pending::Ready(result) => return then(self, result),
            Pending::Later(future) => future,
        };
        let Some(spawner) = self.spawner.as_ref() else {
            return then(self, Err(StorageError::NoExecutor));
        };
        if let Err(err) = spawner.status_local() {
            tracing::warn!(key = %self.storage_key, error = %err, "executor unavailable");
            return then(self, Err(StorageError::Spawn(err.to_string())));
        }
        let weak = Rc::downgrade(self);
        let task = async move {
            let result = future.await;
            if let Some(binding) = weak.upgrade() {
                if binding.is_active() {
                    then(&binding, result);
                }
            }
        };
        if let Err(err) = spawner.spawn_local(task) {
            tracing::warn!(key = %self.storage_key, error = %err, "continuation dropped");
        }
    }

    /// Retrieve the value, validate it and publish it.
    pub(crate) fn get(self: &Rc<Self>, raw: Option<Raw<T>>, reply: Option<Reply<Option<T>, T>>) {
        tracing::trace!(key = %self.storage_key, operation = %Operation::Get, "storage call");
        let shown = raw.as_ref().and_then(Raw::value).cloned();
        let pushed = raw.is_some();
        let pending = {
            let ctx = self.context.borrow();
            self.handle.get(raw, ctx.as_ref())
        };
        self.settle(pending, move |binding, result| match result {
            Ok(fresh) => binding.absorb(fresh, pushed, reply),
            Err(error) => binding.report_fail(Operation::Get, error, shown, reply),
        });
    }

    /// Publish a retrieved value. A pushed `None` means the key was cleared
    /// elsewhere; a polled `None` falls back to the cell, which an empty cell
    /// takes from the seed store.
    fn absorb(self: &Rc<Self>, fresh: Option<T>, pushed: bool, reply: Option<Reply<Option<T>, T>>) {
        if fresh.is_none() && pushed {
            self.write_cell(None);
            self.report_done(Operation::Get, None);
            if let Some(reply) = reply {
                let _ = reply.send(Ok(None));
            }
            return;
        }
        let from_storage = fresh.is_some();
        let candidate = fresh.or_else(|| self.cell.get());
        if candidate.is_none() {
            if let Some(seed) = &self.seed {
                self.write_cell(Some(seed.get()));
            }
        }
        let shown = candidate.clone();
        let pending = validate(candidate, self.contract.as_ref());
        self.settle(pending, move |binding, result| match result {
            Ok(value) => {
                if let Some(value) = &value {
                    if from_storage {
                        binding.write_cell(Some(value.clone()));
                    }
                    if let Some(target) = &binding.target {
                        target.apply(value.clone());
                    }
                }
                binding.report_done(Operation::Get, value.clone());
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(value));
                }
            }
            Err(error) => binding.report_fail(Operation::Validate, error, shown, reply),
        });
    }

    /// Write the cell without echoing the change into our own target.
    fn write_cell(&self, value: Option<T>) {
        self.absorbing.set(true);
        self.cell.set(value);
        self.absorbing.set(false);
    }

    /// Push a value another binding placed in the cell into our target.
    fn deliver(self: &Rc<Self>, value: T) {
        let shown = Some(value.clone());
        let pending = validate(Some(value), self.contract.as_ref());
        self.settle(pending, move |binding, result| match result {
            Ok(Some(value)) => {
                if let Some(target) = &binding.target {
                    target.apply(value);
                }
            }
            Ok(None) => {}
            Err(error) => binding.report_fail::<()>(Operation::Validate, error, shown, None),
        });
    }

    /// Write `value` unless the cell already holds it.
    fn propose(self: &Rc<Self>, value: T) {
        let unchanged = self.cell.with(|cached| cached.as_ref() == Some(&value));
        if unchanged {
            return;
        }
        self.set(value, None);
    }

    pub(crate) fn set(self: &Rc<Self>, value: T, reply: Option<Reply<(), T>>) {
        tracing::trace!(key = %self.storage_key, operation = %Operation::Set, "storage call");
        let pending = {
            let ctx = self.context.borrow();
            self.handle.set(&value, ctx.as_ref())
        };
        self.settle(pending, move |binding, result| match result {
            Ok(()) => {
                binding.cell.set(Some(value.clone()));
                binding.report_done(Operation::Set, Some(value));
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(error) => binding.report_fail(Operation::Set, error, Some(value), reply),
        });
    }

    pub(crate) fn remove(self: &Rc<Self>, reply: Option<Reply<(), T>>) {
        tracing::trace!(key = %self.storage_key, operation = %Operation::Remove, "storage call");
        let pending = {
            let ctx = self.context.borrow();
            self.handle.remove(ctx.as_ref())
        }
        .unwrap_or_else(|| Pending::ok(()));
        self.settle(pending, move |binding, result| match result {
            Ok(()) => {
                binding.cell.set(None);
                binding.report_done(Operation::Remove, None);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(error) => binding.report_fail(Operation::Remove, error, None, reply),
        });
    }

    fn report_done(&self, operation: Operation, value: Option<T>) {
        self.sinks.done(Done {
            key: self.key.clone(),
            key_prefix: self.key_prefix.clone(),
            operation,
            value,
        });
    }

    fn report_fail<R>(
        &self,
        operation: Operation,
        error: StorageError,
        value: Option<T>,
        reply: Option<Reply<R, T>>,
    ) {
        let record = Fail {
            key: self.key.clone(),
            key_prefix: self.key_prefix.clone(),
            operation,
            error,
            value,
        };
        if let Some(reply) = reply {
            let _ = reply.send(Err(record.clone()));
        }
        self.sinks.fail(record);
    }

    /// Stop reacting and release the adapter handle. Idempotent.
    pub(crate) fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.region.borrow_mut().clear();
        self.handle.dispose();
        tracing::debug!(key = %self.storage_key, area = %self.area, "binding disposed");
    }
}

impl<T: Value, C: Value> PushTarget<T> for Binding<T, C> {
    fn on_push(self: Rc<Self>, pushed: Result<Raw<T>, StorageError>) {
        if !self.is_active() {
            return;
        }
        match pushed {
            Ok(raw) => self.get(Some(raw), None),
            // The pushed payload stays private to the adapter.
            Err(error) => self.report_fail::<()>(Operation::Get, error, None, None),
        }
    }
}

/// A live binding. Dropping it unbinds.
#[must_use = "dropping the binding unbinds it immediately"]
pub struct Persisted<T: Value, C: Value = ()> {
    binding: Rc<Binding<T, C>>,
}

impl<T: Value, C: Value> Persisted<T, C> {
    pub(crate) fn new(binding: Rc<Binding<T, C>>) -> Self {
        Self { binding }
    }

    /// Tear the binding down now.
    pub fn unbind(self) {
        drop(self);
    }

    /// Whether the binding still reacts.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.binding.is_active()
    }

    /// Key without prefix.
    #[must_use]
    pub fn key(&self) -> &str {
        self.binding.key()
    }

    #[must_use]
    pub fn key_prefix(&self) -> &str {
        self.binding.key_prefix()
    }

    /// Key as seen by the adapter.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        self.binding.storage_key()
    }

    #[must_use]
    pub fn key_area(&self) -> &KeyArea {
        self.binding.area()
    }

    /// Last value known for the key in this binding's area.
    #[must_use]
    pub fn cached(&self) -> Option<T> {
        self.binding.cached()
    }
}

impl<T: Value, C: Value> Drop for Persisted<T, C> {
    fn drop(&mut self) {
        self.binding.dispose();
    }
}

impl<T: Value, C: Value> fmt::Debug for Persisted<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("storage_key", &self.binding.storage_key)
            .field("area", &self.binding.area)
            .field("active", &self.binding.is_active())
            .finish()
    }
}
