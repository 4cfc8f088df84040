#![forbid(unsafe_code)]

//! Explicitly driven storage operations.
//!
//! [`StorageOps`] is what [`Engine::create_storage`](crate::Engine::create_storage)
//! hands out: the binding pipeline without a source or target. Callers run
//! `get`, `set` and `remove` themselves and receive a [`Pending`] that
//! resolves to the value or to the [`Fail`] record. The same records are
//! also routed to the configured sinks.

use std::fmt;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::Value;
use crate::binding::Binding;
use crate::error::StorageError;
use crate::pending::Pending;
use crate::record::{Fail, Operation};

/// Get, set and remove for one key.
///
/// Cloning yields another handle to the same operations.
pub struct StorageOps<T: Value, C: Value = ()> {
    binding: Rc<Binding<T, C>>,
}

impl<T: Value, C: Value> Clone for StorageOps<T, C> {
    fn clone(&self) -> Self {
        Self {
            binding: Rc::clone(&self.binding),
        }
    }
}

impl<T: Value, C: Value> StorageOps<T, C> {
    pub(crate) fn new(binding: Rc<Binding<T, C>>) -> Self {
        Self { binding }
    }

    /// Read the value. `ctx`, when given, becomes the current context.
    pub fn get(&self, ctx: Option<C>) -> Pending<Option<T>, Fail<T>> {
        self.enter(ctx);
        let (tx, rx) = oneshot::channel();
        self.binding.get(None, Some(tx));
        self.wait(Operation::Get, rx)
    }

    /// Write the value. `ctx`, when given, becomes the current context.
    pub fn set(&self, value: T, ctx: Option<C>) -> Pending<(), Fail<T>> {
        self.enter(ctx);
        let (tx, rx) = oneshot::channel();
        self.binding.set(value, Some(tx));
        self.wait(Operation::Set, rx)
    }

    /// Delete the value. Succeeds without a backend call when the adapter
    /// cannot remove.
    pub fn remove(&self, ctx: Option<C>) -> Pending<(), Fail<T>> {
        self.enter(ctx);
        let (tx, rx) = oneshot::channel();
        self.binding.remove(Some(tx));
        self.wait(Operation::Remove, rx)
    }

    /// Last value known for the key in this area.
    #[must_use]
    pub fn cached(&self) -> Option<T> {
        self.binding.cached()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.binding.key()
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        self.binding.storage_key()
    }

    /// Whether both handles share one set of operations.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.binding, &other.binding)
    }

    fn enter(&self, ctx: Option<C>) {
        if let Some(ctx) = ctx {
            self.binding.set_context(ctx);
        }
    }

    fn wait<R: 'static>(
        &self,
        operation: Operation,
        mut rx: oneshot::Receiver<Result<R, Fail<T>>>,
    ) -> Pending<R, Fail<T>> {
        let abandoned = Fail {
            key: self.binding.key().to_owned(),
            key_prefix: self.binding.key_prefix().to_owned(),
            operation,
            error: StorageError::Disposed,
            value: None,
        };
        match rx.try_recv() {
            Ok(Some(result)) => Pending::Ready(result),
            Ok(None) => Pending::later(async move { rx.await.unwrap_or(Err(abandoned)) }),
            Err(oneshot::Canceled) => Pending::err(abandoned),
        }
    }
}

impl<T: Value, C: Value> fmt::Debug for StorageOps<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOps")
            .field("storage_key", &self.binding.storage_key())
            .field("area", self.binding.area())
            .finish()
    }
}
