#![forbid(unsafe_code)]

//! The adapter contract.
//!
//! A backend is a [`StorageAdapter`]: given a storage key and an [`Updater`],
//! it opens a [`StorageHandle`] exposing `get`/`set` and optionally `remove`
//! and `dispose`. Adapters that need the binding's configuration before they
//! can exist are [`AdapterFactory`]s; [`AdapterSource`] tags which one a
//! caller supplied.
//!
//! # Push updates
//!
//! Backends that observe out-of-band changes (another process wrote the
//! file, a peer posted a message) call [`Updater::push`]. The engine runs the
//! pushed payload through the handle's `get` with the context that is
//! current at push time. Failures observed out of band go through
//! [`Updater::fail`]; they are reported without exposing any payload.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::area::KeyArea;
use crate::error::StorageError;
use crate::pending::Pending;

/// Payload handed back to [`StorageHandle::get`] after a push.
#[derive(Clone, Debug, PartialEq)]
pub enum Raw<T> {
    /// The backend holds this value.
    Value(T),
    /// The backend no longer holds a value for the key.
    Cleared,
}

impl<T> Raw<T> {
    /// The pushed value, if any.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Cleared => None,
        }
    }

    /// Borrow the pushed value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Cleared => None,
        }
    }
}

impl<T> From<Option<T>> for Raw<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Cleared, Self::Value)
    }
}

/// Receiver side of push updates, implemented by the binding.
pub(crate) trait PushTarget<T> {
    fn on_push(self: Rc<Self>, pushed: Result<Raw<T>, StorageError>);
}

/// Handle a backend uses to notify its binding of out-of-band changes.
///
/// Holds only a weak reference: once the binding is disposed, pushes are
/// silently dropped.
pub struct Updater<T> {
    target: Option<Weak<dyn PushTarget<T>>>,
}

impl<T> Clone for Updater<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: 'static> Updater<T> {
    pub(crate) fn new(target: Weak<dyn PushTarget<T>>) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// An updater connected to nothing. Useful to exercise adapters alone.
    #[must_use]
    pub fn detached() -> Self {
        Self { target: None }
    }

    /// Report a new backend value. Returns whether a live binding received it.
    pub fn push(&self, raw: Raw<T>) -> bool {
        self.deliver(Ok(raw))
    }

    /// Report a failure observed outside of any engine call.
    pub fn fail(&self, error: StorageError) -> bool {
        self.deliver(Err(error))
    }

    /// Whether the binding behind this updater is still alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0)
    }

    fn deliver(&self, pushed: Result<Raw<T>, StorageError>) -> bool {
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(target) => {
                target.on_push(pushed);
                true
            }
            None => false,
        }
    }
}

impl<T> fmt::Debug for Updater<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connected = self
            .target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0);
        f.debug_struct("Updater")
            .field("connected", &connected)
            .finish()
    }
}

/// Per-key operations of a backend.
///
/// Every method receives the binding's current context, if one is
/// configured. Synchronous backends return [`Pending::Ready`].
pub trait StorageHandle<T, C = ()> {
    /// Read the value for the key.
    ///
    /// `raw` is set when the call was caused by a push update; the handle
    /// decides how to turn it into a value (usually it is returned as is).
    fn get(&self, raw: Option<Raw<T>>, ctx: Option<&C>) -> Pending<Option<T>>;

    /// Write the value for the key.
    fn set(&self, value: &T, ctx: Option<&C>) -> Pending<()>;

    /// Delete the value for the key. `None` means removal is not supported.
    fn remove(&self, ctx: Option<&C>) -> Option<Pending<()>> {
        let _ = ctx;
        None
    }

    /// Release backend resources. Buffered writes must be flushed here.
    fn dispose(&self) {}
}

/// A storage backend.
pub trait StorageAdapter<T, C = ()> {
    /// Open the handle for `key`.
    fn open(&self, key: &str, updater: Updater<T>) -> Box<dyn StorageHandle<T, C>>;

    /// Identity used to group bindings in the area cache.
    fn key_area(&self) -> KeyArea;

    /// Whether this adapter stores nothing. Combinators prefer non-noop
    /// adapters.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Configuration a factory sees when it is instantiated for a binding.
#[derive(Clone, Debug, PartialEq)]
pub struct FactoryConfig<T> {
    /// Resolved key (without prefix), when known.
    pub key: Option<String>,
    /// Key prefix in effect for the binding.
    pub key_prefix: String,
    /// Default value of the bound store, when the binding has one.
    pub default_value: Option<T>,
    /// Free-form factory parameters.
    pub params: serde_json::Value,
}

impl<T> Default for FactoryConfig<T> {
    fn default() -> Self {
        Self {
            key: None,
            key_prefix: String::new(),
            default_value: None,
            params: serde_json::Value::Null,
        }
    }
}

/// Builds an adapter from binding configuration.
pub trait AdapterFactory<T, C = ()> {
    fn create(&self, config: &FactoryConfig<T>) -> Rc<dyn StorageAdapter<T, C>>;
}

impl<T, C, F> AdapterFactory<T, C> for F
where
    F: Fn(&FactoryConfig<T>) -> Rc<dyn StorageAdapter<T, C>>,
{
    fn create(&self, config: &FactoryConfig<T>) -> Rc<dyn StorageAdapter<T, C>> {
        self(config)
    }
}

/// Either a ready adapter or a factory that builds one.
pub enum AdapterSource<T, C = ()> {
    Adapter(Rc<dyn StorageAdapter<T, C>>),
    Factory(Rc<dyn AdapterFactory<T, C>>),
}

impl<T, C> Clone for AdapterSource<T, C> {
    fn clone(&self) -> Self {
        match self {
            Self::Adapter(adapter) => Self::Adapter(Rc::clone(adapter)),
            Self::Factory(factory) => Self::Factory(Rc::clone(factory)),
        }
    }
}

impl<T: 'static, C: 'static> AdapterSource<T, C> {
    /// Tag a concrete adapter.
    pub fn adapter(adapter: impl StorageAdapter<T, C> + 'static) -> Self {
        Self::Adapter(Rc::new(adapter))
    }

    /// Tag a factory.
    pub fn factory(factory: impl AdapterFactory<T, C> + 'static) -> Self {
        Self::Factory(Rc::new(factory))
    }

    /// Whether this source must be instantiated first.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// Produce the adapter, instantiating a factory with `config`.
    pub fn resolve(&self, config: &FactoryConfig<T>) -> Rc<dyn StorageAdapter<T, C>> {
        match self {
            Self::Adapter(adapter) => Rc::clone(adapter),
            Self::Factory(factory) => factory.create(config),
        }
    }
}

impl<T, C> From<Rc<dyn StorageAdapter<T, C>>> for AdapterSource<T, C> {
    fn from(adapter: Rc<dyn StorageAdapter<T, C>>) -> Self {
        Self::Adapter(adapter)
    }
}

impl<T, C> fmt::Debug for AdapterSource<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adapter(adapter) => f
                .debug_struct("Adapter")
                .field("key_area", &adapter.key_area())
                .field("noop", &adapter.is_noop())
                .finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}
