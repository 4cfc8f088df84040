#![forbid(unsafe_code)]

//! Binding configuration.
//!
//! A [`PersistConfig`] collects everything one binding needs. Fragments can
//! be combined with [`PersistConfig::merge`]; later fragments win field by
//! field. A bare string converts into a fragment carrying only the key.

use std::fmt;
use std::rc::Rc;

use tether_reactive::{Event, Observable};

use crate::Value;
use crate::adapter::{AdapterFactory, AdapterSource, StorageAdapter};
use crate::record::{Done, Fail, Finally};
use crate::validate::Contract;

/// Where values to persist come from.
pub enum Source<T> {
    Store(Observable<T>),
    Event(Event<T>),
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Store(store) => Self::Store(store.clone()),
            Self::Event(event) => Self::Event(event.clone()),
        }
    }
}

impl<T: Value> Source<T> {
    /// Declared name of the underlying primitive.
    #[must_use]
    pub fn name(&self) -> Option<Rc<str>> {
        match self {
            Self::Store(store) => store.name(),
            Self::Event(event) => event.name(),
        }
    }

    /// Whether this source and `target` are the same event.
    #[must_use]
    pub fn same_as(&self, target: &Target<T>) -> bool {
        match (self, target) {
            (Self::Event(source), Target::Event(target)) => source.ptr_eq(target),
            _ => false,
        }
    }
}

impl<T> From<Observable<T>> for Source<T> {
    fn from(store: Observable<T>) -> Self {
        Self::Store(store)
    }
}

impl<T> From<Event<T>> for Source<T> {
    fn from(event: Event<T>) -> Self {
        Self::Event(event)
    }
}

/// Where retrieved values are delivered.
pub enum Target<T> {
    Store(Observable<T>),
    Event(Event<T>),
}

impl<T> Clone for Target<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Store(store) => Self::Store(store.clone()),
            Self::Event(event) => Self::Event(event.clone()),
        }
    }
}

impl<T: Value> Target<T> {
    /// Hand `value` to the target.
    pub fn apply(&self, value: T) {
        match self {
            Self::Store(store) => store.set(value),
            Self::Event(event) => event.fire(value),
        }
    }
}

impl<T> From<Observable<T>> for Target<T> {
    fn from(store: Observable<T>) -> Self {
        Self::Store(store)
    }
}

impl<T> From<Event<T>> for Target<T> {
    fn from(event: Event<T>) -> Self {
        Self::Event(event)
    }
}

/// Where the binding's context comes from.
pub enum ContextSource<C> {
    /// Seeded with the store's current value, then follows its changes.
    Store(Observable<C>),
    /// Each payload becomes the new context.
    Event(Event<C>),
}

impl<C> Clone for ContextSource<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Store(store) => Self::Store(store.clone()),
            Self::Event(event) => Self::Event(event.clone()),
        }
    }
}

impl<C> From<Observable<C>> for ContextSource<C> {
    fn from(store: Observable<C>) -> Self {
        Self::Store(store)
    }
}

impl<C> From<Event<C>> for ContextSource<C> {
    fn from(event: Event<C>) -> Self {
        Self::Event(event)
    }
}

/// Configuration of one binding.
///
/// `store` is shorthand for using one observable as both source and target.
pub struct PersistConfig<T, C = ()> {
    pub adapter: Option<AdapterSource<T, C>>,
    pub store: Option<Observable<T>>,
    pub source: Option<Source<T>>,
    pub target: Option<Target<T>>,
    /// Fires to request a write of the source's latest value.
    pub clock: Option<Event<()>>,
    pub key: Option<String>,
    pub key_prefix: Option<String>,
    pub context: Option<ContextSource<C>>,
    /// Gates retrieval: no initial get, one get per firing.
    pub pickup: Option<Event<C>>,
    pub contract: Option<Contract<T>>,
    pub done: Option<Event<Done<T>>>,
    pub fail: Option<Event<Fail<T>>>,
    pub finally: Option<Event<Finally<T>>>,
    /// Free-form parameters handed to adapter factories.
    pub params: Option<serde_json::Value>,
}

impl<T, C> Default for PersistConfig<T, C> {
    fn default() -> Self {
        Self {
            adapter: None,
            store: None,
            source: None,
            target: None,
            clock: None,
            key: None,
            key_prefix: None,
            context: None,
            pickup: None,
            contract: None,
            done: None,
            fail: None,
            finally: None,
            params: None,
        }
    }
}

impl<T, C> Clone for PersistConfig<T, C> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            store: self.store.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            clock: self.clock.clone(),
            key: self.key.clone(),
            key_prefix: self.key_prefix.clone(),
            context: self.context.clone(),
            pickup: self.pickup.clone(),
            contract: self.contract.clone(),
            done: self.done.clone(),
            fail: self.fail.clone(),
            finally: self.finally.clone(),
            params: self.params.clone(),
        }
    }
}

impl<T: 'static, C: 'static> PersistConfig<T, C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn adapter(self, adapter: impl StorageAdapter<T, C> + 'static) -> Self {
        self.adapter_source(AdapterSource::adapter(adapter))
    }

    #[must_use]
    pub fn adapter_rc(self, adapter: Rc<dyn StorageAdapter<T, C>>) -> Self {
        self.adapter_source(AdapterSource::Adapter(adapter))
    }

    #[must_use]
    pub fn factory(self, factory: impl AdapterFactory<T, C> + 'static) -> Self {
        self.adapter_source(AdapterSource::factory(factory))
    }

    #[must_use]
    pub fn adapter_source(mut self, adapter: AdapterSource<T, C>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Observable<T>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<Source<T>>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<Target<T>>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Event<()>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn context(mut self, context: impl Into<ContextSource<C>>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn pickup(mut self, pickup: Event<C>) -> Self {
        self.pickup = Some(pickup);
        self
    }

    #[must_use]
    pub fn contract(mut self, contract: Contract<T>) -> Self {
        self.contract = Some(contract);
        self
    }

    #[must_use]
    pub fn done(mut self, sink: Event<Done<T>>) -> Self {
        self.done = Some(sink);
        self
    }

    #[must_use]
    pub fn fail(mut self, sink: Event<Fail<T>>) -> Self {
        self.fail = Some(sink);
        self
    }

    #[must_use]
    pub fn finally(mut self, sink: Event<Finally<T>>) -> Self {
        self.finally = Some(sink);
        self
    }

    #[must_use]
    pub fn params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Overlay `other` on `self`: every field set in `other` wins.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            adapter: other.adapter.or(self.adapter),
            store: other.store.or(self.store),
            source: other.source.or(self.source),
            target: other.target.or(self.target),
            clock: other.clock.or(self.clock),
            key: other.key.or(self.key),
            key_prefix: other.key_prefix.or(self.key_prefix),
            context: other.context.or(self.context),
            pickup: other.pickup.or(self.pickup),
            contract: other.contract.or(self.contract),
            done: other.done.or(self.done),
            fail: other.fail.or(self.fail),
            finally: other.finally.or(self.finally),
            params: other.params.or(self.params),
        }
    }
}

impl<T, C> From<&str> for PersistConfig<T, C> {
    fn from(key: &str) -> Self {
        Self {
            key: Some(key.to_owned()),
            ..Self::default()
        }
    }
}

impl<T, C> From<String> for PersistConfig<T, C> {
    fn from(key: String) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }
}

impl<T, C> fmt::Debug for PersistConfig<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistConfig")
            .field("adapter", &self.adapter)
            .field("store", &self.store.is_some())
            .field("source", &self.source.is_some())
            .field("target", &self.target.is_some())
            .field("clock", &self.clock.is_some())
            .field("key", &self.key)
            .field("key_prefix", &self.key_prefix)
            .field("context", &self.context.is_some())
            .field("pickup", &self.pickup.is_some())
            .field("contract", &self.contract)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
