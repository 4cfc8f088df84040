#![forbid(unsafe_code)]

//! The binding engine.
//!
//! An [`Engine`] owns an [`AreaCache`], an optional executor for deferred
//! results, and [`EngineSettings`]. [`Engine::persist`] wires a source and a
//! target to an adapter; [`Engine::create_storage`] exposes the same pipeline
//! as explicit operations.
//!
//! # Setup errors
//!
//! `persist` checks its configuration before anything is wired, in this
//! order:
//!
//! | Condition | Error |
//! |-----------|-------|
//! | no adapter or factory | [`ConfigError::MissingAdapter`] |
//! | no store, no source | [`ConfigError::MissingSource`] |
//! | no store, no target | [`ConfigError::MissingTarget`] |
//! | no key, unnamed source | [`ConfigError::MissingKey`] |
//! | source and target are one event | [`ConfigError::SameSourceAndTarget`] |
//!
//! Operational failures never surface here; they become
//! [`Fail`](crate::Fail) records.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::task::LocalSpawn;
use tether_reactive::Observable;

use crate::Value;
use crate::adapter::{AdapterSource, FactoryConfig, StorageAdapter};
use crate::area::{AreaCache, KeyArea};
use crate::binding::{Binding, Persisted, Setup, Triggers};
use crate::config::{ContextSource, PersistConfig, Source, Target};
use crate::error::ConfigError;
use crate::record::Sinks;
use crate::settings::EngineSettings;
use crate::storage::StorageOps;
use crate::validate::Contract;

thread_local! {
    static GLOBAL_ENGINE: Engine = Engine::from_env();
}

#[derive(PartialEq, Eq, Hash)]
struct StorageId {
    area: KeyArea,
    key: String,
    ty: TypeId,
}

struct EngineInner {
    areas: AreaCache,
    spawner: Option<Rc<dyn LocalSpawn>>,
    settings: EngineSettings,
    storages: RefCell<HashMap<StorageId, Box<dyn Any>>>,
}

/// Entry point for creating bindings.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with a fresh cache, default settings and no executor.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// An engine configured from `TETHER_*` environment variables.
    ///
    /// Invalid values are logged and replaced by defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let settings = EngineSettings::from_env().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring engine settings from environment");
            EngineSettings::default()
        });
        Self::builder().settings(settings).build()
    }

    /// The thread-local default engine, configured from the environment.
    ///
    /// Every caller on the thread shares its area cache. Libraries and tests
    /// should construct their own [`Engine`] so bindings stay independent.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_ENGINE.with(Clone::clone)
    }

    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// An engine sharing `cache` with whoever else holds it.
    #[must_use]
    pub fn with_area_cache(cache: AreaCache) -> Self {
        Self::builder().area_cache(cache).build()
    }

    /// An engine running deferred results on `spawner`.
    #[must_use]
    pub fn with_spawner(spawner: impl LocalSpawn + 'static) -> Self {
        Self::builder().spawner(spawner).build()
    }

    /// An engine with explicit settings.
    #[must_use]
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    #[must_use]
    pub fn area_cache(&self) -> &AreaCache {
        &self.inner.areas
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Whether deferred results can be awaited.
    #[must_use]
    pub fn has_spawner(&self) -> bool {
        self.inner.spawner.is_some()
    }

    /// Bind a source and target to storage.
    ///
    /// The binding lives until the returned [`Persisted`] is unbound or
    /// dropped.
    pub fn persist<T: Value, C: Value>(
        &self,
        config: PersistConfig<T, C>,
    ) -> Result<Persisted<T, C>, ConfigError> {
        let PersistConfig {
            adapter,
            store,
            source,
            target,
            clock,
            key,
            key_prefix,
            context,
            pickup,
            contract,
            done,
            fail,
            finally,
            params,
        } = config;

        let adapter = adapter.ok_or(ConfigError::MissingAdapter)?;
        let source = source
            .or_else(|| store.clone().map(Source::Store))
            .ok_or(ConfigError::MissingSource)?;
        let target = target
            .or_else(|| store.clone().map(Into::into))
            .ok_or(ConfigError::MissingTarget)?;
        let key = key
            .or_else(|| source.name().map(|name| name.to_string()))
            .ok_or(ConfigError::MissingKey)?;
        if source.same_as(&target) {
            return Err(ConfigError::SameSourceAndTarget);
        }

        let seed = match (&store, &source) {
            (Some(store), _) | (None, Source::Store(store)) => Some(store.clone()),
            (None, Source::Event(_)) => None,
        };
        let default_value = seed.as_ref().map(Observable::default_value);
        let key_prefix = key_prefix.unwrap_or_else(|| self.inner.settings.key_prefix.clone());
        let adapter = adapter.resolve(&FactoryConfig {
            key: Some(key.clone()),
            key_prefix: key_prefix.clone(),
            default_value,
            params: params.unwrap_or_default(),
        });

        let binding = self.open(
            adapter,
            key,
            key_prefix,
            Some(target),
            seed,
            contract,
            context.as_ref(),
            Sinks {
                done,
                fail,
                finally,
                log_done: self.inner.settings.log_done,
            },
        );
        binding.wire(Triggers {
            source: Some(source),
            clock,
            context,
            pickup,
            initial_get: true,
        });
        Ok(Persisted::new(binding))
    }

    /// [`persist`](Self::persist) over fragments merged left to right.
    pub fn persist_merged<T: Value, C: Value>(
        &self,
        fragments: impl IntoIterator<Item = PersistConfig<T, C>>,
    ) -> Result<Persisted<T, C>, ConfigError> {
        self.persist(merge_all(fragments))
    }

    /// Get, set and remove operations for one key.
    ///
    /// Repeated calls resolving to the same area, storage key and types
    /// return the operations created first; the later configuration is
    /// ignored. The operations live as long as the engine.
    ///
    /// A concrete adapter is matched against existing operations before
    /// anything else happens. A factory has to run first to reveal its area,
    /// so it runs on every call; a factory that makes a fresh area each time
    /// gets fresh operations each time.
    pub fn create_storage<T: Value, C: Value>(
        &self,
        config: PersistConfig<T, C>,
    ) -> Result<StorageOps<T, C>, ConfigError> {
        let PersistConfig {
            adapter,
            store,
            source,
            key,
            key_prefix,
            context,
            pickup,
            contract,
            done,
            fail,
            finally,
            params,
            ..
        } = config;

        let adapter = adapter.ok_or(ConfigError::MissingAdapter)?;
        let key = key
            .or_else(|| store.as_ref().and_then(Observable::name).map(|name| name.to_string()))
            .or_else(|| source.as_ref().and_then(Source::name).map(|name| name.to_string()))
            .ok_or(ConfigError::MissingStorageKey)?;

        let key_prefix = key_prefix.unwrap_or_else(|| self.inner.settings.key_prefix.clone());
        let storage_key = format!("{key_prefix}{key}");

        if let AdapterSource::Adapter(known) = &adapter {
            if let Some(ops) = self.existing_storage(&known.key_area(), &storage_key) {
                return Ok(ops);
            }
        }
        let adapter = adapter.resolve(&FactoryConfig {
            key: Some(key.clone()),
            key_prefix: key_prefix.clone(),
            default_value: store.as_ref().map(Observable::default_value),
            params: params.unwrap_or_default(),
        });
        if let Some(ops) = self.existing_storage(&adapter.key_area(), &storage_key) {
            return Ok(ops);
        }
        let id = StorageId {
            area: adapter.key_area(),
            key: storage_key,
            ty: TypeId::of::<StorageOps<T, C>>(),
        };

        let binding = self.open(
            adapter,
            key,
            key_prefix,
            None,
            None,
            contract,
            context.as_ref(),
            Sinks {
                done,
                fail,
                finally,
                log_done: self.inner.settings.log_done,
            },
        );
        binding.wire(Triggers {
            source: None,
            clock: None,
            context,
            pickup,
            initial_get: false,
        });
        let ops = StorageOps::new(binding);
        self.inner
            .storages
            .borrow_mut()
            .insert(id, Box::new(ops.clone()));
        Ok(ops)
    }

    /// [`create_storage`](Self::create_storage) over merged fragments.
    pub fn create_storage_merged<T: Value, C: Value>(
        &self,
        fragments: impl IntoIterator<Item = PersistConfig<T, C>>,
    ) -> Result<StorageOps<T, C>, ConfigError> {
        self.create_storage(merge_all(fragments))
    }

    fn existing_storage<T: Value, C: Value>(&self, area: &KeyArea, storage_key: &str) -> Option<StorageOps<T, C>> {
        let id = StorageId {
            area: area.clone(),
            key: storage_key.to_owned(),
            ty: TypeId::of::<StorageOps<T, C>>(),
        };
        self.inner
            .storages
            .borrow()
            .get(&id)
            .and_then(|ops| ops.downcast_ref::<StorageOps<T, C>>())
            .cloned()
    }

    #[allow(clippy::too_many_arguments)]
    fn open<T: Value, C: Value>(
        &self,
        adapter: Rc<dyn StorageAdapter<T, C>>,
        key: String,
        key_prefix: String,
        target: Option<Target<T>>,
        seed: Option<Observable<T>>,
        contract: Option<Contract<T>>,
        context: Option<&ContextSource<C>>,
        sinks: Sinks<T>,
    ) -> Rc<Binding<T, C>> {
        let area = adapter.key_area();
        let cell = self
            .inner
            .areas
            .get_or_create::<T>(&area, &format!("{key_prefix}{key}"));
        let context = match context {
            Some(ContextSource::Store(store)) => Some(store.get()),
            _ => None,
        };
        Binding::open(Setup {
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
            spawner: self.inner.spawner.clone(),
        })
    }
}

fn merge_all<T: 'static, C: 'static>(
    fragments: impl IntoIterator<Item = PersistConfig<T, C>>,
) -> PersistConfig<T, C> {
    fragments
        .into_iter()
        .fold(PersistConfig::default(), PersistConfig::merge)
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("areas", &self.inner.areas)
            .field("spawner", &self.inner.spawner.is_some())
            .field("settings", &self.inner.settings)
            .field("storages", &self.inner.storages.borrow().len())
            .finish()
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    areas: Option<AreaCache>,
    spawner: Option<Rc<dyn LocalSpawn>>,
    settings: EngineSettings,
}

impl EngineBuilder {
    /// Share an existing cache.
    #[must_use]
    pub fn area_cache(mut self, cache: AreaCache) -> Self {
        self.areas = Some(cache);
        self
    }

    /// Executor for deferred results.
    #[must_use]
    pub fn spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn build(self) -> Engine {
        Engine {
            inner: Rc::new(EngineInner {
                areas: self.areas.unwrap_or_default(),
                spawner: self.spawner,
                settings: self.settings,
                storages: RefCell::new(HashMap::new()),
            }),
        }
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("areas", &self.areas)
            .field("spawner", &self.spawner.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
