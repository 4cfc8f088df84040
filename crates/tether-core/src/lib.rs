#![forbid(unsafe_code)]

//! Tether core: persist reactive state into pluggable key-value backends and
//! keep every binding on the same key synchronized.
//!
//! # Components
//!
//! - [`adapter`]: the contract every backend implements ([`StorageAdapter`],
//!   [`StorageHandle`], [`Updater`]).
//! - [`area`]: the [`AreaCache`], one shared cell per `(key area, key)`.
//! - [`validate`]: optional [`Contract`]s applied to retrieved values.
//! - [`engine`]: the [`Engine`] with [`Engine::persist`] and
//!   [`Engine::create_storage`].
//! - [`record`]: completion records ([`Done`], [`Fail`], [`Finally`]).
//!
//! # Example
//!
//! ```ignore
//! use tether_core::{Engine, PersistConfig};
//! use tether_reactive::Observable;
//!
//! let engine = Engine::new();
//! let counter = Observable::named("counter", 0);
//! let binding = engine.persist(
//!     PersistConfig::new().adapter(memory.adapter()).store(counter.clone()),
//! )?;
//! counter.set(1); // written through the adapter, fanned out to siblings
//! binding.unbind();
//! ```

pub mod adapter;
pub mod area;
mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod pending;
pub mod record;
pub mod settings;
pub mod storage;
pub mod validate;

pub use adapter::{
    AdapterFactory, AdapterSource, FactoryConfig, Raw, StorageAdapter, StorageHandle, Updater,
};
pub use area::{AreaCache, KeyArea};
pub use binding::Persisted;
pub use config::{ContextSource, PersistConfig, Source, Target};
pub use engine::{Engine, EngineBuilder};
pub use error::{ConfigError, SettingsError, StorageError};
pub use pending::Pending;
pub use record::{Done, Fail, Finally, Operation, Status};
pub use settings::EngineSettings;
pub use storage::StorageOps;
pub use validate::{Contract, Schema, ValidationProtocol, validate};

/// Bound shared by stored values and contexts.
///
/// Values are compared to break feedback loops and cloned when fanned out.
pub trait Value: Clone + PartialEq + 'static {}

impl<T: Clone + PartialEq + 'static> Value for T {}
