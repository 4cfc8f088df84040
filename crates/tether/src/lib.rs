#![forbid(unsafe_code)]

//! Tether: persist reactive state into pluggable key-value backends and keep
//! every binding on the same key synchronized.
//!
//! This crate re-exports the workspace:
//!
//! - [`reactive`]: observables, events and disposal regions.
//! - [`engine`]: the binding engine, the adapter contract, validation and records.
//! - [`adapters`]: memory, file, broadcast and combinator backends
//!   (feature `adapters`, on by default).
//!
//! # Example
//!
//! ```
//! use tether::prelude::*;
//!
//! let engine = Engine::new();
//! let memory = MemoryStore::new();
//! let theme = Observable::named("theme", String::from("light"));
//! let mirror = Observable::new(String::new());
//!
//! let _a = engine
//!     .persist(PersistConfig::<String>::new().adapter(memory.adapter()).store(theme.clone()))
//!     .unwrap();
//! let _b = engine
//!     .persist(PersistConfig::<String>::new().adapter(memory.adapter()).store(mirror.clone()).key("theme"))
//!     .unwrap();
//!
//! theme.set("dark".into());
//! assert_eq!(mirror.get(), "dark");
//! assert_eq!(memory.get("theme").as_deref(), Some("dark"));
//! ```

pub use tether_core as engine;
pub use tether_reactive as reactive;

#[cfg(feature = "adapters")]
pub use tether_adapters as adapters;

pub use tether_core::{
    AdapterFactory, AdapterSource, AreaCache, ConfigError, ContextSource, Contract, Done, Engine,
    EngineBuilder, EngineSettings, Fail, FactoryConfig, Finally, KeyArea, Operation, Pending,
    PersistConfig, Persisted, Raw, Schema, SettingsError, Source, Status, StorageAdapter,
    StorageError, StorageHandle, StorageOps, Target, Updater, ValidationProtocol, Value, validate,
};
pub use tether_reactive::{Event, Observable, Region, Subscription};

/// Everything needed to declare bindings.
pub mod prelude {
    pub use tether_core::{
        AdapterSource, Contract, Engine, Fail, Finally, KeyArea, Operation, Pending, PersistConfig,
        Persisted, Raw, StorageAdapter, StorageError, StorageHandle, StorageOps, Updater,
    };
    pub use tether_reactive::{Event, Observable, Region};

    #[cfg(feature = "adapters")]
    pub use tether_adapters::{MemoryStore, asynchronous, either, log, nil};
}
