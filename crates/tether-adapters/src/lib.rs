#![forbid(unsafe_code)]

//! Storage backends for Tether.
//!
//! | Adapter | Stores | Key area |
//! |---------|--------|----------|
//! | [`MemoryStore`] | shared in-process map | one per store |
//! | [`nil()`] | nothing (noop) | `nil` |
//! | [`log()`] | nothing, logs every call | one per logger |
//! | [`asynchronous`] | whatever it wraps, deferred | the wrapped adapter's |
//! | [`FileStorage`] | a JSON document on disk | one per path |
//! | [`BroadcastHub`] | nothing, relays writes to peers | one per peer |
//!
//! [`either()`] picks between two adapters or factories.

pub mod async_storage;
#[cfg(feature = "broadcast")]
pub mod broadcast;
pub mod either;
#[cfg(feature = "file")]
pub mod file;
pub mod logging;
pub mod memory;
pub mod nil;

pub use async_storage::{AsyncAdapter, asynchronous};
#[cfg(feature = "broadcast")]
pub use broadcast::{BroadcastHub, BroadcastPeer, Message};
pub use either::either;
#[cfg(feature = "file")]
pub use file::{FileAdapter, FileStorage, WriteMode};
pub use logging::{LogAdapter, log};
pub use memory::{MemoryAdapter, MemoryStore};
pub use nil::{NilAdapter, nil};
