#![forbid(unsafe_code)]

//! The adapter that stores nothing.

use tether_core::{KeyArea, Pending, Raw, StorageAdapter, StorageHandle, Updater};

/// Adapter that drops writes and never has a value.
///
/// Reports [`is_noop`](StorageAdapter::is_noop) so combinators such as
/// [`either`](crate::either()) skip it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NilAdapter;

/// Shorthand for [`NilAdapter`].
#[must_use]
pub fn nil() -> NilAdapter {
    NilAdapter
}

struct NilHandle;

impl<T: 'static, C> StorageHandle<T, C> for NilHandle {
    fn get(&self, _raw: Option<Raw<T>>, _ctx: Option<&C>) -> Pending<Option<T>> {
        Pending::ok(None)
    }

    fn set(&self, _value: &T, _ctx: Option<&C>) -> Pending<()> {
        Pending::ok(())
    }
}

impl<T: 'static, C: 'static> StorageAdapter<T, C> for NilAdapter {
    fn open(&self, _key: &str, _updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        Box::new(NilHandle)
    }

    fn key_area(&self) -> KeyArea {
        KeyArea::named("nil")
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_noop_and_empty() {
        let adapter = nil();
        assert!(StorageAdapter::<u8, ()>::is_noop(&adapter));
        let handle = StorageAdapter::<u8, ()>::open(&adapter, "k", Updater::detached());
        assert!(handle.set(&1, None).is_ready());
        assert!(matches!(handle.get(None, None).into_ready(), Some(Ok(None))));
        assert!(handle.remove(None).is_none());
    }
}
