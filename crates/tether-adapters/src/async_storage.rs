#![forbid(unsafe_code)]

//! Asynchronous key-value storage.
//!
//! [`asynchronous`] wraps any adapter so that every result is only available
//! after a poll. The engine then settles it on its executor, exactly as it
//! would for a remote store.

use tether_core::{KeyArea, Pending, Raw, StorageAdapter, StorageHandle, Updater};

/// Adapter whose results are always deferred.
#[derive(Clone, Debug)]
pub struct AsyncAdapter<A> {
    inner: A,
}

/// Defer every result of `inner`.
pub fn asynchronous<A>(inner: A) -> AsyncAdapter<A> {
    AsyncAdapter { inner }
}

impl<A> AsyncAdapter<A> {
    pub fn inner(&self) -> &A {
        &self.inner
    }
}

struct DeferredHandle<T, C> {
    inner: Box<dyn StorageHandle<T, C>>,
}

impl<T: 'static, C> StorageHandle<T, C> for DeferredHandle<T, C> {
    fn get(&self, raw: Option<Raw<T>>, ctx: Option<&C>) -> Pending<Option<T>> {
        self.inner.get(raw, ctx).deferred()
    }

    fn set(&self, value: &T, ctx: Option<&C>) -> Pending<()> {
        self.inner.set(value, ctx).deferred()
    }

    fn remove(&self, ctx: Option<&C>) -> Option<Pending<()>> {
        self.inner.remove(ctx).map(Pending::deferred)
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<T, C, A> StorageAdapter<T, C> for AsyncAdapter<A>
where
    T: 'static,
    C: 'static,
    A: StorageAdapter<T, C>,
{
    fn open(&self, key: &str, updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        Box::new(DeferredHandle {
            inner: self.inner.open(key, updater),
        })
    }

    fn key_area(&self) -> KeyArea {
        self.inner.key_area()
    }

    fn is_noop(&self) -> bool {
        self.inner.is_noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use futures::executor::block_on;

    #[test]
    fn results_need_a_poll() {
        let store = MemoryStore::<i32>::new();
        let adapter = asynchronous(store.adapter());
        let handle = StorageAdapter::<i32, ()>::open(&adapter, "k", Updater::detached());

        let set = handle.set(&5, None);
        assert!(!set.is_ready());
        assert!(block_on(set.into_future()).is_ok());
        assert_eq!(store.get("k"), Some(5));

        let get = handle.get(None, None);
        assert!(!get.is_ready());
        assert_eq!(block_on(get.into_future()).ok(), Some(Some(5)));

        let remove = handle.remove(None).expect("memory supports remove");
        assert!(!remove.is_ready());
    }

    #[test]
    fn area_is_the_wrapped_adapters() {
        let store = MemoryStore::<i32>::new();
        let adapter = asynchronous(store.adapter());
        assert_eq!(&StorageAdapter::<i32, ()>::key_area(&adapter), store.key_area());
        assert_eq!(&StorageAdapter::<i32, ()>::key_area(adapter.inner()), store.key_area());
    }
}
