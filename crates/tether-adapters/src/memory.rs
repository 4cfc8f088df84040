#![forbid(unsafe_code)]

//! In-process key-value storage.
//!
//! A [`MemoryStore`] is a shared map. Every adapter obtained from one store
//! reports the same key area, so bindings created through different adapters
//! of one store stay synchronized. Two stores never share an area.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tether_core::{KeyArea, Pending, StorageAdapter, StorageHandle, Updater, Value};

/// A shared in-memory map.
pub struct MemoryStore<T> {
    values: Rc<RefCell<HashMap<String, T>>>,
    area: KeyArea,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            values: Rc::clone(&self.values),
            area: self.area.clone(),
        }
    }
}

impl<T: Value> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Rc::new(RefCell::new(HashMap::new())),
            area: KeyArea::unique("memory"),
        }
    }

    /// An adapter reading and writing this store.
    #[must_use]
    pub fn adapter(&self) -> MemoryAdapter<T> {
        MemoryAdapter { store: self.clone() }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.values.borrow().get(key).cloned()
    }

    /// Write directly, bypassing every binding.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Option<T> {
        self.values.borrow_mut().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.values.borrow_mut().remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    #[must_use]
    pub fn key_area(&self) -> &KeyArea {
        &self.area
    }
}

impl<T> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("area", &self.area)
            .field("keys", &self.values.borrow().len())
            .finish()
    }
}

/// Adapter over a [`MemoryStore`]. The context is ignored.
#[derive(Clone, Debug)]
pub struct MemoryAdapter<T> {
    store: MemoryStore<T>,
}

struct MemoryHandle<T> {
    key: String,
    store: MemoryStore<T>,
}

impl<T: Value, C> StorageHandle<T, C> for MemoryHandle<T> {
    fn get(&self, raw: Option<tether_core::Raw<T>>, _ctx: Option<&C>) -> Pending<Option<T>> {
        match raw {
            Some(raw) => Pending::ok(raw.into_option()),
            None => Pending::ok(self.store.get(&self.key)),
        }
    }

    fn set(&self, value: &T, _ctx: Option<&C>) -> Pending<()> {
        self.store.insert(self.key.clone(), value.clone());
        Pending::ok(())
    }

    fn remove(&self, _ctx: Option<&C>) -> Option<Pending<()>> {
        self.store.remove(&self.key);
        Some(Pending::ok(()))
    }
}

impl<T: Value, C: 'static> StorageAdapter<T, C> for MemoryAdapter<T> {
    fn open(&self, key: &str, _updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        Box::new(MemoryHandle {
            key: key.to_owned(),
            store: self.store.clone(),
        })
    }

    fn key_area(&self) -> KeyArea {
        self.store.area.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(store: &MemoryStore<i32>, key: &str) -> Box<dyn StorageHandle<i32>> {
        StorageAdapter::<i32, ()>::open(&store.adapter(), key, Updater::detached())
    }

    #[test]
    fn handle_reads_and_writes_the_map() {
        let store = MemoryStore::new();
        let handle = open(&store, "k");
        assert!(matches!(handle.get(None, None).into_ready(), Some(Ok(None))));
        assert!(handle.set(&4, None).is_ready());
        assert_eq!(store.get("k"), Some(4));
        assert!(matches!(handle.get(None, None).into_ready(), Some(Ok(Some(4)))));
        assert!(handle.remove(None).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn adapters_of_one_store_share_an_area() {
        let store = MemoryStore::<i32>::new();
        let a = StorageAdapter::<i32, ()>::key_area(&store.adapter());
        let b = StorageAdapter::<i32, ()>::key_area(&store.adapter());
        assert_eq!(a, b);
        assert_eq!(&a, store.key_area());
        assert_ne!(store.key_area(), MemoryStore::<i32>::new().key_area());
    }

    #[test]
    fn clones_share_values() {
        let store = MemoryStore::new();
        let clone = store.clone();
        store.insert("k", 1);
        assert!(clone.contains_key("k"));
        assert_eq!(clone.len(), 1);
        assert_eq!(clone.remove("k"), Some(1));
        assert_eq!(store.get("k"), None);
    }
}
