#![forbid(unsafe_code)]

//! Key areas and the area cache.
//!
//! The [`AreaCache`] is the synchronization anchor between bindings that know
//! nothing about each other: every binding whose resolved
//! `(key area, storage key)` pair is equal observes the same cell, no matter
//! which adapter instance it was created with.
//!
//! # Invariants
//!
//! 1. Exactly one cell exists per `(key area, storage key, value type)`.
//! 2. Creation is idempotent: the first caller creates, later callers
//!    receive the same cell.
//! 3. Cells are never removed while the cache lives. Disposing a binding
//!    must not break synchronization for siblings still bound to the key,
//!    and late joiners must still see the last known value.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether_reactive::Observable;

use crate::Value;

static NEXT_AREA_ID: AtomicU64 = AtomicU64::new(1);

/// Identity that scopes the area cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyArea {
    /// A well-known area. Equal names share cells.
    Named(Rc<str>),
    /// An area private to one backend instance.
    Instance { label: &'static str, id: u64 },
}

impl KeyArea {
    /// An area identified by name, e.g. a file path.
    #[must_use]
    pub fn named(name: impl Into<Rc<str>>) -> Self {
        Self::Named(name.into())
    }

    /// A fresh area that compares equal only to its own clones.
    #[must_use]
    pub fn unique(label: &'static str) -> Self {
        Self::Instance {
            label,
            id: NEXT_AREA_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl fmt::Display for KeyArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Instance { label, id } => write!(f, "{label}#{id}"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CellId {
    area: KeyArea,
    key: String,
    ty: TypeId,
}

/// Registry of shared cells, one per `(key area, storage key)`.
///
/// Cloning the cache yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct AreaCache {
    cells: Rc<RefCell<HashMap<CellId, Box<dyn Any>>>>,
}

impl AreaCache {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the cell for `(area, key)`, creating an empty one on first use.
    pub fn get_or_create<T: Value>(&self, area: &KeyArea, key: &str) -> Observable<Option<T>> {
        let id = CellId {
            area: area.clone(),
            key: key.to_owned(),
            ty: TypeId::of::<T>(),
        };
        let mut cells = self.cells.borrow_mut();
        if let Some(cell) = cells
            .get(&id)
            .and_then(|cell| cell.downcast_ref::<Observable<Option<T>>>())
        {
            return cell.clone();
        }
        tracing::trace!(area = %area, key, "area cell created");
        let cell = Observable::new(None);
        cells.insert(id, Box::new(cell.clone()));
        cell
    }

    /// Current value of an existing cell, without creating one.
    #[must_use]
    pub fn peek<T: Value>(&self, area: &KeyArea, key: &str) -> Option<T> {
        let id = CellId {
            area: area.clone(),
            key: key.to_owned(),
            ty: TypeId::of::<T>(),
        };
        self.cells
            .borrow()
            .get(&id)
            .and_then(|cell| cell.downcast_ref::<Observable<Option<T>>>())
            .and_then(Observable::get)
    }

    /// Whether any cell exists for `(area, key)`.
    #[must_use]
    pub fn contains(&self, area: &KeyArea, key: &str) -> bool {
        self.cells
            .borrow()
            .keys()
            .any(|id| &id.area == area && id.key == key)
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    /// Whether no cell has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }

    /// Whether both handles share one registry.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells)
    }
}

impl fmt::Debug for AreaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaCache")
            .field("cells", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pair_yields_same_cell() {
        let cache = AreaCache::new();
        let area = KeyArea::named("memory");
        let a = cache.get_or_create::<i32>(&area, "k");
        let b = cache.get_or_create::<i32>(&area, "k");
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_areas_and_keys_are_isolated() {
        let cache = AreaCache::new();
        let one = KeyArea::unique("memory");
        let two = KeyArea::unique("memory");
        assert_ne!(one, two);

        let a = cache.get_or_create::<i32>(&one, "k");
        let b = cache.get_or_create::<i32>(&two, "k");
        let c = cache.get_or_create::<i32>(&one, "other");
        assert!(!a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn named_areas_compare_by_name() {
        assert_eq!(KeyArea::named("file:/tmp/a"), KeyArea::named("file:/tmp/a"));
        assert_eq!(KeyArea::named("local").to_string(), "local");
        assert!(KeyArea::unique("memory").to_string().starts_with("memory#"));
    }

    #[test]
    fn value_types_get_separate_cells() {
        let cache = AreaCache::new();
        let area = KeyArea::named("memory");
        let numbers = cache.get_or_create::<i32>(&area, "k");
        let words = cache.get_or_create::<String>(&area, "k");
        numbers.set(Some(1));
        words.set(Some("one".into()));
        assert_eq!(cache.peek::<i32>(&area, "k"), Some(1));
        assert_eq!(cache.peek::<String>(&area, "k").as_deref(), Some("one"));
    }

    #[test]
    fn peek_does_not_create() {
        let cache = AreaCache::new();
        let area = KeyArea::named("memory");
        assert_eq!(cache.peek::<i32>(&area, "k"), None);
        assert!(cache.is_empty());
        assert!(!cache.contains(&area, "k"));
        cache.get_or_create::<i32>(&area, "k");
        assert!(cache.contains(&area, "k"));
    }

    #[test]
    fn clones_share_the_registry() {
        let cache = AreaCache::new();
        let clone = cache.clone();
        let area = KeyArea::named("memory");
        let a = cache.get_or_create::<u8>(&area, "k");
        let b = clone.get_or_create::<u8>(&area, "k");
        assert!(a.ptr_eq(&b));
        assert!(cache.ptr_eq(&clone));
        assert!(!cache.ptr_eq(&AreaCache::new()));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn creation_is_idempotent(keys in proptest::collection::vec("[a-c]{1,2}", 1..24)) {
                let cache = AreaCache::new();
                let area = KeyArea::named("memory");
                let first: Vec<_> = keys.iter().map(|k| cache.get_or_create::<u32>(&area, k)).collect();
                for (key, cell) in keys.iter().zip(&first) {
                    prop_assert!(cache.get_or_create::<u32>(&area, key).ptr_eq(cell));
                }
                let distinct: std::collections::HashSet<_> = keys.iter().collect();
                prop_assert_eq!(cache.len(), distinct.len());
            }
        }
    }
}
