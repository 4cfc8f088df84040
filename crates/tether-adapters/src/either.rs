#![forbid(unsafe_code)]

//! Fallback between two adapters.

use std::rc::Rc;

use tether_core::{AdapterSource, FactoryConfig, StorageAdapter};

/// Use `primary` unless it is a noop, otherwise `fallback`.
///
/// When either side is a factory the choice is made at instantiation time
/// and the result is itself a factory.
pub fn either<T: 'static, C: 'static>(
    primary: AdapterSource<T, C>,
    fallback: AdapterSource<T, C>,
) -> AdapterSource<T, C> {
    match (primary, fallback) {
        (AdapterSource::Adapter(primary), AdapterSource::Adapter(fallback)) => {
            AdapterSource::Adapter(pick(primary, fallback))
        }
        (primary, fallback) => AdapterSource::factory(move |config: &FactoryConfig<T>| {
            pick(primary.resolve(config), fallback.resolve(config))
        }),
    }
}

fn pick<T, C>(
    primary: Rc<dyn StorageAdapter<T, C>>,
    fallback: Rc<dyn StorageAdapter<T, C>>,
) -> Rc<dyn StorageAdapter<T, C>> {
    if primary.is_noop() { fallback } else { primary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, nil};
    use tether_core::KeyArea;

    fn area(source: &AdapterSource<i32>) -> KeyArea {
        source.resolve(&FactoryConfig::default()).key_area()
    }

    #[test]
    fn noop_primary_falls_back() {
        let store = MemoryStore::<i32>::new();
        let chosen = either(AdapterSource::adapter(nil()), AdapterSource::adapter(store.adapter()));
        assert!(!chosen.is_factory());
        assert_eq!(&area(&chosen), store.key_area());
    }

    #[test]
    fn real_primary_wins() {
        let store = MemoryStore::<i32>::new();
        let chosen = either(AdapterSource::adapter(store.adapter()), AdapterSource::adapter(nil()));
        assert_eq!(&area(&chosen), store.key_area());
    }

    #[test]
    fn factories_are_resolved_lazily() {
        let store = MemoryStore::<i32>::new();
        let factory_store = store.clone();
        let primary = AdapterSource::factory(move |config: &FactoryConfig<i32>| {
            if config.key.as_deref() == Some("memory") {
                Rc::new(factory_store.adapter()) as Rc<dyn StorageAdapter<i32>>
            } else {
                Rc::new(nil()) as Rc<dyn StorageAdapter<i32>>
            }
        });
        let chosen = either(primary, AdapterSource::adapter(crate::log("fallback")));
        assert!(chosen.is_factory());

        let memory = chosen.resolve(&FactoryConfig {
            key: Some("memory".into()),
            ..FactoryConfig::default()
        });
        assert_eq!(&memory.key_area(), store.key_area());
        let other = chosen.resolve(&FactoryConfig::default());
        assert!(!other.is_noop());
        assert_ne!(&other.key_area(), store.key_area());
    }
}
