#![forbid(unsafe_code)]

//! An adapter that only logs.
//!
//! Every call is emitted as an `info!` event with the adapter label, the
//! storage key, the operation and, for writes, the value. Nothing is stored,
//! yet the adapter is not a noop: combinators prefer it over [`nil`](crate::nil()).

use std::fmt;
use std::rc::Rc;

use tether_core::{KeyArea, Pending, Raw, StorageAdapter, StorageHandle, Updater};

/// Adapter logging every call through `tracing`.
#[derive(Clone, Debug)]
pub struct LogAdapter {
    label: Rc<str>,
    area: KeyArea,
}

/// A logging adapter tagged with `label`.
#[must_use]
pub fn log(label: impl Into<Rc<str>>) -> LogAdapter {
    LogAdapter {
        label: label.into(),
        area: KeyArea::unique("log"),
    }
}

impl LogAdapter {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

struct LogHandle {
    label: Rc<str>,
    key: String,
}

impl<T: fmt::Debug + 'static, C: fmt::Debug> StorageHandle<T, C> for LogHandle {
    fn get(&self, raw: Option<Raw<T>>, ctx: Option<&C>) -> Pending<Option<T>> {
        tracing::info!(adapter = %self.label, key = %self.key, ?raw, ?ctx, "get");
        Pending::ok(None)
    }

    fn set(&self, value: &T, ctx: Option<&C>) -> Pending<()> {
        tracing::info!(adapter = %self.label, key = %self.key, ?value, ?ctx, "set");
        Pending::ok(())
    }

    fn remove(&self, ctx: Option<&C>) -> Option<Pending<()>> {
        tracing::info!(adapter = %self.label, key = %self.key, ?ctx, "remove");
        Some(Pending::ok(()))
    }

    fn dispose(&self) {
        tracing::info!(adapter = %self.label, key = %self.key, "dispose");
    }
}

impl<T: fmt::Debug + 'static, C: fmt::Debug + 'static> StorageAdapter<T, C> for LogAdapter {
    fn open(&self, key: &str, _updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        Box::new(LogHandle {
            label: Rc::clone(&self.label),
            key: key.to_owned(),
        })
    }

    fn key_area(&self) -> KeyArea {
        self.area.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[tracing_test::traced_test]
    fn calls_are_logged() {
        let adapter = log("audit");
        assert_eq!(adapter.label(), "audit");
        assert!(!StorageAdapter::<i32, ()>::is_noop(&adapter));
        let handle = StorageAdapter::<i32, ()>::open(&adapter, "volume", Updater::detached());
        let _ = handle.set(&11, None);
        let _ = handle.get(None, None);
        handle.dispose();
        assert!(logs_contain("audit"));
        assert!(logs_contain("volume"));
        assert!(logs_contain("value=11"));
        assert!(logs_contain("dispose"));
    }

    #[test]
    fn each_logger_has_its_own_area() {
        let a = StorageAdapter::<i32, ()>::key_area(&log("a"));
        let b = StorageAdapter::<i32, ()>::key_area(&log("a"));
        assert_ne!(a, b);
    }
}
