#![forbid(unsafe_code)]

//! Shared, version-tracked values.
//!
//! # Usage
//!
//! ```
//! use tether_reactive::Observable;
//!
//! let count = Observable::new(0);
//! let seen = std::rc::Rc::new(std::cell::Cell::new(0));
//! let s = seen.clone();
//! let _sub = count.subscribe(move |v| s.set(*v));
//!
//! count.set(5);
//! assert_eq!(seen.get(), 5);
//! assert_eq!(count.version(), 1);
//! ```
//!
//! # Failure Modes
//!
//! - Subscriber panic: propagates to the caller of `set()`.
//! - Reading the observable from inside a subscriber is allowed; the value is
//!   never borrowed while callbacks run.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) type Callback<T> = dyn Fn(&T);

struct Inner<T> {
    value: T,
    default: T,
    version: u64,
    name: Option<Rc<str>>,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A shared value that notifies subscribers when it changes.
///
/// Cloning an `Observable` yields another handle to the same value.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value`.
    ///
    /// `value` is also remembered as the default, see [`reset`](Self::reset).
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                default: value.clone(),
                value,
                version: 0,
                name: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Create an observable carrying a declared name.
    ///
    /// The name is used as the storage key when a binding supplies none.
    #[must_use]
    pub fn named(name: impl Into<Rc<str>>, value: T) -> Self {
        let obs = Self::new(value);
        obs.inner.borrow_mut().name = Some(name.into());
        obs
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// The value the observable was created with.
    #[must_use]
    pub fn default_value(&self) -> T {
        self.inner.borrow().default.clone()
    }

    /// Declared name, if any.
    #[must_use]
    pub fn name(&self) -> Option<Rc<str>> {
        self.inner.borrow().name.clone()
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Compute a new value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with(f);
        self.set(next);
    }

    /// Restore the default value.
    pub fn reset(&self) {
        let default = self.default_value();
        self.set(default);
    }

    /// Mutation counter. Starts at zero.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Register a change callback.
    ///
    /// The callback stays registered for as long as the returned
    /// [`Subscription`] is alive.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        Subscription::new(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether both handles point at the same value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let (round, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<_> = inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (inner.version, callbacks)
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(version = round, subscribers = callbacks.len(), "observable notify");
        for callback in callbacks {
            let current = {
                let inner = self.inner.borrow();
                if inner.version != round {
                    // A nested set already notified everyone with a newer value.
                    return;
                }
                inner.value.clone()
            };
            callback(&current);
        }
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("name", &inner.name)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

/// RAII guard for a registered callback.
///
/// Holds the only strong reference to the callback; dropping it makes the
/// owner skip (and later prune) the callback.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl Subscription {
    pub(crate) fn new<T: 'static>(callback: Rc<Callback<T>>) -> Self {
        Self {
            _callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_notifies_and_bumps_version() {
        let obs = Observable::new(1);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| s.set(*v));

        obs.set(7);
        assert_eq!(seen.get(), 7);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn equal_set_is_noop() {
        let obs = Observable::new(3);
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let _sub = obs.subscribe(move |_| c.set(c.get() + 1));

        obs.set(3);
        assert_eq!(calls.get(), 0);
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn dropped_subscription_is_skipped() {
        let obs = Observable::new(0);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let sub = obs.subscribe(move |v| s.set(*v));
        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(seen.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let _a = obs.subscribe(move |_| l1.borrow_mut().push("a"));
        let _b = obs.subscribe(move |_| l2.borrow_mut().push("b"));
        obs.set(1);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn nested_set_supersedes_outer_round() {
        let obs = Observable::new(0);
        let inner = obs.clone();
        let _clamp = obs.subscribe(move |v| {
            if *v > 10 {
                inner.set(10);
            }
        });
        let last = Rc::new(Cell::new(0));
        let l = Rc::clone(&last);
        let _watch = obs.subscribe(move |v| l.set(*v));

        obs.set(42);
        assert_eq!(obs.get(), 10);
        assert_eq!(last.get(), 10, "late subscriber must not see the stale 42");
    }

    #[test]
    fn reset_restores_default() {
        let obs = Observable::named("counter", 5);
        obs.set(9);
        obs.reset();
        assert_eq!(obs.get(), 5);
        assert_eq!(obs.default_value(), 5);
        assert_eq!(obs.name().as_deref(), Some("counter"));
    }

    #[test]
    fn clones_share_state() {
        let a = Observable::new(String::from("x"));
        let b = a.clone();
        b.set("y".into());
        assert_eq!(a.get(), "y");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Observable::new(String::from("y"))));
    }

    #[test]
    fn update_uses_current_value() {
        let obs = Observable::new(2);
        obs.update(|v| v * 21);
        assert_eq!(obs.get(), 42);
    }

    #[test]
    fn subscriber_may_read_during_notify() {
        let obs = Observable::new(0);
        let reader = obs.clone();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |_| s.set(reader.get()));
        obs.set(4);
        assert_eq!(seen.get(), 4);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn version_counts_effective_changes(values in proptest::collection::vec(0u8..4, 0..32)) {
                let obs = Observable::new(0u8);
                let mut expected = 0u64;
                let mut current = 0u8;
                for v in values {
                    if v != current {
                        expected += 1;
                        current = v;
                    }
                    obs.set(v);
                }
                prop_assert_eq!(obs.version(), expected);
                prop_assert_eq!(obs.get(), current);
            }
        }
    }
}
