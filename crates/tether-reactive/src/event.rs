#![forbid(unsafe_code)]

//! Stateless triggers.
//!
//! An [`Event<T>`] has no current value. Every [`fire`](Event::fire) delivers
//! the payload to the subscribers registered at that moment, even when the
//! payload equals the previous one.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::observable::{Callback, Subscription};

struct Inner<T> {
    name: Option<Rc<str>>,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A trigger carrying a payload of type `T`.
pub struct Event<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Event<T> {
    /// Create an unnamed event.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                name: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Create an event carrying a declared name.
    #[must_use]
    pub fn named(name: impl Into<Rc<str>>) -> Self {
        let event = Self::new();
        event.inner.borrow_mut().name = Some(name.into());
        event
    }

    /// Declared name, if any.
    #[must_use]
    pub fn name(&self) -> Option<Rc<str>> {
        self.inner.borrow().name.clone()
    }

    /// Deliver `payload` to every live subscriber, in registration order.
    pub fn fire(&self, payload: T) {
        let callbacks: Vec<_> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in callbacks {
            callback(&payload);
        }
    }

    /// Register a callback for future firings.
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

    /// Whether both handles refer to the same event.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Event")
            .field("name", &inner.name)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn fire_delivers_repeated_payloads() {
        let event = Event::new();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let _sub = event.subscribe(move |v: &u32| c.set(c.get() + *v));

        event.fire(2);
        event.fire(2);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let event = Event::<()>::named("tick");
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let sub = event.subscribe(move |_| c.set(c.get() + 1));
        event.fire(());
        drop(sub);
        event.fire(());
        assert_eq!(calls.get(), 1);
        assert_eq!(event.subscriber_count(), 0);
        assert_eq!(event.name().as_deref(), Some("tick"));
    }

    #[test]
    fn subscriber_may_fire_again() {
        let event = Event::new();
        let again = event.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = event.subscribe(move |v: &u8| {
            s.borrow_mut().push(*v);
            if *v == 1 {
                again.fire(2);
            }
        });
        event.fire(1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn ptr_eq_tracks_identity() {
        let a = Event::<i32>::new();
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&Event::new()));
    }
}
