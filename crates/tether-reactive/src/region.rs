#![forbid(unsafe_code)]

//! Disposal scopes for groups of subscriptions.
//!
//! A [`Region`] collects every subscription created for one logical owner
//! (in Tether: one persistence binding) so they can be released together.
//!
//! # Usage
//!
//! ```
//! use tether_reactive::{Observable, Region};
//!
//! let obs = Observable::new(42);
//! let mut region = Region::new();
//! region.subscribe(&obs, |v| println!("value: {v}"));
//! assert_eq!(region.len(), 1);
//!
//! // Clearing (or dropping) the region releases every subscription.
//! region.clear();
//! assert!(region.is_empty());
//! ```
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order.
//! 2. After `clear()` or drop, no callbacks registered through this region
//!    will fire.
//! 3. A cleared region is reusable.
//! 4. `len()` is always accurate.

use std::fmt;

use crate::event::Event;
use crate::observable::{Observable, Subscription};

/// Collects subscriptions for atomic teardown.
#[derive(Default)]
pub struct Region {
    subscriptions: Vec<Subscription>,
}

impl Region {
    /// Create an empty region.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the region is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe to an observable within this region.
    pub fn subscribe<T: Clone + PartialEq + 'static>(
        &mut self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(callback);
        self.subscriptions.push(sub);
        self
    }

    /// Watch an event within this region.
    pub fn watch<T: 'static>(
        &mut self,
        event: &Event<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = event.subscribe(callback);
        self.subscriptions.push(sub);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the region holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription now; the region stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn region_holds_subscriptions() {
        let obs = Observable::new(0);
        let seen = Rc::new(Cell::new(0));

        let mut region = Region::new();
        let s = Rc::clone(&seen);
        region.subscribe(&obs, move |v| s.set(*v));
        assert_eq!(region.len(), 1);

        obs.set(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn drop_releases_subscriptions() {
        let obs = Observable::new(0);
        let seen = Rc::new(Cell::new(0));
        {
            let mut region = Region::new();
            let s = Rc::clone(&seen);
            region.subscribe(&obs, move |v| s.set(*v));
            obs.set(1);
        }
        obs.set(99);
        assert_eq!(seen.get(), 1, "callback should not fire after region dropped");
    }

    #[test]
    fn clear_releases_and_region_is_reusable() {
        let obs = Observable::new(0);
        let tick = Event::<()>::new();
        let mut region = Region::new();

        let first = Rc::new(Cell::new(false));
        let f = Rc::clone(&first);
        region.subscribe(&obs, move |_| f.set(true));
        region.clear();
        assert!(region.is_empty());

        let second = Rc::new(Cell::new(0));
        let s = Rc::clone(&second);
        region.watch(&tick, move |_| s.set(s.get() + 1));

        obs.set(1);
        tick.fire(());
        assert!(!first.get());
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn hold_external_subscription() {
        let obs = Observable::new(0);
        let seen = Rc::new(Cell::new(0));

        let mut region = Region::new();
        let s = Rc::clone(&seen);
        region.hold(obs.subscribe(move |v| s.set(*v)));
        obs.set(5);
        drop(region);
        obs.set(99);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn debug_format_reports_count() {
        let obs = Observable::new(0);
        let mut region = Region::new();
        region.subscribe(&obs, |_| {}).subscribe(&obs, |_| {});
        assert!(format!("{region:?}").contains("subscriptions: 2"));
    }
}
