#![forbid(unsafe_code)]

//! Reactive primitives for Tether.
//!
//! This crate provides the change-tracking building blocks the persistence
//! engine is wired with:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Event`]: A stateless trigger that delivers a payload to its
//!   subscribers every time it fires.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Region`]: A disposal scope that holds many subscriptions and releases
//!   them together.
//!
//! # Architecture
//!
//! `Observable<T>` and `Event<T>` use `Rc<RefCell<..>>` for single-threaded
//! shared ownership. Subscribers are stored as `Weak` function pointers and
//! cleaned up lazily during notification; the strong reference lives in the
//! [`Subscription`].
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. A mutation made from inside a subscriber supersedes the notification
//!    round that was running: remaining subscribers of the outer round are
//!    not called with the stale value.

pub mod event;
pub mod observable;
pub mod region;

pub use event::Event;
pub use observable::{Observable, Subscription};
pub use region::Region;
