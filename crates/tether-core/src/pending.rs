#![forbid(unsafe_code)]

//! Results that are either available now or later.
//!
//! Synchronous backends answer with [`Pending::Ready`] and the engine keeps
//! propagating in the same call stack. Asynchronous backends answer with
//! [`Pending::Later`]; the engine parks the continuation on its executor and
//! resumes propagation when the future settles.

use std::fmt;
use std::future::{Future, IntoFuture};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::error::StorageError;

/// A result that may still be in flight.
pub enum Pending<T, E = StorageError> {
    Ready(Result<T, E>),
    Later(LocalBoxFuture<'static, Result<T, E>>),
}

impl<T: 'static, E: 'static> Pending<T, E> {
    /// A successful, immediately available result.
    pub fn ok(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// A failed, immediately available result.
    pub fn err(error: E) -> Self {
        Self::Ready(Err(error))
    }

    /// Wrap a future.
    pub fn later(future: impl Future<Output = Result<T, E>> + 'static) -> Self {
        Self::Later(future.boxed_local())
    }

    /// Whether the result is available without polling.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The result, if it is available now.
    pub fn into_ready(self) -> Option<Result<T, E>> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Later(_) => None,
        }
    }

    /// Transform the success value.
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Pending<U, E> {
        match self {
            Self::Ready(result) => Pending::Ready(result.map(f)),
            Self::Later(fut) => Pending::Later(fut.map(|result| result.map(f)).boxed_local()),
        }
    }

    /// Transform the error value.
    pub fn map_err<F: 'static>(self, f: impl FnOnce(E) -> F + 'static) -> Pending<T, F> {
        match self {
            Self::Ready(result) => Pending::Ready(result.map_err(f)),
            Self::Later(fut) => Pending::Later(fut.map(|result| result.map_err(f)).boxed_local()),
        }
    }

    /// Defer a ready result so it only resolves when polled.
    pub fn deferred(self) -> Self {
        match self {
            Self::Ready(result) => Self::Later(future::ready(result).boxed_local()),
            later => later,
        }
    }
}

impl<T: 'static, E: 'static> IntoFuture for Pending<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = LocalBoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(result) => future::ready(result).boxed_local(),
            Self::Later(fut) => fut,
        }
    }
}

impl<T, E> From<Result<T, E>> for Pending<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self::Ready(result)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Later(_) => f.write_str("Later(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn ready_is_available_immediately() {
        let pending: Pending<i32> = Pending::ok(3);
        assert!(pending.is_ready());
        assert_eq!(pending.map(|v| v * 2).into_ready().map(Result::ok), Some(Some(6)));
    }

    #[test]
    fn later_resolves_when_awaited() {
        let pending: Pending<&str> = Pending::later(async { Ok("done") });
        assert!(!pending.is_ready());
        assert_eq!(block_on(pending.into_future()).ok(), Some("done"));
    }

    #[test]
    fn deferred_hides_ready_value() {
        let pending: Pending<u8, String> = Pending::err("nope".into()).deferred();
        assert!(pending.into_ready().is_none());
    }

    #[test]
    fn map_err_applies_to_later() {
        let pending: Pending<(), u8> = Pending::later(async { Err(7) });
        let mapped = pending.map_err(|code| format!("code {code}"));
        assert_eq!(block_on(mapped.into_future()), Err("code 7".to_string()));
    }
}
