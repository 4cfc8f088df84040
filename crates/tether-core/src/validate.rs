#![forbid(unsafe_code)]

//! Validation of retrieved values.
//!
//! A binding may carry a [`Contract`]. Every value on its way from storage to
//! a target passes through [`validate`] first.
//!
//! # Rules
//!
//! | Input | Result |
//! |-------|--------|
//! | `None` (nothing stored) | `Ok(None)`, contract not consulted |
//! | no contract | value passes |
//! | predicate returns `false` | `["Invalid data"]` |
//! | protocol `is_data` is `false` | the protocol's own messages |
//! | schema reports issues | the schema's messages |
//! | unrecognized contract | `["Invalid contract"]` |
//!
//! Schema results may be deferred; callers receive a [`Pending`] and never
//! need to know which shape the schema used.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::StorageError;
use crate::pending::Pending;

/// Message used when a predicate rejects a value.
pub const INVALID_DATA: &str = "Invalid data";
/// Message used when the contract itself is unusable.
pub const INVALID_CONTRACT: &str = "Invalid contract";

/// Structured validation with its own error reporting.
pub trait ValidationProtocol<T> {
    fn is_data(&self, value: &T) -> bool;
    fn error_messages(&self, value: &T) -> Vec<String>;
}

/// Schema-style validation that may transform the value and may defer.
pub trait Schema<T> {
    /// Validate `value`, returning the schema's output or its issue messages.
    fn validate(&self, value: T) -> Pending<T, Vec<String>>;
}

/// An optional validator attached to a binding.
pub enum Contract<T> {
    Predicate(Rc<dyn Fn(&T) -> bool>),
    Protocol(Rc<dyn ValidationProtocol<T>>),
    Schema(Rc<dyn Schema<T>>),
    /// A dynamically supplied value that is none of the above.
    Unrecognized,
}

impl<T> Clone for Contract<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Predicate(f) => Self::Predicate(Rc::clone(f)),
            Self::Protocol(p) => Self::Protocol(Rc::clone(p)),
            Self::Schema(s) => Self::Schema(Rc::clone(s)),
            Self::Unrecognized => Self::Unrecognized,
        }
    }
}

impl<T: 'static> Contract<T> {
    /// A type-guard style predicate.
    pub fn predicate(f: impl Fn(&T) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }

    /// A validation-protocol object.
    pub fn protocol(protocol: impl ValidationProtocol<T> + 'static) -> Self {
        Self::Protocol(Rc::new(protocol))
    }

    /// A schema object.
    pub fn schema(schema: impl Schema<T> + 'static) -> Self {
        Self::Schema(Rc::new(schema))
    }

    /// Interpret a dynamically typed contract.
    ///
    /// Recognizes a `Contract<T>`, a `fn(&T) -> bool`, and `Rc`s of the three
    /// contract trait objects. Anything else becomes
    /// [`Contract::Unrecognized`].
    pub fn from_any(value: Box<dyn Any>) -> Self {
        let value = match value.downcast::<Self>() {
            Ok(contract) => return *contract,
            Err(value) => value,
        };
        let value = match value.downcast::<fn(&T) -> bool>() {
            Ok(f) => return Self::Predicate(Rc::new(*f)),
            Err(value) => value,
        };
        let value = match value.downcast::<Rc<dyn Fn(&T) -> bool>>() {
            Ok(f) => return Self::Predicate(*f),
            Err(value) => value,
        };
        let value = match value.downcast::<Rc<dyn ValidationProtocol<T>>>() {
            Ok(p) => return Self::Protocol(*p),
            Err(value) => value,
        };
        match value.downcast::<Rc<dyn Schema<T>>>() {
            Ok(s) => Self::Schema(*s),
            Err(_) => Self::Unrecognized,
        }
    }
}

impl<T> fmt::Debug for Contract<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Predicate(_) => "Predicate(..)",
            Self::Protocol(_) => "Protocol(..)",
            Self::Schema(_) => "Schema(..)",
            Self::Unrecognized => "Unrecognized",
        })
    }
}

/// Run `raw` through `contract`.
pub fn validate<T: 'static>(raw: Option<T>, contract: Option<&Contract<T>>) -> Pending<Option<T>> {
    let Some(value) = raw else {
        return Pending::ok(None);
    };
    let Some(contract) = contract else {
        return Pending::ok(Some(value));
    };
    match contract {
        Contract::Predicate(check) => {
            if check(&value) {
                Pending::ok(Some(value))
            } else {
                Pending::err(StorageError::Validation(vec![INVALID_DATA.to_owned()]))
            }
        }
        Contract::Protocol(protocol) => {
            if protocol.is_data(&value) {
                Pending::ok(Some(value))
            } else {
                Pending::err(StorageError::Validation(protocol.error_messages(&value)))
            }
        }
        Contract::Schema(schema) => schema
            .validate(value)
            .map(Some)
            .map_err(StorageError::Validation),
        Contract::Unrecognized => {
            Pending::err(StorageError::Validation(vec![INVALID_CONTRACT.to_owned()]))
        }
    }
}
