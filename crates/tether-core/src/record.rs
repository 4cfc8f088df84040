#![forbid(unsafe_code)]

//! Completion records.
//!
//! Every terminal outcome of every storage operation becomes one record:
//! a [`Done`] for successes, a [`Fail`] for failures, and a [`Finally`]
//! wrapping either. Records are routed to the sinks a binding was configured
//! with; without a `fail` sink, failures are logged through `tracing`.

use std::fmt;

use tether_reactive::Event;

use crate::error::StorageError;

/// The operation a record reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Remove,
    Validate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Validate => "validate",
        })
    }
}

/// Outcome tag of a [`Finally`] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Done,
    Fail,
}

/// A successful operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Done<T> {
    pub key: String,
    pub key_prefix: String,
    pub operation: Operation,
    /// Value read or written; `None` for removals and empty reads.
    pub value: Option<T>,
}

/// A failed operation.
#[derive(Clone, Debug)]
pub struct Fail<T> {
    pub key: String,
    pub key_prefix: String,
    pub operation: Operation,
    pub error: StorageError,
    /// Value involved in the failed operation, when one may be shown.
    pub value: Option<T>,
}

impl<T> fmt::Display for Fail<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {}{} failed: {}",
            self.operation, self.key_prefix, self.key, self.error
        )
    }
}

impl<T: fmt::Debug> std::error::Error for Fail<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Either outcome, delivered for every operation.
#[derive(Clone, Debug)]
pub enum Finally<T> {
    Done(Done<T>),
    Fail(Fail<T>),
}

impl<T> Finally<T> {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Done(_) => Status::Done,
            Self::Fail(_) => Status::Fail,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Done(done) => done.operation,
            Self::Fail(fail) => fail.operation,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Done(done) => &done.key,
            Self::Fail(fail) => &fail.key,
        }
    }
}

/// Where a binding sends its records.
pub(crate) struct Sinks<T> {
    pub(crate) done: Option<Event<Done<T>>>,
    pub(crate) fail: Option<Event<Fail<T>>>,
    pub(crate) finally: Option<Event<Finally<T>>>,
    pub(crate) log_done: bool,
}

impl<T: Clone + 'static> Sinks<T> {
    pub(crate) fn done(&self, record: Done<T>) {
        if self.log_done {
            tracing::debug!(
                key = %record.key,
                key_prefix = %record.key_prefix,
                operation = %record.operation,
                "storage operation done"
            );
        }
        if let Some(finally) = &self.finally {
            finally.fire(Finally::Done(record.clone()));
        }
        if let Some(done) = &self.done {
            done.fire(record);
        }
    }

    pub(crate) fn fail(&self, record: Fail<T>) {
        if let Some(finally) = &self.finally {
            finally.fire(Finally::Fail(record.clone()));
        }
        match &self.fail {
            Some(fail) => fail.fire(record),
            None => tracing::error!(
                key = %record.key,
                key_prefix = %record.key_prefix,
                operation = %record.operation,
                error = %record.error,
                "storage operation failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fail_record() -> Fail<i32> {
        Fail {
            key: "count".into(),
            key_prefix: "app:".into(),
            operation: Operation::Set,
            error: StorageError::backend("disk full"),
            value: Some(3),
        }
    }

    #[test]
    fn fail_display_names_operation_and_key() {
        assert_eq!(
            fail_record().to_string(),
            "set of app:count failed: disk full"
        );
    }

    #[test]
    fn finally_exposes_status() {
        let done = Finally::Done(Done {
            key: "k".into(),
            key_prefix: String::new(),
            operation: Operation::Get,
            value: Some(1),
        });
        assert_eq!(done.status(), Status::Done);
        assert_eq!(done.operation(), Operation::Get);
        assert_eq!(done.key(), "k");
        assert_eq!(Finally::Fail(fail_record()).status(), Status::Fail);
    }

    #[test]
    fn sinks_route_records() {
        let done = Event::new();
        let fail = Event::new();
        let finally = Event::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        let _d = done.subscribe(move |r: &Done<i32>| l.borrow_mut().push(format!("done {}", r.operation)));
        let l = Rc::clone(&log);
        let _f = fail.subscribe(move |r: &Fail<i32>| l.borrow_mut().push(format!("fail {}", r.operation)));
        let l = Rc::clone(&log);
        let _a = finally.subscribe(move |r: &Finally<i32>| l.borrow_mut().push(format!("finally {:?}", r.status())));

        let sinks = Sinks {
            done: Some(done),
            fail: Some(fail),
            finally: Some(finally),
            log_done: false,
        };
        sinks.done(Done {
            key: "k".into(),
            key_prefix: String::new(),
            operation: Operation::Get,
            value: None,
        });
        sinks.fail(fail_record());

        assert_eq!(
            *log.borrow(),
            vec!["finally Done", "done get", "finally Fail", "fail set"]
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn missing_fail_sink_logs() {
        let sinks: Sinks<i32> = Sinks {
            done: None,
            fail: None,
            finally: None,
            log_done: false,
        };
        sinks.fail(fail_record());
        assert!(logs_contain("storage operation failed"));
        assert!(logs_contain("disk full"));
    }
}
