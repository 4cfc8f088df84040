#![forbid(unsafe_code)]

//! Error types.
//!
//! | Kind | Type | Surfaced as |
//! |------|------|-------------|
//! | Bad binding configuration | [`ConfigError`] | `Err` from `persist`/`create_storage` |
//! | Adapter or validation failure | [`StorageError`] | inside a [`Fail`](crate::Fail) record |
//! | Unreadable settings document | [`SettingsError`] | `Err` from `EngineSettings::from_toml_str` |

use std::io;
use std::rc::Rc;

/// Fatal setup errors. A binding is never created when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Adapter is not defined")]
    MissingAdapter,
    #[error("Store or source is not defined")]
    MissingSource,
    #[error("Target is not defined")]
    MissingTarget,
    #[error("Key or name is not defined")]
    MissingKey,
    /// Create-storage variant of [`MissingKey`](Self::MissingKey).
    #[error("Key is not defined")]
    MissingStorageKey,
    #[error("Source must be different from target")]
    SameSourceAndTarget,
}

/// Operational failure of a storage operation or of validation.
///
/// Cloneable so one failure can be delivered to several sinks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The backend reported a failure.
    #[error("{0}")]
    Backend(String),
    /// Encoding or decoding a stored payload failed.
    #[error("codec error: {0}")]
    Codec(String),
    /// I/O against the backing medium failed.
    #[error("i/o error: {0}")]
    Io(Rc<io::Error>),
    /// The value was rejected by its contract.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// A deferred result was returned but the engine has no executor.
    #[error("no executor configured for deferred storage operations")]
    NoExecutor,
    /// The executor refused the continuation task.
    #[error("failed to spawn continuation: {0}")]
    Spawn(String),
    /// The operation was abandoned because its binding went away.
    #[error("binding disposed before the operation settled")]
    Disposed,
}

impl StorageError {
    /// Shorthand for [`StorageError::Backend`].
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Validation messages, when this is a validation failure.
    #[must_use]
    pub fn messages(&self) -> Option<&[String]> {
        match self {
            Self::Validation(messages) => Some(messages),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        Self::Io(Rc::new(err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Engine settings could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[cfg(feature = "settings-file")]
    #[error("invalid engine settings: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_messages_are_stable() {
        assert_eq!(ConfigError::MissingAdapter.to_string(), "Adapter is not defined");
        assert_eq!(
            ConfigError::MissingSource.to_string(),
            "Store or source is not defined"
        );
        assert_eq!(ConfigError::MissingTarget.to_string(), "Target is not defined");
        assert_eq!(ConfigError::MissingKey.to_string(), "Key or name is not defined");
        assert_eq!(ConfigError::MissingStorageKey.to_string(), "Key is not defined");
        assert_eq!(
            ConfigError::SameSourceAndTarget.to_string(),
            "Source must be different from target"
        );
    }

    #[test]
    fn validation_error_joins_messages() {
        let err = StorageError::Validation(vec!["too small".into(), "odd".into()]);
        assert_eq!(err.to_string(), "validation failed: too small; odd");
        assert_eq!(err.messages().map(<[String]>::len), Some(2));
        assert!(StorageError::NoExecutor.messages().is_none());
    }

    #[test]
    fn io_errors_convert() {
        let err: StorageError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
