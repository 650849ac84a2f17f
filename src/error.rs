//! Error types for the research core.
//!
//! Comprehensive error hierarchy using `thiserror`, covering page-cache
//! storage and CLI command errors plus the research pipeline's own
//! [`ResearchError`].

use thiserror::Error;

/// Result type alias for research-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for research-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (page cache database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Research pipeline errors (rate limiting, search backends, page pool,
    /// page cache, fast-path gate).
    #[error("research error: {0}")]
    Research(#[from] ResearchError),
}

/// Uniform error kinds shared across every research-core component.
///
/// Variant names mirror the error kinds enumerated in the research
/// pipeline's error handling policy: `no_key`, `rate_limited`, `timeout`,
/// `http_status`, `parse`, `empty`, `unavailable`, `validation`, `cancelled`.
#[derive(Error, Debug)]
pub enum ResearchError {
    /// No API key configured for the named service.
    #[error("no API key configured for service: {service}")]
    NoKey {
        /// Service the key was missing for (e.g. "serper", "bing").
        service: String,
    },

    /// Rate limiter rejected the request (queue full or wait exceeded).
    #[error("rate limited on bucket {bucket}: {reason}")]
    RateLimited {
        /// Named token bucket (e.g. "search", "llm").
        bucket: String,
        /// `queue_full` or `timeout`.
        reason: String,
    },

    /// An operation exceeded its deadline.
    #[error("operation timed out after {millis}ms: {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// Configured timeout in milliseconds.
        millis: u64,
    },

    /// A remote endpoint returned a non-success status code.
    #[error("http {status} from {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Request URL (without query secrets).
        url: String,
    },

    /// A response body could not be parsed into the expected shape.
    #[error("failed to parse response from {source}: {message}")]
    Parse {
        /// Where the response came from (provider name, cache row, etc).
        source: String,
        /// Parse failure detail.
        message: String,
    },

    /// An operation produced no usable result, which callers may or may not
    /// treat as a hard failure.
    #[error("empty result from {source}")]
    Empty {
        /// Where the empty result came from.
        source: String,
    },

    /// A persistent component (page cache) is degraded and operating as a
    /// no-op until it can be reopened.
    #[error("{component} unavailable: {reason}")]
    Unavailable {
        /// Degraded component name.
        component: String,
        /// Why it became unavailable.
        reason: String,
    },

    /// Input failed a safety or shape validation check (fast-path gate).
    #[error("validation failed: {reason}")]
    Validation {
        /// Reason validation failed.
        reason: String,
    },

    /// The operation was cancelled before completion.
    #[error("operation cancelled: {operation}")]
    Cancelled {
        /// What was cancelled.
        operation: String,
    },
}

/// Storage-specific errors for page cache database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("not initialized. Run: clawdia-research init")]
    NotInitialized,

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// User cancelled operation.
    #[error("operation cancelled by user")]
    Cancelled,

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for standard library errors

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotInitialized;
        assert_eq!(err.to_string(), "not initialized. Run: clawdia-research init");

        let err = StorageError::Database("connection failed".to_string());
        assert!(err.to_string().contains("connection failed"));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::MissingArgument("--file".to_string());
        assert_eq!(err.to_string(), "missing required argument: --file");
    }

    #[test]
    fn test_error_from_storage() {
        let storage_err = StorageError::NotInitialized;
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_error_from_command() {
        let cmd_err = CommandError::Cancelled;
        let err: Error = cmd_err.into();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn test_error_config() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_storage_error_variants() {
        let err = StorageError::Migration("schema error".to_string());
        assert!(err.to_string().contains("schema error"));

        let err = StorageError::Transaction("rollback".to_string());
        assert!(err.to_string().contains("rollback"));

        let err = StorageError::Serialization("invalid json".to_string());
        assert!(err.to_string().contains("invalid json"));
    }

    #[test]
    fn test_command_error_variants() {
        let err = CommandError::UnknownCommand("foo".to_string());
        assert!(err.to_string().contains("unknown command"));

        let err = CommandError::InvalidArgument("--bad".to_string());
        assert!(err.to_string().contains("invalid argument"));

        let err = CommandError::ExecutionFailed("timeout".to_string());
        assert!(err.to_string().contains("execution failed"));

        let err = CommandError::Cancelled;
        assert!(err.to_string().contains("cancelled"));

        let err = CommandError::OutputFormat("json error".to_string());
        assert!(err.to_string().contains("output format"));
    }

    #[test]
    fn test_from_rusqlite_error_to_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_from_rusqlite_error_to_storage_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: StorageError = rusqlite_err.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_storage_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
