//! Error handling for the admin console
//!
//! This module provides:
//! - `ConsoleError`, the single error type returned by every operation
//! - `ErrorKind` with stable category names for logs and metrics
//! - Process-wide error counters (`ERROR_METRICS`)

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub type ConsoleResult<T> = Result<T, ConsoleError>;

// =============================================================================
// CONSOLE ERROR
// =============================================================================

/// Every failure an admin operation can surface.
///
/// Operation errors are converted into a notice at the point of the user
/// action and returned to the caller; none of them is retried.
#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    /// The request never completed (connection refused, timeout, non-envelope
    /// error status).
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with `success: false` or an error status carrying
    /// an envelope.
    #[error("{message}")]
    Application {
        status: Option<u16>,
        message: String,
    },

    /// A client-side check rejected the input before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// A protected operation was attempted without a session token.
    #[error("not authenticated, please log in")]
    Unauthenticated,

    /// The user declined a confirmation prompt.
    #[error("operation cancelled")]
    Declined,

    /// A newer fetch was issued while this one was in flight.
    #[error("response discarded, a newer request is in flight")]
    Superseded,

    /// The resource has no endpoint for the requested operation.
    #[error("{resource} do not support {operation}")]
    Unsupported {
        resource: &'static str,
        operation: &'static str,
    },

    /// The server response could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Reading or writing the persisted session failed.
    #[error("session storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConsoleError {
    pub fn application(message: impl Into<String>) -> Self {
        ConsoleError::Application {
            status: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ConsoleError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::Transport(_) => ErrorKind::Transport,
            ConsoleError::Application { .. } => ErrorKind::Application,
            ConsoleError::Validation(_) => ErrorKind::Validation,
            ConsoleError::Unauthenticated => ErrorKind::Unauthenticated,
            ConsoleError::Declined => ErrorKind::Declined,
            ConsoleError::Superseded => ErrorKind::Superseded,
            ConsoleError::Unsupported { .. } => ErrorKind::Unsupported,
            ConsoleError::Decode(_) => ErrorKind::Decode,
            ConsoleError::Storage(_) => ErrorKind::Storage,
            ConsoleError::Config(_) => ErrorKind::Config,
        }
    }

    /// Message the server sent, if this error carries one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ConsoleError::Application { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    /// Text shown to the user for this failure.
    ///
    /// Server messages win; an application error without one falls back to
    /// `fallback`, and local failures are prefixed with it.
    pub fn notice_text(&self, fallback: &str) -> String {
        match self {
            ConsoleError::Application { message, .. } if !message.is_empty() => message.clone(),
            ConsoleError::Application { .. } => fallback.to_string(),
            ConsoleError::Validation(message) => message.clone(),
            ConsoleError::Unauthenticated | ConsoleError::Unsupported { .. } => self.to_string(),
            _ => format!("{fallback}: {self}"),
        }
    }

    /// Whether the error should reach the user as a notice.
    ///
    /// Declined prompts and superseded fetches are silent.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ConsoleError::Declined | ConsoleError::Superseded)
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ConsoleError::Decode(err.to_string())
        } else {
            ConsoleError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Storage(err.to_string())
    }
}

// =============================================================================
// ERROR KINDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Transport,
    Application,
    Validation,
    Unauthenticated,
    Declined,
    Superseded,
    Unsupported,
    Decode,
    Storage,
    Config,
}

impl ErrorKind {
    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::Transport | ErrorKind::Decode => "network_error",
            ErrorKind::Application => "server_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unauthenticated => "auth_error",
            ErrorKind::Declined | ErrorKind::Superseded => "cancelled",
            ErrorKind::Unsupported => "client_error",
            ErrorKind::Storage | ErrorKind::Config => "local_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// ERROR METRICS
// =============================================================================

/// Error counters keyed by kind and by operation.
pub struct ErrorMetrics {
    kind_counts: RwLock<HashMap<ErrorKind, AtomicU64>>,
    operation_counts: RwLock<HashMap<String, AtomicU64>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self {
            kind_counts: RwLock::new(HashMap::new()),
            operation_counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, error: &ConsoleError, operation: &str) {
        let kind = error.kind();
        {
            let map = self.kind_counts.read();
            if let Some(counter) = map.get(&kind) {
                counter.fetch_add(1, Ordering::Relaxed);
            } else {
                drop(map);
                self.kind_counts
                    .write()
                    .entry(kind)
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        let map = self.operation_counts.read();
        if let Some(counter) = map.get(operation) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            drop(map);
            self.operation_counts
                .write()
                .entry(operation.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn kind_count(&self, kind: ErrorKind) -> u64 {
        self.kind_counts
            .read()
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn operation_count(&self, operation: &str) -> u64 {
        self.operation_counts
            .read()
            .get(operation)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn category_count(&self, category: &str) -> u64 {
        self.kind_counts
            .read()
            .iter()
            .filter(|(kind, _)| kind.category() == category)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn reset(&self) {
        self.kind_counts.write().clear();
        self.operation_counts.write().clear();
    }
}

impl Default for ErrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global error metrics instance
pub static ERROR_METRICS: once_cell::sync::Lazy<ErrorMetrics> =
    once_cell::sync::Lazy::new(ErrorMetrics::new);
