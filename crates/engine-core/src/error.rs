//! Outcome classification for every fallible engine operation.
//!
//! Errors split into a rich internal representation ([`EngineError`], carrying an
//! optional `io::Error` source) and a small classified sum type surfaced across the
//! public boundary ([`Status`]). Callbacks, `Result` returns from
//! `Endpoint`/`Listener`/`Connector`/`Engine` methods, and the idle tracker all speak
//! `Status`; `EngineError` stays internal to each crate.

use std::fmt;
use std::io;

/// Tagged status sum surfaced at the engine's public boundary.
///
/// `Status` is an outcome classification, not an exception type: it deliberately does
/// not implement [`std::error::Error`]. Reasons are free-form strings meant for logs,
/// not machine parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Cancelled(String),
    DeadlineExceeded(String),
    NotFound(String),
    Unreachable(String),
    ResourceExhausted(String),
    Internal(String),
    Unimplemented(String),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Status::Cancelled(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Cancelled(reason) => write!(f, "cancelled: {reason}"),
            Status::DeadlineExceeded(reason) => write!(f, "deadline exceeded: {reason}"),
            Status::NotFound(reason) => write!(f, "not found: {reason}"),
            Status::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            Status::ResourceExhausted(reason) => write!(f, "resource exhausted: {reason}"),
            Status::Internal(reason) => write!(f, "internal: {reason}"),
            Status::Unimplemented(reason) => write!(f, "unimplemented: {reason}"),
        }
    }
}

/// Internal, richly-typed error used inside `engine-core` and the transport
/// implementation crate before being classified into a [`Status`] at the boundary.
///
/// `Cancelled`/`DeadlineExceeded`/`Unreachable`/`ResourceExhausted` are ordinary
/// outcomes; a separate abort path (see [`abort_on_invalid_usage`]) covers programmer
/// errors the engine terminates the process for rather than returning.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Classify into the public [`Status`] surfaced through callbacks and `Result`s.
    pub fn into_status(self) -> Status {
        match self {
            EngineError::Cancelled(reason) => Status::Cancelled(reason),
            EngineError::DeadlineExceeded(reason) => Status::DeadlineExceeded(reason),
            EngineError::Unreachable(reason) => Status::Unreachable(reason),
            EngineError::NotFound(reason) => Status::NotFound(reason),
            EngineError::ResourceExhausted(reason) => Status::ResourceExhausted(reason),
            EngineError::Unimplemented(reason) => Status::Unimplemented(reason),
            EngineError::Io(err) => Status::Internal(err.to_string()),
            EngineError::Internal(reason) => Status::Internal(reason),
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => EngineError::DeadlineExceeded(err.to_string()),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
                EngineError::Unreachable(err.to_string())
            }
            _ => EngineError::Io(err),
        }
    }
}

/// Engine-wide result alias used throughout both crates.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Violations of the one-outstanding-operation or destruction-with-outstanding-work
/// rules are programmer errors: the engine aborts the process
/// rather than returning a `Result`, since there is no safe way to recover from a
/// caller that has broken the one-outstanding-operation rule.
#[track_caller]
pub fn abort_on_invalid_usage(condition: bool, message: &str) {
    if !condition {
        tracing::error!(%message, "contract violation; aborting process");
        std::process::abort();
    }
}
