//! Mapping from `std::io::Error` and resolver errors onto `engine_core::Status`.

use engine_core::{EngineError, Status};

pub fn io_error_to_status(err: std::io::Error) -> Status {
    EngineError::from(err).into_status()
}

pub fn resolve_error_to_status(err: hickory_resolver::error::ResolveError) -> Status {
    use hickory_resolver::error::ResolveErrorKind;
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => Status::NotFound(err.to_string()),
        ResolveErrorKind::Timeout => Status::DeadlineExceeded(err.to_string()),
        _ => Status::Unreachable(err.to_string()),
    }
}
