//! The Endpoint component: a single bidirectional connection.

use crate::address::ResolvedAddress;
use crate::buffer::SliceBuffer;
use crate::error::Status;

/// Invoked when a read completes, fails, or is cancelled. Receives the status and,
/// when `status.is_ok()`, the bytes read.
pub type OnRead = Box<dyn FnOnce(Status, SliceBuffer) + Send>;

/// Invoked once a write has fully drained or has failed.
pub type OnWritable = Box<dyn FnOnce(Status) + Send>;

/// A single open connection.
///
/// At most one `read` and one `write` may be outstanding at a time; issuing a second
/// before the first's callback has fired is a programmer error the implementation
/// aborts on rather than silently queuing.
pub trait Endpoint: Send + Sync {
    /// Begins an asynchronous read. `on_read` fires exactly once, from engine-owned
    /// executor context, with whatever bytes were available (possibly fewer than a
    /// caller-supplied hint, consistent with a single `recv`).
    fn read(&self, on_read: OnRead);

    /// Begins an asynchronous write of `data`. `on_writable` fires exactly once after
    /// every byte has been accepted by the OS send buffer or the write has failed.
    fn write(&self, data: SliceBuffer, on_writable: OnWritable);

    /// Requests a best-effort close. Any outstanding read/write callback still fires,
    /// carrying a `Cancelled` status if it had not already completed.
    fn close(&self);

    fn local_address(&self) -> ResolvedAddress;

    fn peer_address(&self) -> ResolvedAddress;
}
