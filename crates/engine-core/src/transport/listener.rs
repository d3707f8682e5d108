//! The Listener component: accepting inbound connections.

use std::sync::Arc;

use crate::address::ResolvedAddress;
use crate::error::{Result, Status};
use crate::transport::endpoint::Endpoint;

/// Invoked once per accepted connection, for as long as the listener is open.
pub type AcceptCallback = Arc<dyn Fn(Arc<dyn Endpoint>, ResolvedAddress) + Send + Sync>;

/// Invoked exactly once, when the listener is torn down (explicit [`Listener::stop`] or
/// destruction, whichever comes first), with a terminal status.
pub type ShutdownCallback = Box<dyn FnOnce(Status) + Send>;

/// A bound server socket accepting connections.
pub trait Listener: Send + Sync {
    /// Begins accepting connections, invoking `on_accept` for each one until
    /// [`Listener::stop`] is called. Unlike `Endpoint::read`, accept is inherently
    /// repeated rather than one-shot, so there is no single outstanding-operation rule
    /// here. `on_shutdown` fires exactly once, whether the listener is stopped
    /// explicitly or torn down by destruction.
    fn start(&self, on_accept: AcceptCallback, on_shutdown: ShutdownCallback) -> Result<()>;

    /// Stops accepting new connections and fires `on_shutdown` if it hasn't already.
    /// Connections already accepted are unaffected.
    fn stop(&self);

    fn local_address(&self) -> ResolvedAddress;
}
