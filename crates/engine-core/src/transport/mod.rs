//! Runtime-agnostic transport contracts: Endpoint, Listener, Connector.
//!
//! These traits describe a callback-based transport surface, deliberately
//! close to gRPC-core's `EventEngine` interface rather than an `async fn`-returning
//! one: exactly one outstanding read and one outstanding write may be in flight on an
//! `Endpoint` at a time, enforced by the concrete implementation in
//! `engine-transport-tcp` via [`crate::error::abort_on_invalid_usage`].

pub mod connector;
pub mod endpoint;
pub mod listener;

pub use connector::{ConnectCallback, Connector};
pub use endpoint::{Endpoint, OnRead, OnWritable};
pub use listener::{AcceptCallback, Listener, ShutdownCallback};
