//! Tokio-backed concrete implementation of the async I/O engine: TCP endpoint,
//! listener, connector, a `hickory-resolver`-backed DNS resolver, and the task/timer
//! service, assembled behind the [`Engine`] façade.

mod connector;
mod dns;
pub mod engine;
mod endpoint;
mod error;
mod listener;
mod task;
mod util;

pub use connector::TcpConnector;
pub use dns::HickoryDnsResolver;
pub use endpoint::TcpEndpoint;
pub use engine::Engine;
pub use listener::TcpListenerImpl;
pub use task::TokioTaskScheduler;
