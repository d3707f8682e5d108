//! The Connector component: initiating outbound connections.

use std::sync::Arc;

use crate::contract::{Cancellation, Deadline};
use crate::error::Status;
use crate::transport::endpoint::Endpoint;

/// Invoked once a connect attempt succeeds or fails.
pub type ConnectCallback = Box<dyn FnOnce(Status, Option<Arc<dyn Endpoint>>) + Send>;

/// Initiates outbound connections.
pub trait Connector: Send + Sync {
    /// Begins connecting to `target`. `on_connect` fires exactly once, with
    /// `Status::Ok` and a live endpoint on success, or a failure status and `None`.
    ///
    /// The attempt is abandoned (firing `Status::Cancelled`) if `cancellation` is
    /// cancelled, or (firing `Status::DeadlineExceeded`) if `deadline` elapses, before a
    /// connection completes.
    fn connect(
        &self,
        target: &str,
        deadline: Deadline,
        cancellation: Cancellation,
        on_connect: ConnectCallback,
    );
}
