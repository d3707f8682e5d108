//! Small helpers shared by the endpoint, listener, and connector implementations.

use std::net::SocketAddr;

use engine_core::ResolvedAddress;

/// Converts a [`ResolvedAddress`] into the `std::net` form Tokio's socket APIs expect.
/// Returns `None` for the `Unix` variant; callers that support Unix sockets handle that
/// case separately.
pub fn to_socket_addr(addr: ResolvedAddress) -> Option<SocketAddr> {
    SocketAddr::try_from(addr).ok()
}

/// Spawns a detached task that races `deadline` against `cancellation`, invoking
/// `on_abort` at most once if either fires before `completed` is set. Used by
/// `Connector::connect` to unblock a pending connect attempt without Tokio cancelling
/// the underlying future directly.
pub fn race_deadline_and_cancellation(
    runtime: &tokio::runtime::Handle,
    deadline: engine_core::Deadline,
    cancellation: engine_core::Cancellation,
    clock: &engine_core::clock::SystemClock,
    on_abort: impl FnOnce(engine_core::Status) + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    use engine_core::clock::Clock;
    let remaining = deadline.remaining(clock.now());
    runtime.spawn(async move {
        match remaining {
            Some(timeout) => {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        on_abort(engine_core::Status::DeadlineExceeded(
                            "connect deadline exceeded".into(),
                        ));
                    }
                    _ = wait_for_cancellation(&cancellation) => {
                        on_abort(engine_core::Status::Cancelled("connect cancelled".into()));
                    }
                }
            }
            None => {
                wait_for_cancellation(&cancellation).await;
                on_abort(engine_core::Status::Cancelled("connect cancelled".into()));
            }
        }
    })
}

async fn wait_for_cancellation(cancellation: &engine_core::Cancellation) {
    while !cancellation.is_cancelled() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
