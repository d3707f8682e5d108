//! TCP-backed [`Endpoint`]: a Tokio `TcpStream` behind a `tokio::sync::Mutex`, with a
//! plain `AtomicBool` guarding the one-outstanding-read/one-outstanding-write rule
//! instead of letting a second concurrent call queue silently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_core::buffer::{Slice, SliceBuffer};
use engine_core::clock::{Clock, MonotonicTimePoint, SystemClock};
use engine_core::error::abort_on_invalid_usage;
use engine_core::idle_tracker::{IdleAction, IdleTracker};
use engine_core::task::{TaskPriority, TaskScheduler};
use engine_core::transport::endpoint::{Endpoint, OnRead, OnWritable};
use engine_core::{ResolvedAddress, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

const READ_CHUNK: usize = 64 * 1024;

struct Inner {
    stream: AsyncMutex<TcpStream>,
    /// A duplicated raw socket used purely for synchronous shutdown, so `close()` can
    /// always interrupt the connection even while a read or write task holds `stream`'s
    /// lock across an `.await`.
    shutdown_handle: socket2::Socket,
    local: ResolvedAddress,
    peer: ResolvedAddress,
    read_outstanding: AtomicBool,
    write_outstanding: AtomicBool,
    closed: AtomicBool,
    pending_read: Mutex<Option<OnRead>>,
    pending_write: Mutex<Option<OnWritable>>,
    idle: IdleTracker,
    idle_timeout: Duration,
    scheduler: Arc<dyn TaskScheduler>,
    clock: SystemClock,
}

/// The whole endpoint is a thin handle around [`Inner`]: spawned read/write tasks clone
/// the `Arc<Inner>` rather than borrowing `&self`, so they outlive a single `read`/
/// `write` call without needing a lifetime-erasing pointer cast.
pub struct TcpEndpoint {
    inner: Arc<Inner>,
    runtime: tokio::runtime::Handle,
}

impl TcpEndpoint {
    pub fn new(
        stream: TcpStream,
        runtime: tokio::runtime::Handle,
        scheduler: Arc<dyn TaskScheduler>,
        idle_timeout: Duration,
    ) -> std::io::Result<Arc<Self>> {
        let local = ResolvedAddress::from(stream.local_addr()?);
        let peer = ResolvedAddress::from(stream.peer_addr()?);
        let shutdown_handle = socket2::SockRef::from(&stream).try_clone()?;
        Ok(Arc::new(TcpEndpoint {
            inner: Arc::new(Inner {
                stream: AsyncMutex::new(stream),
                shutdown_handle,
                local,
                peer,
                read_outstanding: AtomicBool::new(false),
                write_outstanding: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                pending_read: Mutex::new(None),
                pending_write: Mutex::new(None),
                idle: IdleTracker::new(),
                idle_timeout,
                scheduler,
                clock: SystemClock::default(),
            }),
            runtime,
        }))
    }

    pub fn idle_tracker(&self) -> &IdleTracker {
        &self.inner.idle
    }
}

/// Settles any outstanding read/write with `Cancelled` and shuts the socket down.
/// Idempotent: only the first caller (whether `close()` or the idle timer) does
/// anything.
fn close_inner(inner: &Arc<Inner>) {
    if inner.closed.swap(true, Ordering::AcqRel) {
        return;
    }
    if let Some(on_read) = inner.pending_read.lock().unwrap().take() {
        on_read(
            Status::Cancelled("endpoint closed with a pending read".into()),
            SliceBuffer::new(),
        );
    }
    if let Some(on_writable) = inner.pending_write.lock().unwrap().take() {
        on_writable(Status::Cancelled("endpoint closed with a pending write".into()));
    }
    let _ = inner.shutdown_handle.shutdown(std::net::Shutdown::Both);
}

/// Arms (or re-arms) the idle timer for `idle_timeout` past `anchor`, scheduling the
/// fire through the same `TaskScheduler` the rest of the engine uses for deadlines.
fn arm_idle_timer(inner: &Arc<Inner>, anchor: MonotonicTimePoint) {
    let Some(deadline) = anchor.checked_add(inner.idle_timeout) else {
        return;
    };
    let scheduled = inner.clone();
    let _ = inner.scheduler.run_at(
        deadline,
        TaskPriority::Idle,
        Box::new(move || on_idle_timer_fire(scheduled)),
    );
}

/// Dispatches the action returned by `IdleTracker::on_call_end`.
fn handle_idle_action(inner: &Arc<Inner>, action: IdleAction) {
    match action {
        IdleAction::None => {}
        IdleAction::ArmTimer(anchor) => arm_idle_timer(inner, anchor),
        other => unreachable!("on_call_end must not return {other:?}"),
    }
}

/// Runs when a scheduled idle timer fires, closing the endpoint for idleness or
/// re-arming from the last recorded idle point, per `IdleTracker::on_timer_fire`.
fn on_idle_timer_fire(inner: Arc<Inner>) {
    match inner.idle.on_timer_fire() {
        IdleAction::CloseForIdle => {
            tracing::debug!(local = %inner.local, peer = %inner.peer, "closing endpoint for idleness");
            close_inner(&inner);
            inner.idle.finish_close();
        }
        IdleAction::RearmTimer(anchor) => {
            arm_idle_timer(&inner, anchor);
            inner.idle.finish_rearm();
        }
        IdleAction::None => {}
        other => unreachable!("on_timer_fire must not return {other:?}"),
    }
}

impl Endpoint for TcpEndpoint {
    fn read(&self, on_read: OnRead) {
        abort_on_invalid_usage(
            !self.inner.read_outstanding.swap(true, Ordering::AcqRel),
            "Endpoint::read called while a read was already outstanding",
        );

        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.read_outstanding.store(false, Ordering::Release);
            on_read(Status::Cancelled("endpoint already closed".into()), SliceBuffer::new());
            return;
        }
        *self.inner.pending_read.lock().unwrap() = Some(on_read);

        let action = self.inner.idle.on_call_start();
        debug_assert_eq!(action, IdleAction::None, "read start never arms a timer directly");

        let inner = self.inner.clone();
        self.runtime.spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            let result = {
                let mut guard = inner.stream.lock().await;
                guard.read(&mut buf).await
            };
            inner.read_outstanding.store(false, Ordering::Release);
            let now = inner.clock.now();
            handle_idle_action(&inner, inner.idle.on_call_end(now));

            let Some(on_read) = inner.pending_read.lock().unwrap().take() else {
                // `close()` already settled this read with `Cancelled`.
                return;
            };
            match result {
                Ok(0) => {
                    close_inner(&inner);
                    on_read(
                        Status::Unreachable("connection closed by peer".into()),
                        SliceBuffer::new(),
                    );
                }
                Ok(n) => {
                    let mut buffer = SliceBuffer::new();
                    buf.truncate(n);
                    buffer.push_back(Slice::from(buf));
                    on_read(Status::Ok, buffer);
                }
                Err(err) => {
                    close_inner(&inner);
                    on_read(crate::error::io_error_to_status(err), SliceBuffer::new());
                }
            }
        });
    }

    fn write(&self, data: SliceBuffer, on_writable: OnWritable) {
        abort_on_invalid_usage(
            !self.inner.write_outstanding.swap(true, Ordering::AcqRel),
            "Endpoint::write called while a write was already outstanding",
        );

        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.write_outstanding.store(false, Ordering::Release);
            on_writable(Status::Cancelled("endpoint already closed".into()));
            return;
        }
        *self.inner.pending_write.lock().unwrap() = Some(on_writable);

        let action = self.inner.idle.on_call_start();
        debug_assert_eq!(action, IdleAction::None);

        let inner = self.inner.clone();
        self.runtime.spawn(async move {
            let result = {
                let mut guard = inner.stream.lock().await;
                let mut result = Ok(());
                for chunk in data.chunks() {
                    if let Err(err) = guard.write_all(chunk).await {
                        result = Err(err);
                        break;
                    }
                }
                result
            };
            inner.write_outstanding.store(false, Ordering::Release);
            let now = inner.clock.now();
            handle_idle_action(&inner, inner.idle.on_call_end(now));

            let Some(on_writable) = inner.pending_write.lock().unwrap().take() else {
                // `close()` already settled this write with `Cancelled`.
                return;
            };
            match result {
                Ok(()) => on_writable(Status::Ok),
                Err(err) => {
                    close_inner(&inner);
                    on_writable(crate::error::io_error_to_status(err));
                }
            }
        });
    }

    fn close(&self) {
        close_inner(&self.inner);
    }

    fn local_address(&self) -> ResolvedAddress {
        self.inner.local
    }

    fn peer_address(&self) -> ResolvedAddress {
        self.inner.peer
    }
}
