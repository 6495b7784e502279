// SPDX-License-Identifier: GPL-3.0-only

use std::future::Future;
use std::io;
use std::os::fd::AsRawFd;
use std::task::{Context, Poll, ready};

use devwatch_types::DeviceEvent;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, info, trace};

use super::source::DeviceSource;
use crate::error::{EventLoopError, MonitorError, MonitorOpenError, SinkError};

type Sink<'a> = Box<dyn FnMut(&DeviceEvent) -> Result<(), SinkError> + 'a>;

/// Handle to a subscription registered with an [`EventLoop`]
///
/// The generation makes a token stale once its subscription is closed,
/// even if the arena slot is later reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorToken {
    index: usize,
    generation: u64,
}

/// One notification that was handed to a sink
#[derive(Debug, Clone)]
pub struct Delivery {
    pub token: MonitorToken,
    pub event: DeviceEvent,
}

struct Subscription<'a, S: DeviceSource> {
    fd: AsyncFd<S>,
    sink: Sink<'a>,
}

struct Slot<'a, S: DeviceSource> {
    generation: u64,
    subscription: Option<Subscription<'a, S>>,
}

/// Single-threaded readiness loop over monitor sources
///
/// Sources are registered with the tokio reactor of the current runtime.
/// Each call to [`turn`](EventLoop::turn) receives and dispatches exactly
/// one notification.
pub struct EventLoop<'a, S: DeviceSource> {
    slots: Vec<Slot<'a, S>>,
    free: Vec<usize>,
    cursor: usize,
}

impl<'a, S: DeviceSource> EventLoop<'a, S> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            cursor: 0,
        }
    }

    /// Number of open subscriptions
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.subscription.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_open(&self, token: MonitorToken) -> bool {
        self.slots
            .get(token.index)
            .is_some_and(|slot| slot.generation == token.generation && slot.subscription.is_some())
    }

    /// Register `source` for readable readiness and route its events to `sink`.
    ///
    /// Must be called from within a tokio runtime. On failure the source is
    /// dropped, releasing the native monitor, before the error is returned.
    ///
    /// # Panics
    ///
    /// Panics if the current runtime was built without its IO driver
    /// (`Builder::enable_io`/`enable_all`). Tokio offers no way to detect
    /// this beforehand, so only a missing runtime maps to
    /// [`MonitorOpenError::NoRuntime`].
    pub fn open_monitor<F>(&mut self, source: S, sink: F) -> Result<MonitorToken, MonitorOpenError>
    where
        F: FnMut(&DeviceEvent) -> Result<(), SinkError> + 'a,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(MonitorOpenError::NoRuntime);
        }

        let raw_fd = source.as_raw_fd();
        let fd = AsyncFd::with_interest(source, Interest::READABLE)
            .map_err(MonitorOpenError::Register)?;

        let subscription = Subscription {
            fd,
            sink: Box::new(sink),
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].subscription = Some(subscription);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    subscription: Some(subscription),
                });
                self.slots.len() - 1
            }
        };

        let token = MonitorToken {
            index,
            generation: self.slots[index].generation,
        };
        info!(?token, fd = raw_fd, "monitor opened");
        Ok(token)
    }

    /// Tear down a subscription.
    ///
    /// The descriptor leaves the reactor before the native monitor is
    /// released, and no sink call for this token can happen once this
    /// returns. Closing a token twice is an error.
    pub fn close(&mut self, token: MonitorToken) -> Result<(), MonitorError> {
        let slot = self
            .slots
            .get_mut(token.index)
            .filter(|slot| slot.generation == token.generation)
            .ok_or(MonitorError::NotOpen(token))?;
        let subscription = slot.subscription.take().ok_or(MonitorError::NotOpen(token))?;

        slot.generation += 1;
        self.free.push(token.index);

        release(token, subscription);
        info!(?token, "monitor closed");
        Ok(())
    }

    /// Wait for one notification and hand it to its sink.
    ///
    /// Cancel safe: a notification is only received in the same poll that
    /// dispatches it. Returns [`EventLoopError::Idle`] when nothing is
    /// registered instead of waiting forever.
    pub async fn turn(&mut self) -> Result<Delivery, EventLoopError> {
        if self.is_empty() {
            return Err(EventLoopError::Idle);
        }

        std::future::poll_fn(|cx| self.poll_dispatch(cx)).await
    }

    /// Drive the loop until `shutdown` resolves or every monitor is closed.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) -> Result<(), EventLoopError> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("event loop shutting down");
                    return Ok(());
                }
                delivery = self.turn() => match delivery {
                    Ok(delivery) => trace!(token = ?delivery.token, action = %delivery.event.action, "delivered"),
                    Err(EventLoopError::Idle) => return Ok(()),
                    Err(error) => return Err(error),
                },
            }

            // Give other tasks on the runtime a chance between notifications.
            tokio::task::yield_now().await;
        }
    }

    fn poll_dispatch(&mut self, cx: &mut Context<'_>) -> Poll<Result<Delivery, EventLoopError>> {
        let len = self.slots.len();

        // Round-robin so one busy socket cannot starve the others.
        for offset in 0..len {
            let index = (self.cursor + offset) % len;
            let slot = &mut self.slots[index];
            let token = MonitorToken {
                index,
                generation: slot.generation,
            };
            let Some(subscription) = slot.subscription.as_mut() else {
                continue;
            };

            let event = match poll_receive(&mut subscription.fd, cx) {
                Poll::Pending => continue,
                Poll::Ready(Err(source)) => {
                    return Poll::Ready(Err(EventLoopError::Io { token, source }));
                }
                Poll::Ready(Ok(event)) => event,
            };

            self.cursor = (index + 1) % len;
            trace!(?token, action = %event.action, syspath = %event.syspath, "dispatching event");

            if let Err(source) = (subscription.sink)(&event) {
                return Poll::Ready(Err(EventLoopError::Sink { token, source }));
            }

            return Poll::Ready(Ok(Delivery { token, event }));
        }

        Poll::Pending
    }
}

impl<S: DeviceSource> Default for EventLoop<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DeviceSource> Drop for EventLoop<'_, S> {
    fn drop(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(subscription) = slot.subscription.take() {
                let token = MonitorToken {
                    index,
                    generation: slot.generation,
                };
                release(token, subscription);
            }
        }
    }
}

/// Deregister from the reactor, then release the source.
fn release<S: DeviceSource>(token: MonitorToken, subscription: Subscription<'_, S>) {
    let Subscription { fd, sink } = subscription;

    let source = fd.into_inner();
    debug!(?token, fd = source.as_raw_fd(), "descriptor deregistered");

    drop(source);
    drop(sink);
    debug!(?token, "native monitor released");
}

fn poll_receive<S: DeviceSource>(
    fd: &mut AsyncFd<S>,
    cx: &mut Context<'_>,
) -> Poll<io::Result<DeviceEvent>> {
    loop {
        let mut guard = ready!(fd.poll_read_ready_mut(cx))?;

        match guard.try_io(|inner| inner.get_mut().receive()) {
            Ok(Err(error)) if error.kind() == io::ErrorKind::Interrupted => continue,
            Ok(result) => return Poll::Ready(result),
            // Readiness was stale and has been cleared; re-arm the waker.
            Err(_would_block) => continue,
        }
    }
}
