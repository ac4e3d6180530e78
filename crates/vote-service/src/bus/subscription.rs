//! Subscription handle returned to observers

use futures_util::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use vote_core::Versioned;

/// Runs its release hook on drop
pub(crate) struct ReleaseGuard(Option<Box<dyn FnOnce() + Send + Sync>>);

impl ReleaseGuard {
    pub(crate) fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Some(Box::new(release)))
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

/// Live view of one versioned value
///
/// Yields the current value first, then every newer one. Values are
/// coalesced: a slow observer skips intermediate versions but never sees
/// an older version after a newer one. Dropping the subscription releases
/// its registration on the bus.
pub struct Subscription<T> {
    observer_id: u64,
    // Declared before the guard so the receiver is gone when the release
    // hook checks for remaining observers.
    stream: Pin<Box<dyn Stream<Item = Versioned<T>> + Send>>,
    _guard: ReleaseGuard,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        observer_id: u64,
        receiver: watch::Receiver<Option<Versioned<T>>>,
        guard: ReleaseGuard,
    ) -> Self {
        let stream = WatchStream::new(receiver).filter_map(std::future::ready);
        Self {
            observer_id,
            stream: Box::pin(stream),
            _guard: guard,
        }
    }
}

impl<T> Subscription<T> {
    /// Bus-assigned id of this observer
    pub fn observer_id(&self) -> u64 {
        self.observer_id
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Versioned<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("observer_id", &self.observer_id)
            .finish_non_exhaustive()
    }
}
