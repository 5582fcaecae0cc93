// ── Observable subscriptions ──
//
// Consumer side of an `Observable`: a lifecycle flag, the dirty state or
// one cell of an entity's data tree. Writes coalesce, so a slow reader
// sees the newest value, not every intermediate one.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A reader of one [`Observable`](crate::Observable).
///
/// Keeps the value it last saw in `current()`; `changed()` waits for the
/// owning entity's next write to the cell. Dropping the subscription never
/// affects the cell.
pub struct ObservableStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> ObservableStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The value this subscription last observed.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// What the cell holds right now, without marking it as seen.
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next write and record it as seen.
    /// Returns `None` once every handle to the cell is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }

    /// Turn the subscription into a `Stream` of cell values.
    ///
    /// The first item is whatever the cell holds when polled; after that
    /// one item per burst of writes. The stream ends when the cell is
    /// dropped.
    pub fn into_stream(self) -> ObservableWatchStream<T> {
        ObservableWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` of an observable cell's values.
pub struct ObservableWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for ObservableWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
