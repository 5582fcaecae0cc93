// ── Observable cell ──
//
// A shared value with push-based change notification via a `watch`
// channel. Readers and subscribers are public; writers are crate-private
// so that an entity's tree and flags are only mutated by the entity.

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::watch;

use crate::stream::ObservableStream;

/// A cheaply cloneable handle to a reactive value.
///
/// Clones share the same underlying cell: a write through any of them is
/// seen by every reader and wakes every subscriber.
pub struct Observable<T> {
    inner: Arc<watch::Sender<T>>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self {
            inner: Arc::new(tx),
        }
    }

    /// Run `f` against the current value without cloning it.
    ///
    /// The cell is read-locked for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Subscribe to future writes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.subscribe()
    }

    /// `true` if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle to this cell.
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Address of the shared cell, usable as an identity key.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner).addr()
    }

    /// Replace the value and notify subscribers.
    pub(crate) fn set(&self, value: T) {
        self.inner.send_replace(value);
    }

    /// Mutate in place; subscribers are notified only if `f` returns `true`.
    pub(crate) fn modify(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.inner.send_if_modified(f)
    }
}

impl<T: Clone> Observable<T> {
    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Subscription handle with snapshot access and async change waiting.
    pub fn stream(&self) -> ObservableStream<T> {
        ObservableStream::new(self.subscribe())
    }
}

impl<T: PartialEq> Observable<T> {
    /// Write `value`, notifying subscribers only if it differs from the
    /// current one. Returns whether a change happened.
    pub(crate) fn replace_if_changed(&self, value: T) -> bool {
        self.modify(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable").field(&*self.inner.borrow()).finish()
    }
}

/// A non-owning reference to an [`Observable`].
pub struct WeakObservable<T> {
    inner: Weak<watch::Sender<T>>,
}

impl<T> WeakObservable<T> {
    /// Recover the cell, or `None` if every strong handle was dropped.
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.inner.upgrade().map(|inner| Observable { inner })
    }
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakObservable(..)")
    }
}

/// A lifecycle flag.
pub type Flag = Observable<bool>;
