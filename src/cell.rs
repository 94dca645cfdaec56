use std::mem;
use std::task::{Poll, Waker};

use parking_lot::Mutex;
use thiserror::Error;

/// Returned when `resolve` or `reject` is called on an already settled
/// promise. A second settlement is a producer bug: the first outcome has
/// potentially been delivered to subscribers already, so it is kept and the
/// late one is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettleError {
    /// The promise has already been fulfilled or failed.
    #[error("promise already settled")]
    AlreadySettled,
}

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Failed(E),
}

struct Inner<T, E> {
    state: State<T, E>,
    on_fulfill: Vec<Box<dyn FnOnce(T) + Send>>,
    on_reject: Vec<Box<dyn FnOnce(E) + Send>>,
    wakers: Vec<Waker>,
}

/// The write-once box behind every promise: one state slot plus the callback
/// queues that are drained exactly once, at settlement.
///
/// Callbacks and wakers are always invoked after the lock is released, so a
/// subscriber may synchronously chain back into the same cell.
pub(crate) struct SettleCell<T, E> {
    inner: Mutex<Inner<T, E>>,
}

impl<T, E> SettleCell<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Pending,
                on_fulfill: Vec::new(),
                on_reject: Vec::new(),
                wakers: Vec::new(),
            }),
        }
    }

    /// Transition `Pending` → `Fulfilled` and drain the fulfill queue, each
    /// callback receiving its own clone of the value. The reject queue is
    /// cleared as well; it can never fire now.
    pub(crate) fn fulfill(&self, value: T) -> Result<(), SettleError> {
        let (callbacks, wakers) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if !matches!(inner.state, State::Pending) {
                drop(guard);
                tracing::error!("fulfill called on a settled promise, outcome unchanged");
                return Err(SettleError::AlreadySettled);
            }
            inner.state = State::Fulfilled(value.clone());
            inner.on_reject.clear();
            (
                mem::take(&mut inner.on_fulfill),
                mem::take(&mut inner.wakers),
            )
        };
        for callback in callbacks {
            callback(value.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Transition `Pending` → `Failed`, symmetric to [`fulfill`](Self::fulfill).
    pub(crate) fn fail(&self, error: E) -> Result<(), SettleError> {
        let (callbacks, wakers) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if !matches!(inner.state, State::Pending) {
                drop(guard);
                tracing::error!("reject called on a settled promise, outcome unchanged");
                return Err(SettleError::AlreadySettled);
            }
            inner.state = State::Failed(error.clone());
            inner.on_fulfill.clear();
            (
                mem::take(&mut inner.on_reject),
                mem::take(&mut inner.wakers),
            )
        };
        for callback in callbacks {
            callback(error.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Register a callback pair. While pending both are queued; exactly one
    /// of them will fire at settlement. On an already settled cell the
    /// matching callback is invoked right away, outside the lock.
    pub(crate) fn subscribe<F, G>(&self, on_fulfill: F, on_reject: G)
    where
        F: FnOnce(T) + Send + 'static,
        G: FnOnce(E) + Send + 'static,
    {
        let immediate = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.state {
                State::Pending => {
                    inner.on_fulfill.push(Box::new(on_fulfill));
                    inner.on_reject.push(Box::new(on_reject));
                    return;
                }
                State::Fulfilled(ref value) => Ok(value.clone()),
                State::Failed(ref error) => Err(error.clone()),
            }
        };
        match immediate {
            Ok(value) => on_fulfill(value),
            Err(error) => on_reject(error),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        !matches!(self.inner.lock().state, State::Pending)
    }

    pub(crate) fn state_name(&self) -> &'static str {
        match self.inner.lock().state {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Failed(_) => "failed",
        }
    }

    /// Future bridge: ready with a clone of the outcome once settled,
    /// otherwise parks the waker with the pending callbacks.
    pub(crate) fn poll_settled(&self, waker: &Waker) -> Poll<Result<T, E>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Pending => {
                inner.wakers.push(waker.clone());
                Poll::Pending
            }
            State::Fulfilled(ref value) => Poll::Ready(Ok(value.clone())),
            State::Failed(ref error) => Poll::Ready(Err(error.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fulfill_drains_queued_callbacks_once() {
        let cell: SettleCell<i32, String> = SettleCell::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            cell.subscribe(
                move |value| {
                    assert_eq!(value, 7);
                    hits.fetch_add(1, Ordering::SeqCst);
                },
                |_| panic!("reject queue must not fire on fulfill"),
            );
        }
        assert!(cell.fulfill(7).is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn double_settle_is_refused_and_keeps_first_outcome() {
        let cell: SettleCell<i32, String> = SettleCell::new();
        assert!(cell.fulfill(1).is_ok());
        assert_eq!(cell.fulfill(2), Err(SettleError::AlreadySettled));
        assert_eq!(cell.fail("late".into()), Err(SettleError::AlreadySettled));

        let seen = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&seen);
        cell.subscribe(
            move |value| {
                assert_eq!(value, 1);
                observed.fetch_add(1, Ordering::SeqCst);
            },
            |_| panic!("cell is fulfilled"),
        );
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_clears_fulfill_queue() {
        let cell: SettleCell<i32, String> = SettleCell::new();
        let rejections = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&rejections);
        cell.subscribe(
            |_| panic!("fulfill queue must not fire on fail"),
            move |error| {
                assert_eq!(error, "boom");
                counted.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(cell.fail("boom".into()).is_ok());
        assert_eq!(rejections.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state_name(), "failed");
    }

    #[test]
    fn late_subscription_fires_immediately() {
        let cell: SettleCell<&'static str, String> = SettleCell::new();
        cell.fulfill("done").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        cell.subscribe(
            move |value| {
                assert_eq!(value, "done");
                counted.fetch_add(1, Ordering::SeqCst);
            },
            |_| panic!("cell is fulfilled"),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
