use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;

use crate::cell::{SettleCell, SettleError};
use crate::exec::ExecutorRef;

/// A write-once container for the eventual outcome of an asynchronous
/// computation.
///
/// A promise is settled exactly once, either fulfilled with a `T` or failed
/// with an `E`. Cloning a promise shares the same underlying cell, so any
/// number of consumers may chain off the same upstream; each receives its
/// own clone of the outcome.
///
/// Every chaining operator takes the execution context its handler runs on
/// as an explicit [`ExecutorRef`]; there is no ambient default context.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use promise_chain::{exec::Immediate, ExecutorRef, Promise};
///
/// let exec: ExecutorRef = Arc::new(Immediate);
/// let doubled = Promise::<i32, String>::resolve(21).map(&exec, |v| v * 2);
/// assert_eq!(doubled.wait(), Ok(42));
/// ```
pub struct Promise<T, E> {
    pub(crate) cell: Arc<SettleCell<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// The settle handle for a pending [`Promise`].
///
/// Both transitions report a second settlement attempt as
/// [`SettleError::AlreadySettled`] instead of touching the delivered
/// outcome.
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
/// use std::thread;
///
/// let (promise, producer) = Promise::<String, String>::pending();
/// let worker = thread::spawn(move || {
///     producer.resolve("hi".into()).unwrap();
/// });
/// worker.join().unwrap();
/// assert_eq!(promise.wait(), Ok("hi".into()));
/// ```
pub struct Producer<T, E> {
    cell: Arc<SettleCell<T, E>>,
}

impl<T, E> Clone for Producer<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> Producer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Fulfill the promise with `value`, delivering it to every subscriber.
    pub fn resolve(&self, value: T) -> Result<(), SettleError> {
        self.cell.fulfill(value)
    }

    /// Fail the promise with `error`, delivering it to every subscriber.
    pub fn reject(&self, error: E) -> Result<(), SettleError> {
        self.cell.fail(error)
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A still-pending promise together with its settle handle.
    pub fn pending() -> (Self, Producer<T, E>) {
        let cell = Arc::new(SettleCell::new());
        (
            Self {
                cell: Arc::clone(&cell),
            },
            Producer { cell },
        )
    }

    /// Build a promise from an executor closure, invoked synchronously with
    /// the settle handle before `new` returns.
    pub fn new(executor: impl FnOnce(Producer<T, E>)) -> Self {
        let (promise, producer) = Self::pending();
        executor(producer);
        promise
    }

    /// An already fulfilled promise.
    pub fn resolve(value: T) -> Self {
        Self::new(move |producer| {
            let _ = producer.resolve(value);
        })
    }

    /// An already failed promise.
    pub fn reject(error: E) -> Self {
        Self::new(move |producer| {
            let _ = producer.reject(error);
        })
    }

    /// Whether the promise has left the pending state.
    pub fn is_settled(&self) -> bool {
        self.cell.is_settled()
    }

    /// Run `on_fulfill` on `exec` once the value is known; the derived
    /// promise fulfills with `()` afterwards. A rejection skips the handler
    /// and is forwarded to the derived promise unchanged.
    pub fn then<F>(&self, exec: &ExecutorRef, on_fulfill: F) -> Promise<(), E>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let forward = producer.clone();
        let exec = Arc::clone(exec);
        self.cell.subscribe(
            move |value| {
                exec.execute(Box::new(move || {
                    on_fulfill(value);
                    let _ = producer.resolve(());
                }));
            },
            move |error| {
                let _ = forward.reject(error);
            },
        );
        next
    }

    /// Two-handler subscription. Fulfillment runs `on_fulfill` on `exec` and
    /// then fulfills the derived promise with `()`. A rejection runs
    /// `on_reject` on `exec` and is thereby consumed: the derived promise
    /// stays pending.
    pub fn then_handle<F, G>(&self, exec: &ExecutorRef, on_fulfill: F, on_reject: G) -> Promise<(), E>
    where
        F: FnOnce(T) + Send + 'static,
        G: FnOnce(E) + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let exec = Arc::clone(exec);
        let exec_err = Arc::clone(&exec);
        self.cell.subscribe(
            move |value| {
                exec.execute(Box::new(move || {
                    on_fulfill(value);
                    let _ = producer.resolve(());
                }));
            },
            move |error| {
                exec_err.execute(Box::new(move || {
                    on_reject(error);
                }));
            },
        );
        next
    }

    /// Flat-map: run `f` on `exec` and adopt the promise it returns. A
    /// rejection of the receiver is forwarded unchanged without running `f`.
    pub fn and_then<U, F>(&self, exec: &ExecutorRef, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U, E> + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let forward = producer.clone();
        let exec = Arc::clone(exec);
        self.cell.subscribe(
            move |value| {
                exec.execute(Box::new(move || {
                    f(value).pipe_into(producer);
                }));
            },
            move |error| {
                let _ = forward.reject(error);
            },
        );
        next
    }

    /// Transform the fulfilled value on `exec`; rejections pass through.
    pub fn map<U, F>(&self, exec: &ExecutorRef, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.try_map(exec, move |value| Ok(f(value)))
    }

    /// Like [`map`](Self::map), but the transform may fail: an `Err` from
    /// `f` fails the derived promise, bridging synchronous failures into
    /// the asynchronous error channel.
    pub fn try_map<U, F>(&self, exec: &ExecutorRef, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let forward = producer.clone();
        let exec = Arc::clone(exec);
        self.cell.subscribe(
            move |value| {
                exec.execute(Box::new(move || match f(value) {
                    Ok(mapped) => {
                        let _ = producer.resolve(mapped);
                    }
                    Err(error) => {
                        let _ = producer.reject(error);
                    }
                }));
            },
            move |error| {
                let _ = forward.reject(error);
            },
        );
        next
    }

    /// Selective error recovery. `select` is the tag check over the error
    /// domain: returning `Some` runs `handler` on `exec` with the matched
    /// kind and fulfills the derived promise with its value; returning
    /// `None` forwards the original error unchanged so an outer handler can
    /// try. Fulfillment passes through untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use promise_chain::{exec::Immediate, ExecutorRef, Promise};
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// enum FetchError { Timeout(u32), Offline }
    ///
    /// let exec: ExecutorRef = Arc::new(Immediate);
    /// let recovered = Promise::<i32, FetchError>::reject(FetchError::Timeout(3))
    ///     .catch(
    ///         &exec,
    ///         |e| match e {
    ///             FetchError::Timeout(n) => Some(*n),
    ///             _ => None,
    ///         },
    ///         |retries| retries as i32,
    ///     );
    /// assert_eq!(recovered.wait(), Ok(3));
    /// ```
    pub fn catch<K, S, F>(&self, exec: &ExecutorRef, select: S, handler: F) -> Promise<T, E>
    where
        K: Send + 'static,
        S: FnOnce(&E) -> Option<K> + Send + 'static,
        F: FnOnce(K) -> T + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let pass = producer.clone();
        let exec = Arc::clone(exec);
        self.cell.subscribe(
            move |value| {
                let _ = pass.resolve(value);
            },
            move |error| match select(&error) {
                Some(matched) => {
                    exec.execute(Box::new(move || {
                        let _ = producer.resolve(handler(matched));
                    }));
                }
                None => {
                    let _ = producer.reject(error);
                }
            },
        );
        next
    }

    /// Like [`catch`](Self::catch), but the handler produces a promise to
    /// adopt, allowing asynchronous recovery.
    pub fn catch_chain<K, S, F>(&self, exec: &ExecutorRef, select: S, handler: F) -> Promise<T, E>
    where
        K: Send + 'static,
        S: FnOnce(&E) -> Option<K> + Send + 'static,
        F: FnOnce(K) -> Promise<T, E> + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let pass = producer.clone();
        let exec = Arc::clone(exec);
        self.cell.subscribe(
            move |value| {
                let _ = pass.resolve(value);
            },
            move |error| match select(&error) {
                Some(matched) => {
                    exec.execute(Box::new(move || {
                        handler(matched).pipe_into(producer);
                    }));
                }
                None => {
                    let _ = producer.reject(error);
                }
            },
        );
        next
    }

    /// Run `handler` on `exec` whichever way the promise settles, then pass
    /// the outcome through unchanged. A rejection is never swallowed here.
    pub fn finally<F>(&self, exec: &ExecutorRef, handler: F) -> Promise<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let fail_side = producer.clone();
        // Only one branch ever fires, so they can share the one-shot handler.
        let handler = Arc::new(Mutex::new(Some(handler)));
        let handler_err = Arc::clone(&handler);
        let exec = Arc::clone(exec);
        let exec_err = Arc::clone(&exec);
        self.cell.subscribe(
            move |value| {
                exec.execute(Box::new(move || {
                    if let Some(h) = handler.lock().take() {
                        h();
                    }
                    let _ = producer.resolve(value);
                }));
            },
            move |error| {
                exec_err.execute(Box::new(move || {
                    if let Some(h) = handler_err.lock().take() {
                        h();
                    }
                    let _ = fail_side.reject(error);
                }));
            },
        );
        next
    }

    /// Like [`finally`](Self::finally), but the handler produces a promise
    /// whose outcome the derived promise adopts, replacing the receiver's
    /// outcome entirely.
    pub fn finally_chain<U, F>(&self, exec: &ExecutorRef, handler: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce() -> Promise<U, E> + Send + 'static,
    {
        let (next, producer) = Promise::pending();
        let fail_side = producer.clone();
        let handler = Arc::new(Mutex::new(Some(handler)));
        let handler_err = Arc::clone(&handler);
        let exec = Arc::clone(exec);
        let exec_err = Arc::clone(&exec);
        self.cell.subscribe(
            move |_value| {
                exec.execute(Box::new(move || {
                    if let Some(h) = handler.lock().take() {
                        h().pipe_into(producer);
                    }
                }));
            },
            move |_error| {
                exec_err.execute(Box::new(move || {
                    if let Some(h) = handler_err.lock().take() {
                        h().pipe_into(fail_side);
                    }
                }));
            },
        );
        next
    }

    /// Forward this promise's eventual outcome into `producer` (outcome
    /// adoption for the promise-returning operators).
    pub(crate) fn pipe_into(&self, producer: Producer<T, E>) {
        let fail_side = producer.clone();
        self.cell.subscribe(
            move |value| {
                let _ = producer.resolve(value);
            },
            move |error| {
                let _ = fail_side.reject(error);
            },
        );
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.cell.state_name())
            .finish()
    }
}

impl<T, E> Future for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.poll_settled(cx.waker())
    }
}
