//! Bridges between plain computations, threads and promises.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::exec::ExecutorRef;
use crate::promise::Promise;

/// Schedule `work` on `exec` and capture its outcome in a promise.
///
/// An `Err` from `work` becomes the promise's rejection instead of
/// surfacing to the caller. Pass a [`ThreadPool`](crate::ThreadPool) for
/// background work or a [`SerialExecutor`](crate::SerialExecutor) to run on
/// the serial context.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use promise_chain::{run_on, ExecutorRef, ThreadPool};
///
/// let pool: ExecutorRef = Arc::new(ThreadPool::new(2));
/// let answer = run_on(&pool, || Ok::<_, String>(6 * 7));
/// assert_eq!(answer.wait(), Ok(42));
/// ```
pub fn run_on<T, E, F>(exec: &ExecutorRef, work: F) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let (promise, producer) = Promise::pending();
    exec.execute(Box::new(move || match work() {
        Ok(value) => {
            let _ = producer.resolve(value);
        }
        Err(error) => {
            let _ = producer.reject(error);
        }
    }));
    promise
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Block the calling thread until the promise settles, then return the
    /// value or re-surface the rejection.
    ///
    /// This is the one synchronous wait point in the crate; everything else
    /// only ever enqueues.
    pub fn wait(&self) -> Result<T, E> {
        #[allow(clippy::type_complexity)]
        let gate: Arc<(Mutex<Option<Result<T, E>>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let on_value = Arc::clone(&gate);
        let on_error = Arc::clone(&gate);
        self.cell.subscribe(
            move |value| {
                let (slot, signal) = &*on_value;
                *slot.lock() = Some(Ok(value));
                signal.notify_all();
            },
            move |error| {
                let (slot, signal) = &*on_error;
                *slot.lock() = Some(Err(error));
                signal.notify_all();
            },
        );

        let (slot, signal) = &*gate;
        let mut outcome = slot.lock();
        loop {
            if let Some(result) = outcome.take() {
                return result;
            }
            signal.wait(&mut outcome);
        }
    }
}
