//! Fan-out/fan-in: derive one promise from many.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::promise::Promise;

/// Bookkeeping for one `all` invocation: indexed result slots, a settled
/// counter and the first-rejection latch, all behind one lock.
struct AllState<T> {
    results: Vec<Option<T>>,
    settled: usize,
    rejected: bool,
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wait for every input to fulfill and collect the values in input
    /// order, regardless of completion order. The first rejection fails the
    /// result immediately; anything the other inputs do afterwards is
    /// observed and discarded. An empty input fulfills at once with an
    /// empty vector.
    pub fn all(promises: Vec<Promise<T, E>>) -> Promise<Vec<T>, E> {
        let (next, producer) = Promise::pending();
        let total = promises.len();
        if total == 0 {
            let _ = producer.resolve(Vec::new());
            return next;
        }

        let state = Arc::new(Mutex::new(AllState {
            results: vec![None; total],
            settled: 0,
            rejected: false,
        }));

        for (index, promise) in promises.iter().enumerate() {
            let slot_state = Arc::clone(&state);
            let latch_state = Arc::clone(&state);
            let on_complete = producer.clone();
            let on_error = producer.clone();
            promise.cell.subscribe(
                move |value| {
                    let gathered = {
                        let mut state = slot_state.lock();
                        if state.rejected {
                            return;
                        }
                        state.results[index] = Some(value);
                        state.settled += 1;
                        if state.settled < total {
                            return;
                        }
                        // Every slot is filled once the counter hits total.
                        state.results.drain(..).collect::<Option<Vec<T>>>()
                    };
                    if let Some(results) = gathered {
                        let _ = on_complete.resolve(results);
                    }
                },
                move |error| {
                    {
                        let mut state = latch_state.lock();
                        if state.rejected {
                            return;
                        }
                        state.rejected = true;
                    }
                    let _ = on_error.reject(error);
                },
            );
        }
        next
    }

    /// The first input to settle, either way, decides the result; every
    /// later settlement is discarded. An empty input yields a promise that
    /// never settles.
    pub fn race(promises: Vec<Promise<T, E>>) -> Promise<T, E> {
        let (next, producer) = Promise::pending();
        let finished = Arc::new(AtomicBool::new(false));

        for promise in &promises {
            let won = Arc::clone(&finished);
            let lost = Arc::clone(&finished);
            let on_win = producer.clone();
            let on_lose = producer.clone();
            promise.cell.subscribe(
                move |value| {
                    if !won.swap(true, Ordering::SeqCst) {
                        let _ = on_win.resolve(value);
                    }
                },
                move |error| {
                    if !lost.swap(true, Ordering::SeqCst) {
                        let _ = on_lose.reject(error);
                    }
                },
            );
        }
        next
    }
}
