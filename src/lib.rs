//! Write-once promises with chaining operators, combinators and pluggable
//! execution contexts.
//!
//! A [`Promise<T, E>`](Promise) settles exactly once, either fulfilled with
//! a value or failed with an error, and replays that outcome to every
//! subscriber. Chaining operators ([`then`](Promise::then),
//! [`and_then`](Promise::and_then), [`catch`](Promise::catch),
//! [`finally`](Promise::finally), [`map`](Promise::map)) each derive a
//! fresh promise, and the combinators [`Promise::all`] and
//! [`Promise::race`] fan a set of promises back into one. Handlers run on
//! an explicitly injected [`Executor`]; a promise is also a
//! [`std::future::Future`], so a consumer can `.await` it.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use promise_chain::{run_on, ExecutorRef, Promise, ThreadPool};
//!
//! let pool: ExecutorRef = Arc::new(ThreadPool::new(2));
//! let total = Promise::all(vec![
//!     run_on(&pool, || Ok::<_, String>(1)),
//!     run_on(&pool, || Ok::<_, String>(2)),
//!     run_on(&pool, || Ok::<_, String>(3)),
//! ])
//! .map(&pool, |values| values.into_iter().sum::<i32>());
//! assert_eq!(total.wait(), Ok(6));
//! ```

mod cell;
mod combinators;
pub mod exec;
mod promise;
mod task;

pub use cell::SettleError;
pub use exec::{Executor, ExecutorRef, Immediate, Job, SerialExecutor, ThreadPool};
pub use promise::{Producer, Promise};
pub use task::run_on;
