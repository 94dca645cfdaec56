use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use promise_chain::{exec::Immediate, ExecutorRef, Promise, SettleError};

#[derive(Debug, Clone, PartialEq)]
enum FetchError {
    Offline,
    Timeout(u32),
}

fn inline() -> ExecutorRef {
    Arc::new(Immediate)
}

#[test]
fn then_runs_handler_and_fulfills_with_unit() {
    let exec = inline();
    let seen = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&seen);
    let done = Promise::<i32, FetchError>::resolve(11).then(&exec, move |value| {
        assert_eq!(value, 11);
        counted.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(done.wait(), Ok(()));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn then_forwards_rejection_without_running_handler() {
    let exec = inline();
    let ran = Arc::new(AtomicBool::new(false));
    let flagged = Arc::clone(&ran);
    let derived = Promise::<i32, FetchError>::reject(FetchError::Offline).then(&exec, move |_| {
        flagged.store(true, Ordering::SeqCst);
    });
    assert_eq!(derived.wait(), Err(FetchError::Offline));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn then_handle_consumes_rejection_and_stays_pending() {
    let exec = inline();
    let handled = Arc::new(AtomicBool::new(false));
    let flagged = Arc::clone(&handled);
    let derived = Promise::<i32, FetchError>::reject(FetchError::Offline).then_handle(
        &exec,
        |_| panic!("fulfill handler must not run"),
        move |error| {
            assert_eq!(error, FetchError::Offline);
            flagged.store(true, Ordering::SeqCst);
        },
    );
    assert!(handled.load(Ordering::SeqCst));
    assert!(!derived.is_settled());
}

#[test]
fn and_then_adopts_inner_outcome() {
    let exec = inline();
    let chained = Promise::<i32, FetchError>::resolve(4)
        .and_then(&exec, |value| Promise::resolve(value * 10));
    assert_eq!(chained.wait(), Ok(40));

    let inner_failure = Promise::<i32, FetchError>::resolve(4)
        .and_then(&exec, |_| Promise::<i32, _>::reject(FetchError::Timeout(2)));
    assert_eq!(inner_failure.wait(), Err(FetchError::Timeout(2)));
}

#[test]
fn and_then_skips_handler_on_rejection() {
    let exec = inline();
    let derived = Promise::<i32, FetchError>::reject(FetchError::Offline)
        .and_then(&exec, |_| -> Promise<i32, FetchError> {
            panic!("flat-map handler must not run")
        });
    assert_eq!(derived.wait(), Err(FetchError::Offline));
}

#[test]
fn try_map_bridges_synchronous_failure() {
    let exec = inline();
    let mapped = Promise::<i32, FetchError>::resolve(3)
        .try_map(&exec, |v| if v > 2 { Err(FetchError::Timeout(v as u32)) } else { Ok(v) });
    assert_eq!(mapped.wait(), Err(FetchError::Timeout(3)));
}

#[test]
fn catch_recovers_matching_error_kind() {
    let exec = inline();
    let recovered = Promise::<i32, FetchError>::reject(FetchError::Timeout(5)).catch(
        &exec,
        |error| match error {
            FetchError::Timeout(retries) => Some(*retries),
            _ => None,
        },
        |retries| retries as i32 * 100,
    );
    assert_eq!(recovered.wait(), Ok(500));
}

#[test]
fn catch_forwards_unmatched_error_kind() {
    let exec = inline();
    let ran = Arc::new(AtomicBool::new(false));
    let flagged = Arc::clone(&ran);
    let derived = Promise::<i32, FetchError>::reject(FetchError::Offline).catch(
        &exec,
        |error| match error {
            FetchError::Timeout(retries) => Some(*retries),
            _ => None,
        },
        move |_| {
            flagged.store(true, Ordering::SeqCst);
            0
        },
    );
    assert_eq!(derived.wait(), Err(FetchError::Offline));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn catch_passes_fulfillment_through() {
    let exec = inline();
    let derived = Promise::<i32, FetchError>::resolve(8).catch(
        &exec,
        |_| Some(()),
        |_| panic!("recovery handler must not run on fulfillment"),
    );
    assert_eq!(derived.wait(), Ok(8));
}

#[test]
fn catch_chain_recovers_asynchronously() {
    let exec = inline();
    let (fallback, producer) = Promise::<i32, FetchError>::pending();
    let recovered = Promise::<i32, FetchError>::reject(FetchError::Timeout(1)).catch_chain(
        &exec,
        |error| match error {
            FetchError::Timeout(_) => Some(()),
            _ => None,
        },
        move |_| fallback,
    );
    assert!(!recovered.is_settled());
    producer.resolve(77).unwrap();
    assert_eq!(recovered.wait(), Ok(77));
}

#[test]
fn finally_runs_on_both_outcomes_without_swallowing() {
    let exec = inline();
    let runs = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&runs);
    let ok = Promise::<i32, FetchError>::resolve(1).finally(&exec, move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(ok.wait(), Ok(1));

    let counted = Arc::clone(&runs);
    let failed = Promise::<i32, FetchError>::reject(FetchError::Offline).finally(&exec, move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(failed.wait(), Err(FetchError::Offline));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn finally_chain_adopts_handler_promise() {
    let exec = inline();
    let replaced = Promise::<i32, FetchError>::reject(FetchError::Offline)
        .finally_chain(&exec, || Promise::<&'static str, FetchError>::resolve("cleaned up"));
    assert_eq!(replaced.wait(), Ok("cleaned up"));
}

#[test]
fn late_subscription_sees_existing_outcome() {
    let exec = inline();
    let (promise, producer) = Promise::<i32, FetchError>::pending();
    producer.resolve(64).unwrap();
    // Chained after settlement: immediate dispatch path.
    let mapped = promise.map(&exec, |v| v / 2);
    assert_eq!(mapped.wait(), Ok(32));
}

#[test]
fn second_settlement_is_a_contract_violation() {
    let (promise, producer) = Promise::<i32, FetchError>::pending();
    assert_eq!(producer.resolve(1), Ok(()));
    assert_eq!(producer.resolve(2), Err(SettleError::AlreadySettled));
    assert_eq!(
        producer.reject(FetchError::Offline),
        Err(SettleError::AlreadySettled)
    );
    assert_eq!(promise.wait(), Ok(1));
}
