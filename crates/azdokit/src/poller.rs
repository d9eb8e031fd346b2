//! Waiting for asynchronous operations to finish.
//!
//! Project create and update calls return an [`OperationReference`] right
//! away while provisioning runs server-side. [`Poller::await_completion`]
//! queries the operation until its status lands in the caller's terminal
//! set, the timeout runs out, or a query fails.

use crate::backend::Backend;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::{MIN_POLL_INTERVAL, Operation, OperationReference, OperationStatus, PollConfig};
use std::time::Duration;

/// Callback trait for polling progress notifications.
pub trait PollCallback: Send + Sync {
    /// Called after every query that returned a pending status.
    ///
    /// # Arguments
    /// * `poll` - Number of queries made so far (1-indexed)
    /// * `operation` - The operation document just received
    /// * `elapsed` - Time since the wait started
    fn on_pending(&self, poll: u32, operation: &Operation, elapsed: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_pending(&self, _poll: u32, _operation: &Operation, _elapsed: Duration) {}
}

/// Callback that logs each pending status at debug level.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_pending(&self, poll: u32, operation: &Operation, elapsed: Duration) {
        log::debug!(
            "Waiting for operation {} (poll {}, {}s): {} {}",
            operation.id,
            poll,
            elapsed.as_secs(),
            operation.status,
            operation.message().unwrap_or_default()
        );
    }
}

/// Polls operation status against a backend.
pub struct Poller<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
    callback: &'a dyn PollCallback,
}

impl<'a> Poller<'a> {
    /// Create a poller.
    pub fn new(
        backend: &'a dyn Backend,
        clock: &'a dyn Clock,
        callback: &'a dyn PollCallback,
    ) -> Self {
        Self {
            backend,
            clock,
            callback,
        }
    }

    /// Wait until the operation reaches a status in `terminal`.
    ///
    /// The first query happens after `config.min_timeout`, later ones every
    /// `config.poll_interval` (never less than [`MIN_POLL_INTERVAL`]). A status in `pending` keeps the loop going; a
    /// status in `terminal` is returned as is, whether it means success or
    /// failure. Terminal wins when a status appears in both sets.
    ///
    /// # Errors
    ///
    /// * the query error, unchanged, as soon as one query fails
    /// * [`Error::UnexpectedStatus`] for a status in neither set
    /// * [`Error::Timeout`] when the next wait would pass `config.timeout`;
    ///   no further query is made and the server-side job is left running
    pub fn await_completion(
        &self,
        handle: &OperationReference,
        pending: &[OperationStatus],
        terminal: &[OperationStatus],
        config: &PollConfig,
    ) -> Result<Operation> {
        let start = self.clock.now();
        // `None` when the timeout is too large to represent: no deadline.
        let deadline = start.checked_add(config.timeout);
        let interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut wait = config.min_timeout;
        let mut polls = 0u32;
        let mut last_status = None;

        loop {
            let now = self.clock.now();
            let expired = match (deadline, now.checked_add(wait)) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(deadline), Some(next)) => next > deadline,
            };
            if expired {
                log::debug!(
                    "Operation {} still {} after {}s, giving up",
                    handle.id,
                    last_status.map_or("unpolled", |s: OperationStatus| s.as_str()),
                    (now - start).as_secs()
                );
                return Err(Error::Timeout {
                    operation_id: handle.id,
                    elapsed: now - start,
                    last_status,
                });
            }

            self.clock.sleep(wait);

            let operation = self.backend.get_operation(handle.id, handle.plugin_id)?;
            polls += 1;
            last_status = Some(operation.status);

            if terminal.contains(&operation.status) {
                log::debug!(
                    "Operation {} reached {} after {} poll(s)",
                    handle.id,
                    operation.status,
                    polls
                );
                return Ok(operation);
            }

            if !pending.contains(&operation.status) {
                return Err(Error::UnexpectedStatus {
                    operation_id: handle.id,
                    status: operation.status,
                });
            }

            let elapsed = self.clock.now() - start;
            self.callback.on_pending(polls, &operation, elapsed);
            wait = interval;
        }
    }

    /// [`Poller::await_completion`] with the standard pending and terminal sets.
    pub fn await_standard(
        &self,
        handle: &OperationReference,
        config: &PollConfig,
    ) -> Result<Operation> {
        self.await_completion(
            handle,
            &OperationStatus::PENDING,
            &OperationStatus::TERMINAL,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, Scripted};
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> PollConfig {
        PollConfig {
            min_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_pending_then_terminal_polls_n_plus_one() {
        for n in 0..4 {
            let mock = MockBackend::new();
            let mut script = vec![Scripted::Status(OperationStatus::InProgress); n];
            script.push(Scripted::Status(OperationStatus::Succeeded));
            let handle = mock.add_operation(script);
            let clock = ManualClock::new();

            let poller = Poller::new(&mock, &clock, &NoCallback);
            let op = poller.await_standard(&handle, &config()).unwrap();

            assert_eq!(op.status, OperationStatus::Succeeded);
            assert_eq!(mock.operation_queries(), n + 1);
        }
    }

    #[test]
    fn test_first_terminal_returns_after_min_timeout() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::Succeeded]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        poller.await_standard(&handle, &config()).unwrap();

        assert_eq!(clock.elapsed(), Duration::from_secs(5));
        assert_eq!(mock.operation_queries(), 1);
    }

    #[test]
    fn test_failure_status_is_terminal_not_error() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::Queued, OperationStatus::Failed]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let op = poller.await_standard(&handle, &config()).unwrap();

        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(clock.elapsed(), Duration::from_secs(15));
    }

    #[test]
    fn test_timeout_stops_querying() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::InProgress]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let err = poller.await_standard(&handle, &config()).unwrap_err();

        // Queries at 5, 15, 25, 35, 45, 55; the next one would land at 65 > 60.
        assert_eq!(mock.operation_queries(), 6);
        assert!(clock.elapsed() <= Duration::from_secs(60));
        match err {
            Error::Timeout {
                operation_id,
                last_status,
                elapsed,
            } => {
                assert_eq!(operation_id, handle.id);
                assert_eq!(last_status, Some(OperationStatus::InProgress));
                assert_eq!(elapsed, Duration::from_secs(55));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_shorter_than_min_timeout_never_queries() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::Succeeded]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let config = config().timeout(Duration::from_secs(1));
        let err = poller.await_standard(&handle, &config).unwrap_err();

        assert!(matches!(err, Error::Timeout { last_status: None, .. }));
        assert_eq!(mock.operation_queries(), 0);
    }

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([
            OperationStatus::InProgress,
            OperationStatus::InProgress,
            OperationStatus::Succeeded,
        ]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let config = config().timeout(Duration::from_secs(u64::MAX));
        let op = poller.await_standard(&handle, &config).unwrap();

        assert_eq!(op.status, OperationStatus::Succeeded);
        assert_eq!(mock.operation_queries(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(25));
    }

    #[test]
    fn test_zero_interval_still_waits_between_queries() {
        let mock = MockBackend::new();
        let mut script = vec![Scripted::Status(OperationStatus::InProgress); 50];
        script.push(Scripted::Status(OperationStatus::Succeeded));
        let handle = mock.add_operation(script);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let mut config = config();
        config.poll_interval = Duration::ZERO;
        let err = poller.await_standard(&handle, &config).unwrap_err();

        // 5s first wait, then one query per MIN_POLL_INTERVAL until 60s.
        assert!(matches!(err, Error::Timeout { .. }));
        let expected = (60 - 5) / MIN_POLL_INTERVAL.as_secs() + 1;
        assert_eq!(mock.operation_queries() as u64, expected);
    }

    #[test]
    fn test_query_error_aborts_immediately() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([
            Scripted::Status(OperationStatus::Queued),
            Scripted::Error("service unavailable".to_string()),
            Scripted::Status(OperationStatus::Succeeded),
        ]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let err = poller.await_standard(&handle, &config()).unwrap_err();

        assert!(err.to_string().contains("service unavailable"));
        assert_eq!(mock.operation_queries(), 2);
    }

    #[test]
    fn test_status_outside_both_sets() {
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::Queued]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let err = poller
            .await_completion(
                &handle,
                &[OperationStatus::InProgress],
                &[OperationStatus::Succeeded],
                &config(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            Error::UnexpectedStatus {
                status: OperationStatus::Queued,
                ..
            }
        ));
    }

    #[test]
    fn test_caller_sets_decide_termination() {
        // Treat Queued as terminal: the loop ends on the first query.
        let mock = MockBackend::new();
        let handle = mock.add_operation([OperationStatus::Queued]);
        let clock = ManualClock::new();

        let poller = Poller::new(&mock, &clock, &NoCallback);
        let op = poller
            .await_completion(
                &handle,
                &OperationStatus::PENDING,
                &[OperationStatus::Queued],
                &config(),
            )
            .unwrap();
        assert_eq!(op.status, OperationStatus::Queued);
        assert_eq!(mock.operation_queries(), 1);
    }

    #[test]
    fn test_callback_invoked_for_pending_only() {
        struct CountingCallback(Arc<AtomicU32>);
        impl PollCallback for CountingCallback {
            fn on_pending(&self, _: u32, _: &Operation, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mock = MockBackend::new();
        let handle = mock.add_operation([
            OperationStatus::NotSet,
            OperationStatus::Queued,
            OperationStatus::InProgress,
            OperationStatus::Succeeded,
        ]);
        let clock = ManualClock::new();
        let count = Arc::new(AtomicU32::new(0));
        let callback = CountingCallback(count.clone());

        let poller = Poller::new(&mock, &clock, &callback);
        poller.await_standard(&handle, &config()).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(35));
    }
}
