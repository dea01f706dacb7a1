//! Mailbox polling engine.
//!
//! The relay cannot push, so the local mailbox is fetched in a loop run by a
//! single background task:
//!
//! ```text
//!   Idle ──start──► Polling ──stop / fatal error──► Stopping ──unwind──► Idle
//! ```
//!
//! Each iteration issues one GET and waits for it before computing the
//! delay to the next one, so requests never overlap and the poll interval
//! is a floor: a slow relay stretches the spacing, a fast one is padded up
//! to the interval. The task suspends only on the GET and on that delay,
//! and both race the session's cancellation token.
//!
//! Every exit from the loop, a panicking transport included, runs the same
//! unwind: the connected flag is cleared, `Disconnected` fires, the engine
//! returns to `Idle` and `PollingDone` fires. A user stop is not a failure and raises no
//! `Failure` notification; anything else does, before the unwind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pollsignal_protocol::Envelope;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SignalerError, SignalerResult};
use crate::events::{Notifier, SignalerEvent};
use crate::transport::Transport;

/// Lifecycle of the polling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Not polling; `start` is allowed.
    Idle,
    /// The loop is running.
    Polling,
    /// Cancellation was requested and the loop is unwinding.
    Stopping,
}

/// How the loop reacts to transport failures on GET.
///
/// Decode failures are always fatal to the session regardless of policy.
#[derive(Debug, Clone, Default)]
pub enum FailurePolicy {
    /// End the session on the first transport failure.
    #[default]
    Stop,
    /// Keep polling through transient failures, with backoff.
    Retry(RetryPolicy),
}

impl FailurePolicy {
    /// Returns the delay before retrying after `consecutive_failures`
    /// failures in a row, or `None` if the session should end.
    pub fn retry_delay(&self, consecutive_failures: u32) -> Option<Duration> {
        match self {
            Self::Stop => None,
            Self::Retry(policy) if consecutive_failures <= policy.max_consecutive_failures => {
                Some(policy.backoff_delay(consecutive_failures))
            }
            Self::Retry(_) => None,
        }
    }
}

/// Exponential backoff parameters for [`FailurePolicy::Retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failures in a row tolerated before the session ends.
    pub max_consecutive_failures: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for the delay.
    pub max_backoff: Duration,
    /// Growth factor per additional failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy tolerating `max_consecutive_failures` failures in a row.
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures,
            ..Default::default()
        }
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.multiplier = multiplier;
        self
    }

    /// Checks that the backoff parameters describe a usable schedule.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-finite or non-positive
    /// multiplier, or an initial backoff above the maximum.
    pub fn validate(&self) -> SignalerResult<()> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(SignalerError::config(format!(
                "retry multiplier must be a positive number, got {}",
                self.multiplier
            )));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(SignalerError::config(
                "retry initial backoff must not exceed the maximum backoff",
            ));
        }
        Ok(())
    }

    /// Calculates the backoff after `consecutive_failures` failures in a row.
    ///
    /// Never exceeds `max_backoff`. Parameters that [`validate`](Self::validate)
    /// would reject yield `max_backoff` instead of a nonsensical delay.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        Duration::try_from_secs_f64(delay.min(max))
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Session slot guarded by the engine's lock.
enum Slot {
    Idle,
    Polling(CancellationToken),
    Stopping,
}

struct Shared {
    mailbox: String,
    interval: Duration,
    policy: FailurePolicy,
    transport: Arc<dyn Transport>,
    notifier: Arc<Notifier>,
    slot: Mutex<Slot>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives the GET loop for one local mailbox.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct PollingEngine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingEngine")
            .field("mailbox", &self.shared.mailbox)
            .field("interval", &self.shared.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl PollingEngine {
    /// Creates an idle engine polling `mailbox` at most once per `interval`.
    pub fn new(
        mailbox: impl Into<String>,
        interval: Duration,
        policy: FailurePolicy,
        transport: Arc<dyn Transport>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                mailbox: mailbox.into(),
                interval,
                policy,
                transport,
                notifier,
                slot: Mutex::new(Slot::Idle),
            }),
        }
    }

    /// Starts a polling session.
    ///
    /// Returns `Ok(true)` if this call moved the engine from `Idle` to
    /// `Polling`, `Ok(false)` if a session is already running or unwinding.
    /// When `parent` is given, cancelling it also stops the session.
    ///
    /// # Errors
    ///
    /// Fails without changing state if the mailbox id is blank or no Tokio
    /// runtime is available.
    pub fn start(&self, parent: Option<&CancellationToken>) -> SignalerResult<bool> {
        if self.shared.mailbox.trim().is_empty() {
            return Err(SignalerError::config("cannot start polling with an empty local id"));
        }
        let runtime = Handle::try_current().map_err(|_| SignalerError::Runtime)?;

        let token = {
            let mut slot = self.shared.slot();
            if !matches!(*slot, Slot::Idle) {
                debug!(mailbox = %self.shared.mailbox, "Polling already active");
                return Ok(false);
            }
            let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
            *slot = Slot::Polling(token.clone());
            token
        };

        runtime.spawn(run_session(self.shared.clone(), token));
        Ok(true)
    }

    /// Requests cancellation of the running session.
    ///
    /// Returns true if this call initiated the stop. Does not wait for the
    /// loop to unwind; `PollingDone` signals that.
    pub fn stop(&self) -> bool {
        let mut slot = self.shared.slot();
        let Slot::Polling(token) = &*slot else {
            return false;
        };
        // A cancelled parent already stopped this session.
        if token.is_cancelled() {
            return false;
        }
        token.cancel();
        *slot = Slot::Stopping;
        debug!(mailbox = %self.shared.mailbox, "Polling stop requested");
        true
    }

    /// Returns the current state. Informational only; it may change
    /// immediately after being read.
    pub fn state(&self) -> PollState {
        match &*self.shared.slot() {
            Slot::Idle => PollState::Idle,
            Slot::Polling(token) if token.is_cancelled() => PollState::Stopping,
            Slot::Polling(_) => PollState::Polling,
            Slot::Stopping => PollState::Stopping,
        }
    }

    /// Returns true while a session is running or unwinding.
    pub fn is_polling(&self) -> bool {
        self.state() != PollState::Idle
    }
}

/// Runs the unwind when the session future is dropped, including when the
/// task panics or is torn down with its runtime.
struct SessionGuard {
    shared: Arc<Shared>,
    finished: bool,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(mailbox = %self.shared.mailbox, "Polling session aborted");
            self.shared.notifier.failure(SignalerError::Aborted);
        }
        unwind(&self.shared);
        info!(mailbox = %self.shared.mailbox, "Polling stopped");
    }
}

async fn run_session(shared: Arc<Shared>, token: CancellationToken) {
    info!(
        mailbox = %shared.mailbox,
        interval_ms = shared.interval.as_millis() as u64,
        "Polling started"
    );
    let mut guard = SessionGuard {
        shared,
        finished: false,
    };

    if let Err(e) = poll_loop(&guard.shared, &token).await {
        warn!(mailbox = %guard.shared.mailbox, error = %e, "Polling session failed");
        guard.shared.notifier.failure(e);
    }
    guard.finished = true;
}

/// Runs until cancelled (`Ok`) or a fatal error (`Err`).
async fn poll_loop(shared: &Shared, token: &CancellationToken) -> SignalerResult<()> {
    let mut consecutive_failures = 0u32;

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        let started = Instant::now();
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            response = shared.transport.get(&shared.mailbox) => response,
        };

        let remaining = shared.interval.saturating_sub(started.elapsed());
        let delay = match response {
            Ok(body) => {
                consecutive_failures = 0;
                shared.notifier.mark_connected();

                if let Some(bytes) = body {
                    if token.is_cancelled() {
                        return Ok(());
                    }
                    let envelope = Envelope::decode(&bytes)?;
                    debug!(kind = %envelope.kind, bytes = bytes.len(), "Message received");
                    shared.notifier.emit(SignalerEvent::MessageReceived(envelope));
                }
                remaining
            }
            Err(e) => {
                consecutive_failures += 1;
                let Some(backoff) = shared.policy.retry_delay(consecutive_failures) else {
                    return Err(e.into());
                };
                warn!(
                    error = %e,
                    failures = consecutive_failures,
                    backoff_ms = backoff.as_millis() as u64,
                    "Poll failed, retrying"
                );
                shared.notifier.failure(e.into());
                backoff.max(remaining)
            }
        };

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn unwind(shared: &Shared) {
    shared.notifier.reset_connected();
    shared.notifier.emit(SignalerEvent::Disconnected);
    *shared.slot() = Slot::Idle;
    shared.notifier.emit(SignalerEvent::PollingDone);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, collect_until_done, event_names};
    use crate::transport::{BoxFuture, TransportResult};
    use pollsignal_core::SdpMessage;
    use tokio::sync::broadcast::error::TryRecvError;

    const INTERVAL: Duration = Duration::from_millis(500);

    fn engine(transport: Arc<ScriptedTransport>, policy: FailurePolicy) -> (PollingEngine, Arc<Notifier>) {
        let notifier = Arc::new(Notifier::new(64));
        let engine = PollingEngine::new("client", INTERVAL, policy, transport, notifier.clone());
        (engine, notifier)
    }

    fn offer_body() -> Vec<u8> {
        Envelope::from_sdp(&SdpMessage::offer("v=0")).to_json().unwrap()
    }

    #[test]
    fn retry_policy_backoff() {
        let policy = RetryPolicy::new(10).with_backoff(
            Duration::from_secs(1),
            Duration::from_secs(30),
            2.0,
        );

        assert_eq!(policy.backoff_delay(0), Duration::ZERO);
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn backoff_with_negative_multiplier_is_clamped() {
        let policy = RetryPolicy::new(5).with_backoff(
            Duration::from_millis(200),
            Duration::from_secs(2),
            -2.0,
        );

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert!(policy.backoff_delay(3) <= Duration::from_secs(2));
        assert!(policy.validate().unwrap_err().is_config());
    }

    #[test]
    fn retry_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());

        let backoff = |initial_ms, max_ms, multiplier| {
            RetryPolicy::new(3).with_backoff(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            )
        };
        assert!(backoff(100, 100, 1.0).validate().is_ok());
        assert!(backoff(100, 1_000, 0.0).validate().unwrap_err().is_config());
        assert!(backoff(100, 1_000, f64::NAN).validate().unwrap_err().is_config());
        assert!(backoff(100, 1_000, f64::INFINITY).validate().unwrap_err().is_config());
        assert!(backoff(5_000, 1_000, 2.0).validate().unwrap_err().is_config());
    }

    #[test]
    fn failure_policy_limits() {
        assert_eq!(FailurePolicy::Stop.retry_delay(1), None);

        let policy = FailurePolicy::Retry(RetryPolicy::new(2));
        assert!(policy.retry_delay(1).is_some());
        assert!(policy.retry_delay(2).is_some());
        assert_eq!(policy.retry_delay(3), None);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let (engine, notifier) = engine(ScriptedTransport::new(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        assert!(!engine.stop());
        assert_eq!(engine.state(), PollState::Idle);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn start_outside_runtime_fails_cleanly() {
        let (engine, _) = engine(ScriptedTransport::new(), FailurePolicy::Stop);
        assert!(matches!(engine.start(None), Err(SignalerError::Runtime)));
        assert_eq!(engine.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn blank_mailbox_is_a_config_error() {
        let notifier = Arc::new(Notifier::new(4));
        let engine = PollingEngine::new(
            "",
            INTERVAL,
            FailurePolicy::Stop,
            ScriptedTransport::new(),
            notifier,
        );

        assert!(engine.start(None).unwrap_err().is_config());
        assert_eq!(engine.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_and_connected_fires_once() {
        let transport = ScriptedTransport::new();
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        assert!(engine.start(None).unwrap());
        assert!(!engine.start(None).unwrap());
        assert_eq!(engine.state(), PollState::Polling);

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert!(transport.get_count() >= 3);

        assert!(engine.stop());
        assert!(!engine.stop());

        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["connected", "disconnected", "polling_done"]);
        assert_eq!(engine.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_are_spaced_by_the_interval_and_never_overlap() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(50));
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(2_200)).await;
        engine.stop();
        collect_until_done(&mut rx).await;

        let calls = transport.get_calls();
        assert!(calls.len() >= 4, "only {} polls", calls.len());
        for pair in calls.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let finished = prev.finished.expect("earlier poll completed");
            assert!(next.started >= finished, "poll overlapped the previous one");
            assert!(next.started - prev.started >= Duration::from_millis(450));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_are_not_padded() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(800));
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        engine.stop();
        collect_until_done(&mut rx).await;

        let calls = transport.get_calls();
        assert!(calls.len() >= 2);
        assert_eq!(calls[1].started - calls[0].started, Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn received_messages_are_published() {
        let transport = ScriptedTransport::new();
        transport.push_get(Ok(None));
        transport.push_get(Ok(Some(offer_body())));
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        engine.stop();

        let events = collect_until_done(&mut rx).await;
        assert_eq!(
            event_names(&events),
            ["connected", "message_received", "disconnected", "polling_done"]
        );
        let SignalerEvent::MessageReceived(envelope) = &events[1] else {
            unreachable!()
        };
        assert_eq!(envelope.to_sdp().unwrap(), SdpMessage::offer("v=0"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_stops_promptly_without_failure() {
        let transport = ScriptedTransport::new();
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        // First poll completes immediately; the loop is now in its delay.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.get_count(), 1);

        let stopped_at = Instant::now();
        assert!(engine.stop());
        let events = collect_until_done(&mut rx).await;

        assert_eq!(stopped_at.elapsed(), Duration::ZERO);
        assert!(!events.iter().any(|e| matches!(e, SignalerEvent::Failure(_))));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.get_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_request_aborts_it() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_secs(30));
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stop();

        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["disconnected", "polling_done"]);
        assert_eq!(transport.get_calls()[0].finished, None);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_body_ends_the_session_once() {
        let transport = ScriptedTransport::new();
        transport.push_get(Ok(Some(b"{not json".to_vec())));
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        let events = collect_until_done(&mut rx).await;

        assert_eq!(
            event_names(&events),
            ["connected", "failure", "disconnected", "polling_done"]
        );
        let SignalerEvent::Failure(err) = &events[1] else {
            unreachable!()
        };
        assert!(matches!(**err, SignalerError::Protocol(_)));
        assert_eq!(engine.state(), PollState::Idle);
        assert_eq!(transport.get_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failures_are_fatal_even_when_retrying() {
        let transport = ScriptedTransport::new();
        transport.push_get(Ok(Some(br#"{"MessageType":9,"Data":"","IceDataSeparator":"|"}"#.to_vec())));
        let (engine, notifier) = engine(transport, FailurePolicy::Retry(RetryPolicy::new(5)));
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        let events = collect_until_done(&mut rx).await;
        assert_eq!(
            event_names(&events),
            ["connected", "failure", "disconnected", "polling_done"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_ends_session_under_stop_policy() {
        let transport = ScriptedTransport::new();
        transport.push_get(Err(ScriptedTransport::refused()));
        let (engine, notifier) = engine(transport, FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["failure", "disconnected", "polling_done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_survives_transient_failures() {
        let transport = ScriptedTransport::new();
        transport.push_get(Err(ScriptedTransport::refused()));
        transport.push_get(Err(ScriptedTransport::refused()));
        let policy = RetryPolicy::new(3).with_backoff(
            Duration::from_millis(200),
            Duration::from_secs(2),
            2.0,
        );
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Retry(policy));
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.state(), PollState::Polling);
        engine.stop();

        let events = collect_until_done(&mut rx).await;
        assert_eq!(
            event_names(&events),
            ["failure", "failure", "connected", "disconnected", "polling_done"]
        );

        // Backoff is never shorter than the poll interval.
        let calls = transport.get_calls();
        assert_eq!(calls[1].started - calls[0].started, INTERVAL);
        assert_eq!(calls[2].started - calls[1].started, INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_gives_up_after_limit() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push_get(Err(ScriptedTransport::refused()));
        }
        let (engine, notifier) = engine(transport, FailurePolicy::Retry(RetryPolicy::new(2)));
        let mut rx = notifier.subscribe();

        engine.start(None).unwrap();
        let events = collect_until_done(&mut rx).await;
        assert_eq!(
            event_names(&events),
            ["failure", "failure", "failure", "disconnected", "polling_done"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn parent_token_cancels_session() {
        let (engine, notifier) = engine(ScriptedTransport::new(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();
        let parent = CancellationToken::new();

        assert!(engine.start(Some(&parent)).unwrap());
        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();

        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["connected", "disconnected", "polling_done"]);
        assert_eq!(engine.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_parent_cancel_is_a_noop() {
        let (engine, notifier) = engine(ScriptedTransport::new(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();
        let parent = CancellationToken::new();

        assert!(engine.start(Some(&parent)).unwrap());
        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();

        // The task has not observed the cancellation yet.
        assert_eq!(engine.state(), PollState::Stopping);
        assert!(!engine.stop());

        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["connected", "disconnected", "polling_done"]);
        assert_eq!(engine.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn unvalidated_negative_multiplier_keeps_polling() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push_get(Err(ScriptedTransport::refused()));
        }
        let policy = RetryPolicy::new(5).with_backoff(
            Duration::from_millis(200),
            Duration::from_secs(2),
            -2.0,
        );
        let (engine, notifier) = engine(transport.clone(), FailurePolicy::Retry(policy));
        let mut rx = notifier.subscribe();

        assert!(engine.start(None).unwrap());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.state(), PollState::Polling);
        assert!(engine.stop());

        let events = collect_until_done(&mut rx).await;
        assert_eq!(
            event_names(&events),
            ["failure", "failure", "failure", "connected", "disconnected", "polling_done"]
        );
        assert_eq!(engine.state(), PollState::Idle);
        assert!(engine.start(None).unwrap());
        assert!(engine.stop());
    }

    struct PanickingTransport;

    impl Transport for PanickingTransport {
        fn post<'a>(&'a self, _mailbox: &'a str, _body: Vec<u8>) -> BoxFuture<'a, TransportResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn get<'a>(&'a self, _mailbox: &'a str) -> BoxFuture<'a, TransportResult<Option<Vec<u8>>>> {
            panic!("transport bug")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_transport_still_unwinds() {
        let notifier = Arc::new(Notifier::new(64));
        let engine = PollingEngine::new(
            "client",
            INTERVAL,
            FailurePolicy::Stop,
            Arc::new(PanickingTransport),
            notifier.clone(),
        );
        let mut rx = notifier.subscribe();

        assert!(engine.start(None).unwrap());
        let events = collect_until_done(&mut rx).await;
        assert_eq!(event_names(&events), ["failure", "disconnected", "polling_done"]);
        assert!(matches!(&events[0], SignalerEvent::Failure(e) if matches!(**e, SignalerError::Aborted)));
        assert_eq!(engine.state(), PollState::Idle);
        assert!(engine.start(None).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn engine_restarts_after_polling_done() {
        let (engine, notifier) = engine(ScriptedTransport::new(), FailurePolicy::Stop);
        let mut rx = notifier.subscribe();

        for _ in 0..2 {
            assert!(engine.start(None).unwrap());
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(engine.stop());
            let events = collect_until_done(&mut rx).await;
            assert_eq!(event_names(&events), ["connected", "disconnected", "polling_done"]);
        }
    }
}
