//! Synchronous-per-message dispatch to a single sink, with in-line retry,
//! exponential backoff, and terminal-error classification.
//!
//! The dispatcher reuses one pooled [`reqwest::Client`] across every
//! dispatch — never a per-call client — matching the project's established
//! client-construction idiom; per-request timeouts are attached individually
//! since each sink may declare a different `timeout_ms`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::SinkDescriptor;
use crate::message::LogMessage;
use crate::queue::{QueuedMessage, RetryQueue};

/// `User-Agent` sent on every egress request.
const USER_AGENT: &str = "log-distributor/1.0";

/// Outcome of a single dispatch attempt (no retry loop involved).
#[derive(Debug)]
pub enum AttemptOutcome {
    Success,
    Retryable(DispatchError),
    Terminal(DispatchError),
}

/// Outcome of a full dispatch — including any in-line retries — for one
/// message against one initially-selected sink.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The message reached the sink with `200 OK`.
    Success,
    /// The sink rejected the payload with a non-retryable `4xx`; the message
    /// is not enqueued.
    Terminal(DispatchError),
    /// All `retry_count + 1` attempts were exhausted. The message has
    /// already been enqueued into the retry queue with this sink recorded
    /// as tried; the caller has no further action to take.
    Exhausted(DispatchError),
}

/// Error observed while attempting to deliver a message to a sink.
#[derive(Debug)]
pub enum DispatchError {
    Transport(String),
    Timeout,
    Status { code: StatusCode, body: String },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Transport(e) => write!(f, "transport error: {}", e),
            DispatchError::Timeout => write!(f, "request timed out"),
            DispatchError::Status { code, body } => write!(f, "sink returned {}: {}", code, body),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Running counters for dispatch activity, exposed to the `/queue`
/// observability endpoint and to `tracing` events.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub successes: AtomicU64,
    pub terminal_failures: AtomicU64,
    pub retries: AtomicU64,
    pub enqueued: AtomicU64,
}

/// Point-in-time, non-atomic snapshot of [`DispatchStats`] for serialization.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DispatchStatsSnapshot {
    pub successes: u64,
    pub terminal_failures: u64,
    pub retries: u64,
    pub enqueued: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
        }
    }
}

/// Dispatches individual messages to sinks over a shared, pooled HTTP client.
pub struct Dispatcher {
    client: Client,
    pub stats: DispatchStats,
}

impl Dispatcher {
    /// Build a dispatcher around a fresh pooled client.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            stats: DispatchStats::default(),
        })
    }

    /// Run the full in-line retry loop (§4.D) for one message against one
    /// pre-selected sink: up to `sink.retry_count + 1` attempts total, with
    /// `2^attempt` second backoff between attempts (1s, 2s, 4s, ...).
    ///
    /// The dispatcher is the only component authorized to enqueue a message
    /// into the retry queue: on exhaustion this method enqueues `message`
    /// into `queue` itself, with `sink` recorded as tried, before returning
    /// [`DispatchOutcome::Exhausted`].
    pub async fn dispatch_with_retry(
        &self,
        message: LogMessage,
        sink: &SinkDescriptor,
        queue: &RetryQueue,
    ) -> DispatchOutcome {
        let max_attempts = sink.retry_count + 1;
        let mut last_error: Option<DispatchError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                debug!(
                    sink_id = %sink.id,
                    message_id = %message.id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
                self.stats.retries.fetch_add(1, Ordering::Relaxed);
            }

            match self.attempt_once(&message, sink).await {
                AttemptOutcome::Success => {
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    return DispatchOutcome::Success;
                }
                AttemptOutcome::Terminal(err) => {
                    warn!(
                        sink_id = %sink.id,
                        message_id = %message.id,
                        error = %err,
                        "terminal non-retryable response, not enqueueing"
                    );
                    self.stats.terminal_failures.fetch_add(1, Ordering::Relaxed);
                    return DispatchOutcome::Terminal(err);
                }
                AttemptOutcome::Retryable(err) => {
                    warn!(
                        sink_id = %sink.id,
                        message_id = %message.id,
                        attempt,
                        error = %err,
                        "retryable dispatch failure"
                    );
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or(DispatchError::Transport("no attempts made".to_string()));
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        let entry = QueuedMessage::new(message, &sink.id);
        queue.enqueue(entry).await;
        DispatchOutcome::Exhausted(err)
    }

    /// A single delivery attempt with no retry loop — used both by the
    /// in-line retry loop above and by the retry-queue worker, which makes
    /// exactly one attempt per cycle per message (§4.E).
    pub async fn attempt_once(&self, message: &LogMessage, sink: &SinkDescriptor) -> AttemptOutcome {
        let response = self
            .client
            .post(&sink.endpoint)
            .timeout(sink.timeout)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("X-Log-ID", message.id.as_str())
            .header("X-Analyzer-ID", sink.id.as_str())
            .json(message)
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return AttemptOutcome::Retryable(DispatchError::Timeout),
            Err(e) => return AttemptOutcome::Retryable(DispatchError::Transport(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::OK {
            return AttemptOutcome::Success;
        }

        let body = response.text().await.unwrap_or_default();
        let error = DispatchError::Status { code: status, body };

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            AttemptOutcome::Retryable(error)
        } else {
            // Any other 4xx is a terminal payload rejection.
            AttemptOutcome::Terminal(error)
        }
    }
}

/// `2^attempt` seconds, attempt index zero-based (the first retry sleeps 1s).
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64.saturating_shl(attempt.min(32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_doubles_each_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_delay_does_not_overflow_for_large_attempts() {
        // Should saturate rather than panic.
        let _ = backoff_delay(100);
    }

    #[test]
    fn dispatch_error_display_includes_status_and_body() {
        let err = DispatchError::Status {
            code: StatusCode::BAD_REQUEST,
            body: "invalid payload".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("400"));
        assert!(rendered.contains("invalid payload"));
    }

    #[test]
    fn stats_snapshot_reflects_recorded_counters() {
        let stats = DispatchStats::default();
        stats.successes.fetch_add(2, Ordering::Relaxed);
        stats.terminal_failures.fetch_add(1, Ordering::Relaxed);
        stats.retries.fetch_add(3, Ordering::Relaxed);
        stats.enqueued.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.terminal_failures, 1);
        assert_eq!(snapshot.retries, 3);
        assert_eq!(snapshot.enqueued, 1);
    }
}
